//! Textbook ingestion: Markdown to text, chunking, embedding and indexing

use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use tutor_core::{EmbeddingProvider, Error, IndexedPassage, Result, SimilarityIndex};

/// A source document to be indexed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub source: String,
    pub content: String,
}

/// Configuration for document indexing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub batch_size: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            batch_size: 10,
        }
    }
}

/// A chunk that made it into the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub point_id: String,
    pub title: String,
    pub content: String,
}

/// Result of an indexing run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexingResult {
    pub documents_indexed: usize,
    pub documents_failed: usize,
    pub chunks: Vec<IndexedChunk>,
    pub errors: Vec<String>,
}

/// Embeds document chunks and writes them into a similarity index
pub struct DocumentIndexer {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn SimilarityIndex>,
    config: IndexingConfig,
}

impl DocumentIndexer {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<dyn SimilarityIndex>) -> Self {
        Self {
            embedder,
            index,
            config: IndexingConfig::default(),
        }
    }

    pub fn with_config(mut self, config: IndexingConfig) -> Self {
        self.config = config;
        self
    }

    /// Index a single document
    pub async fn index_document(&self, document: &Document) -> Result<Vec<IndexedChunk>> {
        let chunks = chunk_text(&document.content, self.config.chunk_size, self.config.chunk_overlap);
        let mut indexed = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(self.config.batch_size.max(1)) {
            let mut passages = Vec::with_capacity(batch.len());
            for (offset, chunk) in batch.iter().enumerate() {
                let embedding = self.embedder.embed(chunk).await?;
                let id = point_id(&document.source, chunk);
                passages.push(IndexedPassage {
                    id: id.clone(),
                    text: chunk.clone(),
                    embedding,
                    metadata: json!({
                        "title": document.title,
                        "source": document.source,
                        "chunk": indexed.len() + offset,
                    }),
                });
            }

            self.index.upsert(passages).await?;
            indexed.extend(batch.iter().map(|chunk| IndexedChunk {
                point_id: point_id(&document.source, chunk),
                title: document.title.clone(),
                content: chunk.clone(),
            }));
        }

        Ok(indexed)
    }

    /// Index multiple documents, collecting per-document failures
    pub async fn index_documents(&self, documents: Vec<Document>) -> IndexingResult {
        let mut result = IndexingResult::default();

        for document in documents {
            match self.index_document(&document).await {
                Ok(chunks) => {
                    info!(source = %document.source, chunks = chunks.len(), "indexed document");
                    result.documents_indexed += 1;
                    result.chunks.extend(chunks);
                }
                Err(e) => {
                    warn!(source = %document.source, error = %e, "failed to index document");
                    result.documents_failed += 1;
                    result.errors.push(format!("{}: {}", document.source, e));
                }
            }
        }

        result
    }
}

/// Deterministic point id for a chunk, so re-ingesting replaces instead of duplicating
pub fn point_id(source: &str, content: &str) -> String {
    let digest = md5::compute(format!("{source}\n{content}"));
    Uuid::from_bytes(digest.0).to_string()
}

/// Split text into overlapping windows of at most `chunk_size` characters
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    let step = chunk_size.saturating_sub(chunk_overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let end = (start + chunk_size).min(chars.len());
        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        if end == chars.len() {
            break;
        }
        start += step;
    }

    chunks
}

/// Render Markdown to plain text, returning the first level-one heading if any
pub fn markdown_to_text(markdown: &str) -> (String, Option<String>) {
    let mut text = String::new();
    let mut title: Option<String> = None;
    let mut in_title = false;

    for event in Parser::new(markdown) {
        match event {
            Event::Start(Tag::Heading {
                level: HeadingLevel::H1,
                ..
            }) if title.is_none() => {
                in_title = true;
                title = Some(String::new());
            }
            Event::Text(t) | Event::Code(t) => {
                if in_title {
                    if let Some(title) = title.as_mut() {
                        title.push_str(&t);
                    }
                }
                text.push_str(&t);
            }
            Event::SoftBreak => text.push(' '),
            Event::HardBreak => text.push('\n'),
            Event::End(TagEnd::Heading(_)) => {
                in_title = false;
                text.push_str("\n\n");
            }
            Event::End(TagEnd::Paragraph | TagEnd::Item | TagEnd::CodeBlock) => {
                text.push_str("\n\n");
            }
            _ => {}
        }
    }

    let title = title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
    (text.trim().to_string(), title)
}

/// Read a Markdown file into a document titled by its first heading or file stem
pub fn load_markdown(path: &Path) -> Result<Document> {
    let raw = std::fs::read_to_string(path)?;
    let (content, heading) = markdown_to_text(&raw);

    let title = heading.unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string())
    });

    Ok(Document {
        title,
        source: path.display().to_string(),
        content,
    })
}

/// Expand files and directories into a sorted list of Markdown files
pub fn collect_markdown_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            files.push(path.clone());
            continue;
        }
        if !path.is_dir() {
            return Err(Error::Validation(format!("No such file or directory: {}", path.display())));
        }
        for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
            let is_markdown = entry
                .path()
                .extension()
                .is_some_and(|ext| ext == "md" || ext == "mdx");
            if entry.file_type().is_file() && is_markdown {
                files.push(entry.into_path());
            }
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HashEmbedder;
    use crate::vector_store::LocalVectorStore;

    #[test]
    fn test_chunk_text_windows() {
        let text = "a".repeat(2500);
        let chunks = chunk_text(&text, 1000, 200);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 1000);
        assert_eq!(chunks[2].len(), 900);
    }

    #[test]
    fn test_chunk_text_short_and_empty() {
        assert_eq!(chunk_text("short text", 1000, 200), vec!["short text".to_string()]);
        assert!(chunk_text("", 1000, 200).is_empty());
        assert!(chunk_text("   ", 1000, 200).is_empty());
    }

    #[test]
    fn test_chunk_overlap_larger_than_size_still_advances() {
        let chunks = chunk_text("abcdef", 2, 5);
        assert_eq!(chunks, vec!["ab", "bc", "cd", "de", "ef"]);
    }

    #[test]
    fn test_markdown_to_text() {
        let md = "# ROS 2 Basics\n\nA **node** is a process.\nIt uses `rclpy`.\n\n- topics\n- services\n";
        let (text, title) = markdown_to_text(md);
        assert_eq!(title.as_deref(), Some("ROS 2 Basics"));
        assert!(text.starts_with("ROS 2 Basics"));
        assert!(text.contains("A node is a process. It uses rclpy."));
        assert!(text.contains("topics"));
        assert!(!text.contains("**"));
    }

    #[test]
    fn test_point_id_is_deterministic_uuid() {
        let a = point_id("ch1.md", "text");
        assert_eq!(a, point_id("ch1.md", "text"));
        assert_ne!(a, point_id("ch2.md", "text"));
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn test_load_and_collect_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("module-1");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("intro.md"), "Plain text without heading.").unwrap();
        std::fs::write(dir.path().join("gazebo.md"), "# Gazebo\n\nSimulation.").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let files = collect_markdown_files(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(files.len(), 2);

        let gazebo = load_markdown(&dir.path().join("gazebo.md")).unwrap();
        assert_eq!(gazebo.title, "Gazebo");
        let intro = load_markdown(&nested.join("intro.md")).unwrap();
        assert_eq!(intro.title, "intro");

        let missing = collect_markdown_files(&[dir.path().join("nope")]).unwrap_err();
        assert!(matches!(missing, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_index_documents_is_idempotent() {
        let store = Arc::new(LocalVectorStore::new());
        store.initialize(64).await.unwrap();
        let indexer = DocumentIndexer::new(Arc::new(HashEmbedder::new(64)), store.clone()).with_config(
            IndexingConfig {
                chunk_size: 50,
                chunk_overlap: 10,
                batch_size: 2,
            },
        );

        let doc = Document {
            title: "Humanoids".into(),
            source: "humanoids.md".into(),
            content: "Humanoid robots balance using feedback control. ".repeat(5),
        };

        let first = indexer.index_documents(vec![doc.clone()]).await;
        assert_eq!(first.documents_indexed, 1);
        assert!(first.chunks.len() > 1);
        let count = store.count().await.unwrap();
        assert_eq!(count, first.chunks.len());

        indexer.index_documents(vec![doc]).await;
        assert_eq!(store.count().await.unwrap(), count);
    }

    #[tokio::test]
    async fn test_index_failure_is_collected() {
        let store = Arc::new(LocalVectorStore::new());
        store.initialize(8).await.unwrap();
        // Embedder dimension differs from the index, so every upsert fails.
        let indexer = DocumentIndexer::new(Arc::new(HashEmbedder::new(4)), store);

        let result = indexer
            .index_documents(vec![Document {
                title: "t".into(),
                source: "bad.md".into(),
                content: "content".into(),
            }])
            .await;
        assert_eq!(result.documents_failed, 1);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("bad.md"));
    }
}
