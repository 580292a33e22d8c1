//! Embedding provider and similarity index selection

use std::path::PathBuf;
use std::sync::Arc;

use tracing::warn;
use tutor_core::{EmbeddingProvider, Error, Result, SimilarityIndex};
use tutor_openrouter::{EmbeddingConfig, OpenAiEmbeddings};
use tutor_rag::{
    DocumentIndexer, HashEmbedder, IndexingResult, LocalVectorStore, QdrantVectorStore,
    collect_markdown_files, load_markdown,
};
use tutor_server::{EmbeddingBackend, ServerConfig};

pub type Retrieval = (Arc<dyn EmbeddingProvider>, Arc<dyn SimilarityIndex>);

/// Build the retrieval pair, or `None` in degraded mode
///
/// The index is initialised with the configured dimension, creating the
/// Qdrant collection when it does not exist yet.
pub async fn build(config: &ServerConfig) -> Result<Option<Retrieval>> {
    let embedder: Arc<dyn EmbeddingProvider> = match config.embedding_backend {
        EmbeddingBackend::None => return Ok(None),
        EmbeddingBackend::Hash => Arc::new(HashEmbedder::new(config.vector_dimension)),
        EmbeddingBackend::OpenAi => {
            let mut settings = EmbeddingConfig::from_env()?;
            settings.dimension = config.vector_dimension;
            Arc::new(OpenAiEmbeddings::new(settings)?)
        }
    };

    if embedder.dimension() != config.vector_dimension {
        return Err(Error::Configuration(format!(
            "embedding dimension {} does not match VECTOR_DIMENSION {}",
            embedder.dimension(),
            config.vector_dimension
        )));
    }

    let index: Arc<dyn SimilarityIndex> = match &config.qdrant_url {
        Some(url) => Arc::new(QdrantVectorStore::new(
            url,
            config.qdrant_api_key.clone(),
            &config.qdrant_collection,
        )?),
        None => Arc::new(LocalVectorStore::new()),
    };
    index.initialize(config.vector_dimension).await?;

    Ok(Some((embedder, index)))
}

/// Load every Markdown file under `paths` and index it
///
/// Files that cannot be read count as failed documents; a path that does not
/// exist is an error.
pub async fn index_paths(retrieval: &Retrieval, paths: &[PathBuf]) -> Result<IndexingResult> {
    let files = collect_markdown_files(paths)?;

    let mut documents = Vec::with_capacity(files.len());
    let mut unreadable = Vec::new();
    for file in &files {
        match load_markdown(file) {
            Ok(document) => documents.push(document),
            Err(e) => unreadable.push(format!("{}: {}", file.display(), e)),
        }
    }

    let (embedder, index) = retrieval;
    let mut result = DocumentIndexer::new(embedder.clone(), index.clone())
        .index_documents(documents)
        .await;
    result.documents_failed += unreadable.len();
    result.errors.extend(unreadable);
    Ok(result)
}

/// Keep retrieval only if it can return something
///
/// A local index starts empty and nothing but `serve --docs` fills it, so an
/// empty one would ground every answer on nothing. Qdrant is trusted as is,
/// since another process may ingest into it.
pub async fn usable(config: &ServerConfig, retrieval: Retrieval) -> Result<Option<Retrieval>> {
    if config.qdrant_url.is_none() && retrieval.1.count().await? == 0 {
        warn!("local index is empty (pass --docs or set QDRANT_URL), answering from fallback context");
        return Ok(None);
    }
    Ok(Some(retrieval))
}
