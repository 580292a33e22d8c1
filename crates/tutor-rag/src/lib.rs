//! Retrieval-augmented answer assembly for the tutor chatbot
//!
//! This crate provides the answer assembler, similarity index implementations,
//! an offline embedding provider, and the textbook ingestion pipeline.

mod assembler;
mod document_indexer;
mod embedding;
mod vector_store;

#[cfg(test)]
mod testing;
#[cfg(test)]
mod tests;

pub use assembler::{AnswerAssembler, AssemblerConfig, RetrievalFailurePolicy};
pub use document_indexer::{
    Document, DocumentIndexer, IndexedChunk, IndexingConfig, IndexingResult, chunk_text,
    collect_markdown_files, load_markdown, markdown_to_text, point_id,
};
pub use embedding::HashEmbedder;
pub use vector_store::{LocalVectorStore, QdrantVectorStore};

// Re-export core types for convenience
pub use tutor_core::{
    Answer, ContextFragment, EmbeddingProvider, Error, GenerationProvider, IndexedPassage,
    InteractionRecorder, Prompt, Result, ScoredPassage, SimilarityIndex, SourceRef,
};
