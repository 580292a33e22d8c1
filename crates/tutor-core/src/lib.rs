//! Core traits and types for the textbook tutor chatbot
//!
//! This crate defines the capability interfaces the answer pipeline is built
//! from (embedding, similarity search, text generation, interaction logging)
//! together with the data model that flows between them. Implementations live
//! in the adapter crates, so every seam here can be replaced by a test double.

pub mod embedding;
pub mod error;
pub mod llm;
pub mod recorder;
pub mod types;
pub mod vector_store;

pub use embedding::EmbeddingProvider;
pub use error::{Error, Result};
pub use llm::{ChatMessage, GenerationConfig, GenerationProvider, GenerationResult, Role};
pub use recorder::{InteractionRecord, InteractionRecorder, RecordOutcome};
pub use types::*;
pub use vector_store::{IndexedPassage, ScoredPassage, SimilarityIndex};
