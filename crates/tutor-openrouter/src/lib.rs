//! OpenRouter integration for the tutor chatbot
//!
//! This crate provides the HTTP implementations of the `GenerationProvider`
//! and `EmbeddingProvider` traits against OpenAI-compatible endpoints.

mod client;
mod config;
mod embeddings;


pub use client::OpenRouterClient;
pub use config::{EmbeddingConfig, OpenRouterConfig};
pub use embeddings::OpenAiEmbeddings;

// Re-export core types for convenience
pub use tutor_core::{
    ChatMessage, EmbeddingProvider, Error, GenerationConfig, GenerationProvider, GenerationResult,
    Result,
};
