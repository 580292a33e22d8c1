//! Embedding provider trait

use async_trait::async_trait;

use crate::Result;

/// Trait for text embedding models
///
/// Every vector returned by one provider has the same length, `dimension()`.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text into a fixed-length vector
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Length of the vectors this provider produces
    fn dimension(&self) -> usize;
}
