//! OpenAI-compatible embeddings client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

use tutor_core::{EmbeddingProvider, Error, Result};

use crate::config::EmbeddingConfig;

/// Embeddings client for any endpoint following the OpenAI `/embeddings` format
pub struct OpenAiEmbeddings {
    config: EmbeddingConfig,
    client: Client,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

impl OpenAiEmbeddings {
    pub fn new(config: EmbeddingConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self { config, client })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(EmbeddingConfig::from_env()?)
    }

    async fn perform_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.config.base_url);
        let request_body = EmbeddingRequest {
            model: &self.config.model,
            input: text,
            dimensions: self.config.dimension,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| Error::Embedding(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::Embedding(format!(
                "Embedding request failed with status {}: {}",
                status, error_text
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("Malformed embedding response: {e}")))?;

        let vector = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| Error::Embedding("No embedding returned".to_string()))?;

        check_dimension(vector, self.config.dimension)
    }
}

fn check_dimension(vector: Vec<f32>, expected: usize) -> Result<Vec<f32>> {
    if vector.len() != expected {
        return Err(Error::Embedding(format!(
            "Expected a {}-dimensional vector, got {}",
            expected,
            vector.len()
        )));
    }
    Ok(vector)
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(model = %self.config.model, chars = text.len(), "requesting embedding");
        let limit = Duration::from_secs(self.config.timeout_secs);
        match timeout(limit, self.perform_embedding(text)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Embedding(format!("No embedding within {:?}", limit))),
        }
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_dimension() {
        assert_eq!(check_dimension(vec![0.0; 4], 4).unwrap().len(), 4);
        let err = check_dimension(vec![0.0; 3], 4).unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
    }
}
