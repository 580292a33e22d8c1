//! OpenRouter configuration

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tutor_core::{Error, GenerationConfig, Result};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "meta-llama/llama-3.2-3b-instruct:free";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_DIMENSION: usize = 768;

/// Configuration for the chat-completions client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    pub api_key: String,
    pub base_url: String,
    pub model_id: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl OpenRouterConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup("GEMINI_API_KEY")
            .or_else(|| lookup("OPENROUTER_API_KEY"))
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                Error::Configuration(
                    "GEMINI_API_KEY or OPENROUTER_API_KEY environment variable not found".to_string(),
                )
            })?;

        let base_url = lookup("OPENROUTER_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let model_id = lookup("GENERATION_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let timeout_secs = parse_or("GENERATION_TIMEOUT_SECS", &lookup, 60)?;
        let max_retries = parse_or("GENERATION_MAX_RETRIES", &lookup, 2)?;

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model_id,
            timeout_secs,
            max_retries,
        })
    }

    /// Create configuration with explicit values
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model_id: DEFAULT_MODEL.to_string(),
            timeout_secs: 60,
            max_retries: 2,
        }
    }

    pub fn generation_config(&self) -> GenerationConfig {
        GenerationConfig {
            model_id: self.model_id.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            ..Default::default()
        }
    }
}

/// Configuration for the embeddings client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub dimension: usize,
    pub timeout_secs: u64,
}

impl EmbeddingConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// The key falls back to the generation key when no dedicated one is set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup("EMBEDDING_API_KEY")
            .or_else(|| lookup("GEMINI_API_KEY"))
            .or_else(|| lookup("OPENROUTER_API_KEY"))
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                Error::Configuration("EMBEDDING_API_KEY environment variable not found".to_string())
            })?;

        let base_url = lookup("EMBEDDING_BASE_URL")
            .or_else(|| lookup("OPENROUTER_BASE_URL"))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: lookup("EMBEDDING_MODEL").unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            dimension: parse_or("VECTOR_DIMENSION", &lookup, DEFAULT_DIMENSION)?,
            timeout_secs: parse_or("RETRIEVAL_TIMEOUT_SECS", &lookup, 10)?,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &str,
    lookup: &impl Fn(&str) -> Option<String>,
    default: T,
) -> Result<T> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Configuration(format!("{key} has an invalid value: {raw}"))),
        None => Ok(default),
    }
}
