//! Gateway and retrieval configuration

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tutor_core::{Error, Result};
use tutor_rag::{AssemblerConfig, RetrievalFailurePolicy};

/// Which embedding provider backs retrieval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// No retrieval; answers use the fallback context
    #[default]
    None,
    /// OpenAI-compatible embeddings endpoint
    OpenAi,
    /// Offline hash embedder
    Hash,
}

impl FromStr for EmbeddingBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" | "off" => Ok(Self::None),
            "openai" | "openrouter" => Ok(Self::OpenAi),
            "hash" | "local" => Ok(Self::Hash),
            _ => Err(Error::Configuration(format!("unknown embedding provider: {s}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub embedding_backend: EmbeddingBackend,
    pub vector_dimension: usize,
    pub qdrant_url: Option<String>,
    pub qdrant_api_key: Option<String>,
    pub qdrant_collection: String,
    pub top_k: usize,
    pub retrieval_timeout_secs: u64,
    pub on_retrieval_failure: RetrievalFailurePolicy,
    pub preview_chars: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            database_path: PathBuf::from("chatbot.db"),
            embedding_backend: EmbeddingBackend::None,
            vector_dimension: 768,
            qdrant_url: None,
            qdrant_api_key: None,
            qdrant_collection: "textbook".to_string(),
            top_k: 3,
            retrieval_timeout_secs: 10,
            on_retrieval_failure: RetrievalFailurePolicy::Fallback,
            preview_chars: 200,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        parse_config(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        parse_config(lookup)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Assembler settings derived from the retrieval knobs
    pub fn assembler_config(&self) -> AssemblerConfig {
        AssemblerConfig {
            top_k: self.top_k,
            preview_chars: self.preview_chars,
            retrieval_timeout: Duration::from_secs(self.retrieval_timeout_secs),
            on_retrieval_failure: self.on_retrieval_failure,
            ..AssemblerConfig::default()
        }
    }
}

fn parse_config(lookup: impl Fn(&str) -> Option<String>) -> Result<ServerConfig> {
    let defaults = ServerConfig::default();
    let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    let embedding_backend = parse_or("EMBEDDING_PROVIDER", &non_blank, defaults.embedding_backend)?;
    let on_retrieval_failure =
        parse_or("RETRIEVAL_FAILURE", &non_blank, defaults.on_retrieval_failure)?;

    let config = ServerConfig {
        host: non_blank("HOST").unwrap_or(defaults.host),
        port: parse_or("PORT", &non_blank, defaults.port)?,
        database_path: non_blank("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.database_path),
        embedding_backend,
        vector_dimension: parse_or("VECTOR_DIMENSION", &non_blank, defaults.vector_dimension)?,
        qdrant_url: non_blank("QDRANT_URL"),
        qdrant_api_key: non_blank("QDRANT_API_KEY"),
        qdrant_collection: non_blank("QDRANT_COLLECTION").unwrap_or(defaults.qdrant_collection),
        top_k: parse_or("RETRIEVAL_TOP_K", &non_blank, defaults.top_k)?,
        retrieval_timeout_secs: parse_or(
            "RETRIEVAL_TIMEOUT_SECS",
            &non_blank,
            defaults.retrieval_timeout_secs,
        )?,
        on_retrieval_failure,
        preview_chars: parse_or("PREVIEW_CHARS", &non_blank, defaults.preview_chars)?,
    };

    if config.vector_dimension == 0 {
        return Err(Error::Configuration(
            "VECTOR_DIMENSION must be greater than zero".to_string(),
        ));
    }
    if config.top_k == 0 {
        return Err(Error::Configuration(
            "RETRIEVAL_TOP_K must be greater than zero".to_string(),
        ));
    }
    Ok(config)
}

fn parse_or<T: FromStr>(
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
