//! Error types for the tutor chatbot

use thiserror::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the tutor chatbot
#[derive(Error, Debug)]
pub enum Error {
    #[error("Generation provider error: {0}")]
    Generation(String),

    #[error("Embedding provider error: {0}")]
    Embedding(String),

    #[error("Similarity index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl Error {
    /// Prefix the message with request context, keeping the error kind.
    pub fn context(self, context: &str) -> Self {
        let wrap = |msg: String| format!("{context}: {msg}");
        match self {
            Error::Generation(m) => Error::Generation(wrap(m)),
            Error::Embedding(m) => Error::Embedding(wrap(m)),
            Error::IndexUnavailable(m) => Error::IndexUnavailable(wrap(m)),
            Error::Persistence(m) => Error::Persistence(wrap(m)),
            Error::Configuration(m) => Error::Configuration(wrap(m)),
            Error::Validation(m) => Error::Validation(wrap(m)),
            Error::Authentication(m) => Error::Authentication(wrap(m)),
            Error::Network(m) => Error::Network(wrap(m)),
            Error::Serialization(m) => Error::Serialization(wrap(m)),
            Error::Timeout(m) => Error::Timeout(wrap(m)),
            Error::Io(e) => Error::Other(wrap(e.to_string())),
            Error::Other(m) => Error::Other(wrap(m)),
        }
    }

    /// Whether this error came from the retrieval path (embedding or index).
    pub fn is_retrieval(&self) -> bool {
        matches!(self, Error::Embedding(_) | Error::IndexUnavailable(_))
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_keeps_kind() {
        let err = Error::Generation("no choices returned".to_string()).context("answering question");
        assert!(matches!(err, Error::Generation(_)));
        assert_eq!(
            err.to_string(),
            "Generation provider error: answering question: no choices returned"
        );
    }

    #[test]
    fn test_is_retrieval() {
        assert!(Error::Embedding("x".into()).is_retrieval());
        assert!(Error::IndexUnavailable("x".into()).is_retrieval());
        assert!(!Error::Generation("x".into()).is_retrieval());
        assert!(!Error::Persistence("x".into()).is_retrieval());
    }
}
