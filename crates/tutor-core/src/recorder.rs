//! Interaction recorder trait and types

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One question/answer exchange, appended to the interaction log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub question: String,
    pub answer: String,
    pub selected_text: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl InteractionRecord {
    pub fn new(question: impl Into<String>, answer: impl Into<String>, selected_text: Option<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            selected_text,
            timestamp: Utc::now(),
        }
    }
}

/// Outcome of a best-effort write
///
/// Recording never fails the request that produced the record, so there is no
/// error to propagate. Callers look at the outcome only to log it.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Stored { id: i64 },
    Failed { reason: String },
}

impl RecordOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, RecordOutcome::Stored { .. })
    }
}

impl<E: std::fmt::Display> From<std::result::Result<i64, E>> for RecordOutcome {
    fn from(result: std::result::Result<i64, E>) -> Self {
        match result {
            Ok(id) => RecordOutcome::Stored { id },
            Err(e) => RecordOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }
}

/// Trait for append-only interaction logs
#[async_trait]
pub trait InteractionRecorder: Send + Sync {
    /// Persist one exchange
    async fn record(&self, record: InteractionRecord) -> RecordOutcome;
}
