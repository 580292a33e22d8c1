//! Chat history persistence

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use serde::Serialize;
use tracing::debug;

use tutor_core::{InteractionRecord, InteractionRecorder, RecordOutcome, Result};

use crate::db::{Database, persistence};

/// A stored chat exchange
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub user_message: String,
    pub bot_response: String,
    pub selected_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Appends every answered question to the `chat_history` table
#[derive(Clone)]
pub struct SqliteInteractionRecorder {
    db: Database,
}

impl SqliteInteractionRecorder {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn insert(&self, record: InteractionRecord) -> Result<i64> {
        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO chat_history (user_message, bot_response, selected_text, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        record.question,
                        record.answer,
                        record.selected_text,
                        record.timestamp.to_rfc3339()
                    ],
                )
                .map_err(persistence("Failed to insert chat history"))?;
                Ok(conn.last_insert_rowid())
            })
            .await
    }

    /// Most recent exchanges first
    pub async fn history(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.db
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT id, user_message, bot_response, selected_text, created_at
                         FROM chat_history ORDER BY id DESC LIMIT ?1",
                    )
                    .map_err(persistence("Failed to query chat history"))?;
                let rows = stmt
                    .query_map([limit], |row| {
                        let created_at: String = row.get(4)?;
                        Ok(HistoryEntry {
                            id: row.get(0)?,
                            user_message: row.get(1)?,
                            bot_response: row.get(2)?,
                            selected_text: row.get(3)?,
                            created_at: parse_timestamp(&created_at),
                        })
                    })
                    .map_err(persistence("Failed to query chat history"))?
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(persistence("Failed to read chat history row"))?;
                Ok(rows)
            })
            .await
    }

    pub async fn get(&self, id: i64) -> Result<Option<HistoryEntry>> {
        self.db
            .call(move |conn| {
                conn.query_row(
                    "SELECT id, user_message, bot_response, selected_text, created_at
                     FROM chat_history WHERE id = ?1",
                    [id],
                    |row| {
                        let created_at: String = row.get(4)?;
                        Ok(HistoryEntry {
                            id: row.get(0)?,
                            user_message: row.get(1)?,
                            bot_response: row.get(2)?,
                            selected_text: row.get(3)?,
                            created_at: parse_timestamp(&created_at),
                        })
                    },
                )
                .optional()
                .map_err(persistence("Failed to load chat history entry"))
            })
            .await
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or_default()
}

#[async_trait]
impl InteractionRecorder for SqliteInteractionRecorder {
    async fn record(&self, record: InteractionRecord) -> RecordOutcome {
        let outcome = RecordOutcome::from(self.insert(record).await);
        debug!(?outcome, "chat history write finished");
        outcome
    }
}
