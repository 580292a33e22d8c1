//! Registry of ingested document chunks

use rusqlite::params;
use serde::Serialize;

use tutor_core::Result;

use crate::db::{Database, persistence};

/// A chunk that was written to the similarity index
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentRow {
    pub point_id: String,
    pub title: String,
    pub content: String,
}

impl Database {
    /// Record indexed chunks; re-ingesting the same point id replaces the row
    pub async fn record_documents(&self, rows: Vec<DocumentRow>) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        self.call(move |conn| {
            let tx = conn
                .transaction()
                .map_err(persistence("Failed to start document transaction"))?;
            let now = chrono::Utc::now().to_rfc3339();
            let mut written = 0;
            {
                let mut stmt = tx
                    .prepare(
                        "INSERT INTO documents (title, content, point_id, created_at)
                         VALUES (?1, ?2, ?3, ?4)
                         ON CONFLICT(point_id) DO UPDATE SET
                           title = excluded.title,
                           content = excluded.content",
                    )
                    .map_err(persistence("Failed to prepare document insert"))?;
                for row in &rows {
                    written += stmt
                        .execute(params![row.title, row.content, row.point_id, now])
                        .map_err(persistence("Failed to insert document"))?;
                }
            }
            tx.commit()
                .map_err(persistence("Failed to commit documents"))?;
            Ok(written)
        })
        .await
    }

    pub async fn document_count(&self) -> Result<usize> {
        self.call(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
                .map_err(persistence("Failed to count documents"))?;
            Ok(usize::try_from(count).unwrap_or_default())
        })
        .await
    }

    pub async fn documents_titled(&self, title: &str) -> Result<Vec<DocumentRow>> {
        let title = title.to_string();
        self.call(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT point_id, title, content FROM documents
                     WHERE title = ?1 ORDER BY id",
                )
                .map_err(persistence("Failed to query documents"))?;
            let rows = stmt
                .query_map([title], |row| {
                    Ok(DocumentRow {
                        point_id: row.get(0)?,
                        title: row.get(1)?,
                        content: row.get(2)?,
                    })
                })
                .map_err(persistence("Failed to query documents"))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(persistence("Failed to read document row"))?;
            Ok(rows)
        })
        .await
    }
}
