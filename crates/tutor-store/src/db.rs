//! SQLite connection handle and schema migrations

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tracing::info;

use tutor_core::{Error, Result};

const MIGRATION_0001: (&str, &str) = (
    "0001_chat_history.sql",
    include_str!("../migrations/0001_chat_history.sql"),
);

const MIGRATION_0002: (&str, &str) = (
    "0002_documents.sql",
    include_str!("../migrations/0002_documents.sql"),
);

const MIGRATION_0003: (&str, &str) = ("0003_users.sql", include_str!("../migrations/0003_users.sql"));

fn migrations() -> Vec<(&'static str, &'static str)> {
    vec![MIGRATION_0001, MIGRATION_0002, MIGRATION_0003]
}

pub(crate) fn persistence(context: &str) -> impl Fn(rusqlite::Error) -> Error + '_ {
    move |e| Error::Persistence(format!("{context}: {e}"))
}

/// Shared handle to the SQLite database
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file and apply pending migrations
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(persistence("Failed to open SQLite database"))?;
        info!(path = %path.display(), "opened database");
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(persistence("Failed to open in-memory SQLite database"))?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking thread pool
    pub async fn call<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|e| Error::Persistence(format!("Database lock poisoned: {e}")))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| Error::Persistence(format!("Database task failed: {e}")))?
    }

    /// Names of applied migrations, in order
    pub async fn applied_migrations(&self) -> Result<Vec<String>> {
        self.call(|conn| {
            let mut stmt = conn
                .prepare("SELECT name FROM _migrations ORDER BY name")
                .map_err(persistence("Failed to list migrations"))?;
            let names = stmt
                .query_map([], |row| row.get(0))
                .map_err(persistence("Failed to list migrations"))?
                .collect::<std::result::Result<Vec<String>, _>>()
                .map_err(persistence("Failed to read migration row"))?;
            Ok(names)
        })
        .await
    }
}

/// Apply each migration exactly once, in order
fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        r#"
      CREATE TABLE IF NOT EXISTS _migrations (
        name TEXT PRIMARY KEY NOT NULL,
        applied_at TEXT NOT NULL
      );
    "#,
    )
    .map_err(persistence("Failed to create migrations table"))?;

    for (name, sql) in migrations() {
        let applied: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM _migrations WHERE name = ?1)",
                [name],
                |row| row.get(0),
            )
            .map_err(persistence("Failed to check migration"))?;
        if applied {
            continue;
        }

        let tx = conn
            .transaction()
            .map_err(persistence("Failed to start migration transaction"))?;
        tx.execute_batch(sql).map_err(persistence(name))?;
        tx.execute(
            "INSERT INTO _migrations (name, applied_at) VALUES (?1, ?2)",
            rusqlite::params![name, chrono::Utc::now().to_rfc3339()],
        )
        .map_err(persistence("Failed to record migration"))?;
        tx.commit().map_err(persistence("Failed to commit migration"))?;
        info!(migration = name, "applied migration");
    }

    Ok(())
}
