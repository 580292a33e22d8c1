//! SQLite persistence for the tutor chatbot
//!
//! One database file holds the append-only chat history, the registry of
//! ingested document chunks, and user accounts. `rusqlite` is blocking, so
//! every statement runs on the blocking thread pool.

mod db;
mod documents;
mod history;
mod users;

pub use db::Database;
pub use documents::DocumentRow;
pub use history::{HistoryEntry, SqliteInteractionRecorder};
pub use users::{NewUser, UserProfile};

pub use tutor_core::{Error, Result};
