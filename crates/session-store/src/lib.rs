//! Session Storage Layer
//!
//! One record per session id holding everything needed to resume a test
//! after a reload: start time, violation counters, answers, review marks,
//! and whether submission had already started. Records live in SQLite,
//! one row per session id.

mod record;
mod store;

pub use record::{ResultVisibility, SessionRecord, TerminationReason};
pub use store::{MemoryStore, SessionStore, SqliteStore};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Lock error: {0}")]
    Lock(String),
    #[error("Schema version {found} is newer than supported version {supported}")]
    SchemaVersion { found: i32, supported: i32 },
}

impl From<postcard::Error> for StorageError {
    fn from(e: postcard::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}
