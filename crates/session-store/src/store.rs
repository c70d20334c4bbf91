//! Store implementations

use crate::record::SessionRecord;
use crate::StorageError;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Single read/write path for session state
///
/// Writes are synchronous: when `save` returns the record survives an
/// abrupt exit.
pub trait SessionStore: Send + Sync {
    fn load(&self, session_id: &str) -> Result<Option<SessionRecord>, StorageError>;
    fn save(&self, record: &SessionRecord) -> Result<(), StorageError>;
    /// Removing a missing record is not an error
    fn remove(&self, session_id: &str) -> Result<(), StorageError>;
}

/// In-memory store
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, SessionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemoryStore {
    fn load(&self, session_id: &str) -> Result<Option<SessionRecord>, StorageError> {
        let records = self
            .records
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;
        Ok(records.get(session_id).cloned())
    }

    fn save(&self, record: &SessionRecord) -> Result<(), StorageError> {
        let mut records = self
            .records
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;
        records.insert(record.session_id.clone(), record.clone());
        Ok(())
    }

    fn remove(&self, session_id: &str) -> Result<(), StorageError> {
        let mut records = self
            .records
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;
        records.remove(session_id);
        Ok(())
    }
}

const SCHEMA_VERSION: i32 = 1;

const SCHEMA_V1: &str = "
CREATE TABLE sessions (
    session_id     TEXT PRIMARY KEY NOT NULL,
    start_epoch_ms INTEGER NOT NULL,
    record         BLOB NOT NULL
);
";

fn run_migrations(conn: &mut Connection) -> Result<(), StorageError> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if version > SCHEMA_VERSION {
        return Err(StorageError::SchemaVersion {
            found: version,
            supported: SCHEMA_VERSION,
        });
    }
    if version == SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;
    if version < 1 {
        tx.execute_batch(SCHEMA_V1)?;
    }
    tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    tx.commit()?;
    info!("Migrated session store schema {} -> {}", version, SCHEMA_VERSION);
    Ok(())
}

/// SQLite-backed store, one row per session id
///
/// The record body is postcard-encoded. `synchronous = FULL` makes every
/// committed `save` durable before it returns.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (and create if needed) a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        match conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0)) {
            Ok(mode) => debug!("Session store journal mode {}", mode),
            Err(e) => warn!("Failed to enable WAL mode: {}", e),
        }
        let store = Self::init(conn, Some(path))?;
        info!("Opened session store at {}", store.describe());
        Ok(store)
    }

    /// Private database that lives as long as the store
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(mut conn: Connection, path: Option<PathBuf>) -> Result<Self, StorageError> {
        conn.pragma_update(None, "synchronous", "FULL")?;
        run_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn describe(&self) -> String {
        self.path
            .as_ref()
            .map_or_else(|| ":memory:".to_string(), |p| p.display().to_string())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|e| StorageError::Lock(e.to_string()))
    }
}

impl SessionStore for SqliteStore {
    fn load(&self, session_id: &str) -> Result<Option<SessionRecord>, StorageError> {
        let bytes: Option<Vec<u8>> = self
            .conn()?
            .query_row(
                "SELECT record FROM sessions WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()?;
        match bytes {
            Some(bytes) => {
                let record: SessionRecord = postcard::from_bytes(&bytes)?;
                debug!("Loaded session {} ({} bytes)", session_id, bytes.len());
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn save(&self, record: &SessionRecord) -> Result<(), StorageError> {
        let bytes = postcard::to_allocvec(record)?;
        self.conn()?.execute(
            "INSERT INTO sessions (session_id, start_epoch_ms, record)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(session_id) DO UPDATE
             SET start_epoch_ms = excluded.start_epoch_ms,
                 record = excluded.record",
            params![record.session_id, record.start_epoch_ms, bytes],
        )?;
        debug!("Saved session {} ({} bytes)", record.session_id, bytes.len());
        Ok(())
    }

    fn remove(&self, session_id: &str) -> Result<(), StorageError> {
        let removed = self
            .conn()?
            .execute("DELETE FROM sessions WHERE session_id = ?1", params![session_id])?;
        if removed > 0 {
            info!("Removed session {}", session_id);
        }
        Ok(())
    }
}
