//! Database layer for clinic intake.

mod schema;
mod queue;
mod snapshots;
mod sync_state;

pub use schema::*;
pub use queue::*;
pub use snapshots::*;

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Local storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl DbError {
    /// Collapse an I/O-level failure into `StorageUnavailable`.
    ///
    /// Serialization and lookup errors pass through unchanged.
    pub fn into_unavailable(self) -> Self {
        match self {
            DbError::Sqlite(e) => DbError::StorageUnavailable(e.to_string()),
            other => other,
        }
    }

    pub fn is_storage_unavailable(&self) -> bool {
        matches!(self, DbError::StorageUnavailable(_))
    }
}

impl<T> From<std::sync::PoisonError<T>> for DbError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        DbError::StorageUnavailable(format!("Lock poisoned: {}", e))
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Database handle shared by the queue, cache and sync components.
///
/// Each component locks it per operation; no lock is held across a remote call.
pub type SharedDatabase = Arc<Mutex<Database>>;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Wrap for sharing between components.
    pub fn into_shared(self) -> SharedDatabase {
        Arc::new(Mutex::new(self))
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}
