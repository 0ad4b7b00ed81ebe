//! Snapshot cache database operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbResult};

/// A stored server response.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRow {
    pub key: String,
    pub payload: String,
    pub fetched_at: String,
}

impl Database {
    /// Overwrite the snapshot for a key.
    pub fn put_snapshot(&self, key: &str, payload: &str, fetched_at: &str) -> DbResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO snapshot_cache (key, payload, fetched_at) VALUES (?1, ?2, ?3)",
            params![key, payload, fetched_at],
        )?;
        Ok(())
    }

    /// Get the snapshot for a key.
    pub fn get_snapshot(&self, key: &str) -> DbResult<Option<SnapshotRow>> {
        self.conn
            .query_row(
                "SELECT key, payload, fetched_at FROM snapshot_cache WHERE key = ?",
                [key],
                |row| {
                    Ok(SnapshotRow {
                        key: row.get(0)?,
                        payload: row.get(1)?,
                        fetched_at: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    /// Drop the snapshot for a key.
    pub fn delete_snapshot(&self, key: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM snapshot_cache WHERE key = ?", [key])?;
        Ok(rows_affected > 0)
    }
}
