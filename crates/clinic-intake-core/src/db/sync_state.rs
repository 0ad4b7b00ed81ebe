//! Sync bookkeeping database operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbResult};

impl Database {
    /// Get sync state value.
    pub fn get_sync_state(&self, key: &str) -> DbResult<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM sync_state WHERE key = ?",
                [key],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Set sync state value.
    pub fn set_sync_state(&self, key: &str, value: &str) -> DbResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO sync_state (key, value, updated_at) VALUES (?, ?, datetime('now'))",
            params![key, value],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_state() {
        let db = Database::open_in_memory().unwrap();

        // Default values from schema
        assert_eq!(db.get_sync_state("last_sync_at").unwrap(), Some("".to_string()));
        assert_eq!(db.get_sync_state("last_sync_count").unwrap(), Some("0".to_string()));
        assert_eq!(db.get_sync_state("missing").unwrap(), None);

        db.set_sync_state("last_sync_at", "2024-05-01T10:00:00Z")
            .unwrap();
        assert_eq!(
            db.get_sync_state("last_sync_at").unwrap(),
            Some("2024-05-01T10:00:00Z".to_string())
        );
    }
}
