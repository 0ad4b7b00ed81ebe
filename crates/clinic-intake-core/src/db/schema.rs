//! SQLite schema definition.

/// Complete local database schema for clinic intake.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Offline Queue (pending records, append-only until synced)
-- ============================================================================

-- AUTOINCREMENT so a sequence number is never handed out twice, even after
-- the highest entry was removed by a sync.
CREATE TABLE IF NOT EXISTS offline_queue (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    client_ref TEXT NOT NULL,
    payload TEXT NOT NULL,                       -- JSON PatientRecord
    revision INTEGER NOT NULL DEFAULT 0,         -- bumped on every replace
    queued_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_offline_queue_client_ref ON offline_queue(client_ref);

-- ============================================================================
-- Snapshot Cache (last known-good server responses)
-- ============================================================================

CREATE TABLE IF NOT EXISTS snapshot_cache (
    key TEXT PRIMARY KEY,                        -- e.g. 'patients-list', 'stats'
    payload TEXT NOT NULL,                       -- JSON response body
    fetched_at TEXT NOT NULL
);

-- ============================================================================
-- Sync State
-- ============================================================================

CREATE TABLE IF NOT EXISTS sync_state (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Track last successful queue drain
INSERT OR IGNORE INTO sync_state (key, value) VALUES ('last_sync_at', '');
INSERT OR IGNORE INTO sync_state (key, value) VALUES ('last_sync_count', '0');
"#;
