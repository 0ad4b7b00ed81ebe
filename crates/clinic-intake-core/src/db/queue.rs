//! Offline queue database operations.

use std::fmt;

use rusqlite::params;
use serde::{Deserialize, Serialize};

use super::{Database, DbError, DbResult};
use crate::models::PatientRecord;

/// Local sequence number of a queued record.
///
/// Strictly increasing and never reused, so a stale ID can never address a
/// record that was enqueued later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QueueEntryId(pub i64);

impl fmt::Display for QueueEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A pending record as stored in the offline queue.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    pub id: QueueEntryId,
    pub record: PatientRecord,
    /// Incremented each time the stored image is replaced.
    pub revision: i64,
    pub queued_at: String,
}

impl QueueEntry {
    pub fn stamp(&self) -> QueueStamp {
        QueueStamp {
            id: self.id,
            revision: self.revision,
        }
    }
}

/// Identifies one stored image of a queued record.
///
/// Removing by stamp leaves an entry alone if it was replaced after the
/// stamp was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueStamp {
    pub id: QueueEntryId,
    pub revision: i64,
}

impl Database {
    /// Append a pending record.
    pub fn enqueue_pending(&self, record: &PatientRecord) -> DbResult<QueueEntryId> {
        let payload = serde_json::to_string(record)?;
        self.conn.execute(
            "INSERT INTO offline_queue (client_ref, payload, queued_at) VALUES (?1, ?2, ?3)",
            params![record.client_ref, payload, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(QueueEntryId(self.conn.last_insert_rowid()))
    }

    /// List pending records in insertion order.
    pub fn list_pending(&self) -> DbResult<Vec<QueueEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT seq, payload, revision, queued_at
            FROM offline_queue
            ORDER BY seq
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(QueueRow {
                seq: row.get(0)?,
                payload: row.get(1)?,
                revision: row.get(2)?,
                queued_at: row.get(3)?,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.try_into()?);
        }
        Ok(entries)
    }

    /// Count pending records.
    pub fn count_pending(&self) -> DbResult<usize> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM offline_queue", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Remove exactly the given entry images in one transaction.
    ///
    /// Unknown IDs and stale revisions are ignored. Returns the number of
    /// rows removed.
    pub fn remove_pending(&mut self, stamps: &[QueueStamp]) -> DbResult<usize> {
        if stamps.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.transaction()?;
        let mut removed = 0;
        {
            let mut stmt =
                tx.prepare("DELETE FROM offline_queue WHERE seq = ?1 AND revision = ?2")?;
            for stamp in stamps {
                removed += stmt.execute(params![stamp.id.0, stamp.revision])?;
            }
        }
        tx.commit()?;
        Ok(removed)
    }

    /// Remove every pending record.
    pub fn clear_all_pending(&self) -> DbResult<usize> {
        let removed = self.conn.execute("DELETE FROM offline_queue", [])?;
        Ok(removed)
    }

    /// Replace the stored image of a pending record.
    pub fn replace_pending(&self, id: QueueEntryId, record: &PatientRecord) -> DbResult<bool> {
        let payload = serde_json::to_string(record)?;
        let rows_affected = self.conn.execute(
            r#"
            UPDATE offline_queue
            SET client_ref = ?2, payload = ?3, revision = revision + 1
            WHERE seq = ?1
            "#,
            params![id.0, record.client_ref, payload],
        )?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row struct for database mapping.
struct QueueRow {
    seq: i64,
    payload: String,
    revision: i64,
    queued_at: String,
}

impl TryFrom<QueueRow> for QueueEntry {
    type Error = DbError;

    fn try_from(row: QueueRow) -> Result<Self, Self::Error> {
        let record: PatientRecord = serde_json::from_str(&row.payload)?;
        Ok(QueueEntry {
            id: QueueEntryId(row.seq),
            record,
            revision: row.revision,
            queued_at: row.queued_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IntakeForm;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn make_record(name: &str) -> PatientRecord {
        PatientRecord::from_form(IntakeForm {
            name: name.into(),
            age: 30,
            phone: "555".into(),
            problem: "fever".into(),
            doctor: "Dr.Rao".into(),
            date: "2024-05-01".into(),
            time: "10:00".into(),
        })
    }

    #[test]
    fn test_enqueue_and_list() {
        let db = setup_db();

        let first = db.enqueue_pending(&make_record("Asha")).unwrap();
        let second = db.enqueue_pending(&make_record("Ravi")).unwrap();
        assert!(second > first);

        let entries = db.list_pending().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, first);
        assert_eq!(entries[0].record.name, "Asha");
        assert_eq!(entries[1].record.name, "Ravi");
    }

    #[test]
    fn test_list_is_repeatable() {
        let db = setup_db();
        db.enqueue_pending(&make_record("Asha")).unwrap();

        let first = db.list_pending().unwrap();
        let second = db.list_pending().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_remove_only_given_ids() {
        let mut db = setup_db();
        db.enqueue_pending(&make_record("A")).unwrap();
        let b = db.enqueue_pending(&make_record("B")).unwrap();
        db.enqueue_pending(&make_record("C")).unwrap();

        let entries = db.list_pending().unwrap();
        let removed = db
            .remove_pending(&[entries[0].stamp(), entries[2].stamp()])
            .unwrap();
        assert_eq!(removed, 2);

        let entries = db.list_pending().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, b);
    }

    #[test]
    fn test_remove_empty_and_unknown() {
        let mut db = setup_db();
        assert_eq!(db.remove_pending(&[]).unwrap(), 0);

        db.enqueue_pending(&make_record("A")).unwrap();
        assert_eq!(db.remove_pending(&[]).unwrap(), 0);
        let unknown = QueueStamp {
            id: QueueEntryId(999),
            revision: 0,
        };
        assert_eq!(db.remove_pending(&[unknown]).unwrap(), 0);
        assert_eq!(db.count_pending().unwrap(), 1);
    }

    #[test]
    fn test_remove_skips_replaced_entry() {
        let mut db = setup_db();
        let id = db.enqueue_pending(&make_record("Asha")).unwrap();
        let stale = db.list_pending().unwrap()[0].stamp();
        assert_eq!(stale.revision, 0);

        let mut corrected = make_record("Asha");
        corrected.phone = "999".into();
        assert!(db.replace_pending(id, &corrected).unwrap());

        assert_eq!(db.remove_pending(&[stale]).unwrap(), 0);
        let entries = db.list_pending().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].revision, 1);
        assert_eq!(entries[0].record.phone, "999");

        assert_eq!(db.remove_pending(&[entries[0].stamp()]).unwrap(), 1);
        assert_eq!(db.count_pending().unwrap(), 0);
    }

    #[test]
    fn test_replace_pending() {
        let db = setup_db();
        let id = db.enqueue_pending(&make_record("Asha")).unwrap();

        let mut updated = make_record("Asha K");
        updated.phone = "556".into();
        assert!(db.replace_pending(id, &updated).unwrap());
        assert!(!db.replace_pending(QueueEntryId(999), &updated).unwrap());

        let entries = db.list_pending().unwrap();
        assert_eq!(entries[0].id, id);
        assert_eq!(entries[0].revision, 1);
        assert_eq!(entries[0].record, updated);
    }

    #[test]
    fn test_clear_all() {
        let db = setup_db();
        db.enqueue_pending(&make_record("A")).unwrap();
        db.enqueue_pending(&make_record("B")).unwrap();

        assert_eq!(db.clear_all_pending().unwrap(), 2);
        assert_eq!(db.count_pending().unwrap(), 0);
        assert_eq!(db.clear_all_pending().unwrap(), 0);
    }
}
