//! Local durable queue of records awaiting submission.
//!
//! Every operation takes the database lock for its own duration only, so an
//! enqueue or replace can always land between a sync's snapshot and its
//! clear. Removal is therefore by stamp: a clear only touches the exact
//! entry images that were listed.

use tracing::{debug, info};

use crate::db::{DbError, DbResult, QueueEntry, QueueEntryId, QueueStamp, SharedDatabase};
use crate::models::PatientRecord;

/// Handle to the offline queue.
#[derive(Clone)]
pub struct OfflineQueue {
    db: SharedDatabase,
}

impl OfflineQueue {
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    /// Append a record. Fails with `StorageUnavailable` if the store cannot be written.
    pub fn enqueue(&self, record: &PatientRecord) -> DbResult<QueueEntryId> {
        let db = self.db.lock()?;
        let id = db
            .enqueue_pending(record)
            .map_err(DbError::into_unavailable)?;
        info!(queue_id = id.0, client_ref = %record.client_ref, "queued record offline");
        Ok(id)
    }

    /// Snapshot the queue in insertion order.
    pub fn list_all(&self) -> DbResult<Vec<QueueEntry>> {
        let db = self.db.lock()?;
        db.list_pending().map_err(DbError::into_unavailable)
    }

    /// Remove exactly the entries in `stamps`. An empty set is a no-op.
    ///
    /// An entry replaced since its stamp was taken is kept.
    pub fn clear(&self, stamps: &[QueueStamp]) -> DbResult<usize> {
        if stamps.is_empty() {
            return Ok(0);
        }
        let mut db = self.db.lock()?;
        let removed = db
            .remove_pending(stamps)
            .map_err(DbError::into_unavailable)?;
        debug!(requested = stamps.len(), removed, "cleared synced queue entries");
        Ok(removed)
    }

    /// Drop every pending record. Administrative reset only; sync never uses it.
    pub fn clear_all(&self) -> DbResult<usize> {
        let db = self.db.lock()?;
        let removed = db.clear_all_pending().map_err(DbError::into_unavailable)?;
        info!(removed, "offline queue reset");
        Ok(removed)
    }

    /// Swap in a new image of a still-pending record.
    pub fn replace(&self, id: QueueEntryId, record: &PatientRecord) -> DbResult<()> {
        let db = self.db.lock()?;
        if db
            .replace_pending(id, record)
            .map_err(DbError::into_unavailable)?
        {
            Ok(())
        } else {
            Err(DbError::NotFound(format!("queue entry {}", id)))
        }
    }

    pub fn len(&self) -> DbResult<usize> {
        let db = self.db.lock()?;
        db.count_pending().map_err(DbError::into_unavailable)
    }

    pub fn is_empty(&self) -> DbResult<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::IntakeForm;

    fn setup_queue() -> OfflineQueue {
        OfflineQueue::new(Database::open_in_memory().unwrap().into_shared())
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
    fn test_clear_empty_is_noop() {
        let queue = setup_queue();
        assert_eq!(queue.clear(&[]).unwrap(), 0);
        assert!(queue.is_empty().unwrap());

        queue.enqueue(&make_record("Asha")).unwrap();
        assert_eq!(queue.clear(&[]).unwrap(), 0);
        assert_eq!(queue.len().unwrap(), 1);
    }

    #[test]
    fn test_clear_spares_later_entries() {
        let queue = setup_queue();
        queue.enqueue(&make_record("A")).unwrap();
        let batch: Vec<_> = queue.list_all().unwrap().iter().map(|e| e.stamp()).collect();

        queue.enqueue(&make_record("B")).unwrap();
        queue.clear(&batch).unwrap();

        let left = queue.list_all().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].record.name, "B");
    }

    #[test]
    fn test_clear_keeps_replaced_entry() {
        let queue = setup_queue();
        let id = queue.enqueue(&make_record("Asha")).unwrap();
        let batch: Vec<_> = queue.list_all().unwrap().iter().map(|e| e.stamp()).collect();

        let mut corrected = make_record("Asha");
        corrected.phone = "999".into();
        queue.replace(id, &corrected).unwrap();

        assert_eq!(queue.clear(&batch).unwrap(), 0);
        let left = queue.list_all().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].record.phone, "999");
    }

    #[test]
    fn test_replace_missing_entry() {
        let queue = setup_queue();
        let result = queue.replace(QueueEntryId(42), &make_record("Asha"));
        assert!(matches!(result, Err(DbError::NotFound(_))));
    }

    #[test]
    fn test_storage_unavailable() {
        let db = Database::open_in_memory().unwrap();
        db.conn().execute_batch("DROP TABLE offline_queue").unwrap();
        let queue = OfflineQueue::new(db.into_shared());

        let err = queue.enqueue(&make_record("Asha")).unwrap_err();
        assert!(err.is_storage_unavailable());
    }
}
