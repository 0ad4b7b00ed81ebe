//! Interface to the server of record.
//!
//! The core never talks HTTP itself. Everything it needs from the remote
//! store goes through [`RemoteStore`]; network errors, timeouts and
//! non-success responses all collapse into [`TransportError`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{PatientRecord, PersistedRecord, StatsSummary, VisitStatus};

/// Any failed remote call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server returned status {0}")]
    Status(u16),

    #[error("Server rejected request: {0}")]
    Rejected(String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Free-text filter over name, phone and problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFilter {
    pub query: String,
}

impl ListFilter {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }
}

/// Server acknowledgment of a batch insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReceipt {
    pub inserted_count: usize,
}

/// Request/response calls against the server of record.
pub trait RemoteStore: Send + Sync {
    /// Persist a single record.
    fn create_record(&self, record: &PatientRecord) -> TransportResult<PersistedRecord>;

    /// Persist a batch of records in one call, in the given order.
    fn batch_create(&self, records: &[PatientRecord]) -> TransportResult<BatchReceipt>;

    /// List persisted records, newest first. `None` lists everything.
    fn fetch_list(&self, filter: Option<&ListFilter>) -> TransportResult<Vec<PersistedRecord>>;

    /// Dashboard counters.
    fn fetch_stats(&self) -> TransportResult<StatsSummary>;

    fn update_status(&self, id: &str, status: VisitStatus) -> TransportResult<PersistedRecord>;

    fn set_prescription(&self, id: &str, prescription: &str) -> TransportResult<PersistedRecord>;

    fn delete_record(&self, id: &str) -> TransportResult<()>;
}

type BatchHook = Box<dyn FnMut(&[PatientRecord]) + Send>;

/// In-memory remote store for testing without a server.
///
/// Behaves like the real server (server IDs, newest-first listing, stats
/// aggregation) and can be switched into failure modes.
#[derive(Default)]
pub struct MockRemoteStore {
    records: Mutex<Vec<PersistedRecord>>,
    batches: Mutex<Vec<Vec<PatientRecord>>>,
    next_id: AtomicU64,
    failing: AtomicBool,
    short_ack: Mutex<Option<usize>>,
    batch_hook: Mutex<Option<BatchHook>>,
}

impl MockRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with a network error until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Acknowledge batches with this count instead of the real one.
    pub fn set_short_ack(&self, count: Option<usize>) {
        *self.short_ack.lock().unwrap_or_else(PoisonError::into_inner) = count;
    }

    /// Run `hook` while a batch is in flight, before it is acknowledged.
    pub fn set_batch_hook<F>(&self, hook: F)
    where
        F: FnMut(&[PatientRecord]) + Send + 'static,
    {
        *self.batch_hook.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(hook));
    }

    /// Seed a record as if it had been created earlier.
    pub fn insert(&self, record: PersistedRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    /// Every persisted record, oldest first.
    pub fn records(&self) -> Vec<PersistedRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Every batch received, in arrival order.
    pub fn batches(&self) -> Vec<Vec<PatientRecord>> {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn check(&self) -> TransportResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(TransportError::Network("connection refused".into()))
        } else {
            Ok(())
        }
    }

    fn persist(&self, record: &PatientRecord) -> PersistedRecord {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let persisted = PersistedRecord::from_pending(
            format!("srv-{}", id),
            record,
            chrono::Utc::now().to_rfc3339(),
        );
        self.insert(persisted.clone());
        persisted
    }

    fn modify<F>(&self, id: &str, change: F) -> TransportResult<PersistedRecord>
    where
        F: FnOnce(&mut PersistedRecord),
    {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(TransportError::Status(404))?;
        change(record);
        Ok(record.clone())
    }
}

impl RemoteStore for MockRemoteStore {
    fn create_record(&self, record: &PatientRecord) -> TransportResult<PersistedRecord> {
        self.check()?;
        Ok(self.persist(record))
    }

    fn batch_create(&self, records: &[PatientRecord]) -> TransportResult<BatchReceipt> {
        self.check()?;
        if let Some(hook) = self
            .batch_hook
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
        {
            hook(records);
        }
        // Hooks may flip the failure switch to simulate a mid-flight drop.
        self.check()?;

        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(records.to_vec());
        for record in records {
            self.persist(record);
        }

        let acknowledged = *self.short_ack.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(BatchReceipt {
            inserted_count: acknowledged.unwrap_or(records.len()),
        })
    }

    fn fetch_list(&self, filter: Option<&ListFilter>) -> TransportResult<Vec<PersistedRecord>> {
        self.check()?;
        let mut records: Vec<PersistedRecord> = self
            .records()
            .into_iter()
            .filter(|r| filter.map_or(true, |f| r.matches(&f.query)))
            .collect();
        records.reverse();
        Ok(records)
    }

    fn fetch_stats(&self) -> TransportResult<StatsSummary> {
        self.check()?;
        let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
        Ok(StatsSummary::from_records(&self.records(), &today))
    }

    fn update_status(&self, id: &str, status: VisitStatus) -> TransportResult<PersistedRecord> {
        self.check()?;
        self.modify(id, |r| r.status = status)
    }

    fn set_prescription(&self, id: &str, prescription: &str) -> TransportResult<PersistedRecord> {
        self.check()?;
        self.modify(id, |r| r.prescription = prescription.to_string())
    }

    fn delete_record(&self, id: &str) -> TransportResult<()> {
        self.check()?;
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|r| r.id != id);
        Ok(())
    }
}
