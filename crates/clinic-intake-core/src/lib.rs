//! Clinic Intake Core Library
//!
//! Offline-first patient intake: records are accepted whether or not the
//! clinic server is reachable, and nothing accepted is ever lost.
//!
//! # Architecture
//!
//! ```text
//!   Intake form ──validate──▶ SubmissionGateway
//!                                  │
//!                 online? ─────────┼──────────── offline / call failed
//!                    │                                  │
//!                    ▼                                  ▼
//!              RemoteStore ◀──── batch ────── [offline_queue (SQLite)]
//!                    │              ▲
//!                    │              │ WentOnline
//!                    │        SyncOrchestrator ◀── ConnectivityMonitor ◀── host reachability
//!                    ▼
//!              CacheLayer ──▶ [snapshot_cache (SQLite)] ──▶ list / stats when offline
//! ```
//!
//! # Core Principle
//!
//! **A queued record leaves the queue only after the server confirmed it.**
//! Delivery is at-least-once; every record carries a `client_ref` for dedup.
//!
//! # Modules
//!
//! - [`db`]: SQLite storage for the queue, snapshots and sync bookkeeping
//! - [`models`]: Domain types (PatientRecord, PersistedRecord, StatsSummary)
//! - [`remote`]: The `RemoteStore` seam and an in-memory mock
//! - [`connectivity`]: Online/offline state and transition events
//! - [`queue`], [`cache`], [`gateway`], [`sync`]: the offline-first components
//! - [`intake`]: Process-scoped context wiring the components together

pub mod cache;
pub mod config;
pub mod connectivity;
pub mod db;
pub mod events;
pub mod gateway;
pub mod intake;
pub mod logging;
pub mod models;
pub mod queue;
pub mod remote;
pub mod sync;

// Re-export commonly used types
pub use cache::{CacheLayer, CachedRead, Snapshot};
pub use config::IntakeConfig;
pub use connectivity::{ConnectivityEvent, ConnectivityMonitor, ConnectivityState};
pub use db::{Database, DbError, QueueEntry, QueueEntryId, QueueStamp};
pub use gateway::{SubmissionGateway, SubmitOutcome};
pub use intake::{ActionError, IntakeContext, PatientListing};
pub use logging::init_logging;
pub use models::{
    DoctorCount, IntakeForm, PatientRecord, PersistedRecord, StatsSummary, ValidationError,
    VisitStatus,
};
pub use queue::OfflineQueue;
pub use remote::{BatchReceipt, ListFilter, MockRemoteStore, RemoteStore, TransportError};
pub use sync::{SyncError, SyncEvent, SyncOrchestrator, SyncOutcome, SyncStatus};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::Arc;

use tracing::warn;

use crate::remote::TransportResult;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum IntakeError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Local storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("This action needs connectivity")]
    Offline,

    #[error("Remote call failed: {0}")]
    TransportError(String),

    #[error("Sync error: {0}")]
    SyncError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<DbError> for IntakeError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::StorageUnavailable(msg) => IntakeError::StorageUnavailable(msg),
            DbError::NotFound(msg) => IntakeError::NotFound(msg),
            other => IntakeError::DatabaseError(other.to_string()),
        }
    }
}

impl From<TransportError> for IntakeError {
    fn from(e: TransportError) -> Self {
        IntakeError::TransportError(e.to_string())
    }
}

impl From<ValidationError> for IntakeError {
    fn from(e: ValidationError) -> Self {
        IntakeError::InvalidInput(e.to_string())
    }
}

impl From<ActionError> for IntakeError {
    fn from(e: ActionError) -> Self {
        match e {
            ActionError::Offline => IntakeError::Offline,
            ActionError::Invalid(e) => e.into(),
            ActionError::Transport(e) => e.into(),
            ActionError::Storage(e) => e.into(),
        }
    }
}

impl From<SyncError> for IntakeError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::Storage(e) => e.into(),
            other => IntakeError::SyncError(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for IntakeError {
    fn from(e: anyhow::Error) -> Self {
        IntakeError::ConfigError(e.to_string())
    }
}

// =========================================================================
// Foreign Remote Store (implemented by the host app)
// =========================================================================

/// Transport failure reported by a host-side remote store.
#[derive(Debug, Clone, thiserror::Error, uniffi::Error)]
pub enum FfiTransportError {
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

impl From<uniffi::UnexpectedUniFFICallbackError> for FfiTransportError {
    fn from(e: uniffi::UnexpectedUniFFICallbackError) -> Self {
        FfiTransportError::Network(e.reason)
    }
}

impl From<FfiTransportError> for TransportError {
    fn from(e: FfiTransportError) -> Self {
        match e {
            FfiTransportError::Network(msg) => TransportError::Network(msg),
            FfiTransportError::Timeout => TransportError::Timeout,
            FfiTransportError::Status(code) => TransportError::Status(code),
            FfiTransportError::Rejected(msg) => TransportError::Rejected(msg),
            FfiTransportError::Malformed(msg) => TransportError::Malformed(msg),
        }
    }
}

/// Server calls the host performs on behalf of the core.
#[uniffi::export(with_foreign)]
pub trait FfiRemoteStore: Send + Sync {
    fn create_record(
        &self,
        record: FfiPatientRecord,
    ) -> Result<FfiPersistedRecord, FfiTransportError>;

    /// Returns the number of records the server inserted.
    fn batch_create(&self, records: Vec<FfiPatientRecord>) -> Result<u64, FfiTransportError>;

    fn fetch_list(
        &self,
        query: Option<String>,
    ) -> Result<Vec<FfiPersistedRecord>, FfiTransportError>;

    fn fetch_stats(&self) -> Result<FfiStatsSummary, FfiTransportError>;

    fn update_status(
        &self,
        id: String,
        status: String,
    ) -> Result<FfiPersistedRecord, FfiTransportError>;

    fn set_prescription(
        &self,
        id: String,
        prescription: String,
    ) -> Result<FfiPersistedRecord, FfiTransportError>;

    fn delete_record(&self, id: String) -> Result<(), FfiTransportError>;
}

/// Adapts a host implementation to [`RemoteStore`].
struct ForeignRemote(Arc<dyn FfiRemoteStore>);

impl ForeignRemote {
    fn persisted(record: FfiPersistedRecord) -> TransportResult<PersistedRecord> {
        PersistedRecord::try_from(record).map_err(TransportError::Malformed)
    }
}

impl RemoteStore for ForeignRemote {
    fn create_record(&self, record: &PatientRecord) -> TransportResult<PersistedRecord> {
        let created = self.0.create_record(record.clone().into())?;
        Self::persisted(created)
    }

    fn batch_create(&self, records: &[PatientRecord]) -> TransportResult<BatchReceipt> {
        let batch = records.iter().cloned().map(Into::into).collect();
        let inserted = self.0.batch_create(batch)?;
        Ok(BatchReceipt {
            inserted_count: inserted as usize,
        })
    }

    fn fetch_list(&self, filter: Option<&ListFilter>) -> TransportResult<Vec<PersistedRecord>> {
        self.0
            .fetch_list(filter.map(|f| f.query.clone()))?
            .into_iter()
            .map(Self::persisted)
            .collect()
    }

    fn fetch_stats(&self) -> TransportResult<StatsSummary> {
        Ok(self.0.fetch_stats()?.into())
    }

    fn update_status(&self, id: &str, status: VisitStatus) -> TransportResult<PersistedRecord> {
        let updated = self
            .0
            .update_status(id.to_string(), status.as_str().to_string())?;
        Self::persisted(updated)
    }

    fn set_prescription(&self, id: &str, prescription: &str) -> TransportResult<PersistedRecord> {
        let updated = self
            .0
            .set_prescription(id.to_string(), prescription.to_string())?;
        Self::persisted(updated)
    }

    fn delete_record(&self, id: &str) -> TransportResult<()> {
        Ok(self.0.delete_record(id.to_string())?)
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open the intake core with an on-disk database.
///
/// `reachable` is the host's reachability reading at startup; `None` counts
/// as online. When starting online, records queued by an earlier session are
/// synced before this returns.
#[uniffi::export]
pub fn open_intake(
    config: IntakeConfig,
    remote: Arc<dyn FfiRemoteStore>,
    reachable: Option<bool>,
) -> Result<Arc<ClinicIntake>, IntakeError> {
    config.validate()?;
    init_logging(&config.log_level)?;
    let db = Database::open(&config.database_path)?;
    Ok(ClinicIntake::with_database(db, remote, reachable))
}

/// Open the intake core over an in-memory database (for testing).
#[uniffi::export]
pub fn open_intake_in_memory(
    remote: Arc<dyn FfiRemoteStore>,
    reachable: Option<bool>,
) -> Result<Arc<ClinicIntake>, IntakeError> {
    let db = Database::open_in_memory()?;
    Ok(ClinicIntake::with_database(db, remote, reachable))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe intake context for FFI.
#[derive(uniffi::Object)]
pub struct ClinicIntake {
    context: IntakeContext,
}

impl ClinicIntake {
    fn with_database(
        db: Database,
        remote: Arc<dyn FfiRemoteStore>,
        reachable: Option<bool>,
    ) -> Arc<Self> {
        let remote: Arc<dyn RemoteStore> = Arc::new(ForeignRemote(remote));
        let context =
            IntakeContext::new(db, remote, ConnectivityState::from_reachability(reachable));
        // A failed resume leaves the queue intact for the next trigger
        if let Err(e) = context.resume_pending() {
            warn!(error = %e, "sync of leftover queue failed at startup");
        }
        Arc::new(Self { context })
    }
}

#[uniffi::export]
impl ClinicIntake {
    // =========================================================================
    // Intake
    // =========================================================================

    /// Validate and submit a new patient.
    pub fn register_patient(&self, form: FfiIntakeForm) -> Result<FfiSubmitReport, IntakeError> {
        match self.context.register_patient(form.into())? {
            SubmitOutcome::PersistedRemote(record) => Ok(FfiSubmitReport {
                queued: false,
                record: Some(record.into()),
                queue_id: None,
            }),
            SubmitOutcome::QueuedOffline(id) => Ok(FfiSubmitReport {
                queued: true,
                record: None,
                queue_id: Some(id.0),
            }),
            SubmitOutcome::Failed { error, .. } => Err(error.into()),
        }
    }

    /// Records still waiting for the server, oldest first.
    pub fn pending_records(&self) -> Result<Vec<FfiQueuedRecord>, IntakeError> {
        let entries = self.context.queue().list_all()?;
        Ok(entries.into_iter().map(|e| e.into()).collect())
    }

    // =========================================================================
    // Connectivity & Sync
    // =========================================================================

    /// Feed a reachability change from the host's network callback.
    ///
    /// Returns a sync report when the change brought the app back online.
    pub fn report_connectivity(
        &self,
        reachable: bool,
    ) -> Result<Option<FfiSyncReport>, IntakeError> {
        let outcome = self.context.report_connectivity(reachable)?;
        Ok(outcome.map(|o| o.into()))
    }

    pub fn is_online(&self) -> bool {
        self.context.connectivity().is_online()
    }

    /// Run a sync now (manual retry).
    pub fn sync_now(&self) -> Result<FfiSyncReport, IntakeError> {
        Ok(self.context.sync_now()?.into())
    }

    pub fn sync_status(&self) -> Result<FfiSyncStatus, IntakeError> {
        Ok(self.context.sync_status()?.into())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Patient list with its provenance.
    pub fn load_patients(&self) -> Result<FfiPatientListing, IntakeError> {
        Ok(self.context.load_patients()?.into())
    }

    /// Dashboard stats, or `None` when offline with nothing cached.
    pub fn load_stats(&self) -> Result<Option<FfiStatsReport>, IntakeError> {
        let report = match self.context.load_stats()? {
            CachedRead::Fresh(stats) => Some(FfiStatsReport {
                stats: stats.into(),
                fresh: true,
                fetched_at: None,
            }),
            CachedRead::Cached(snapshot) => Some(FfiStatsReport {
                stats: snapshot.value.into(),
                fresh: false,
                fetched_at: Some(snapshot.fetched_at),
            }),
            CachedRead::NoData => None,
        };
        Ok(report)
    }

    /// Search by name, phone or problem. Needs connectivity.
    pub fn search_patients(&self, query: String) -> Result<Vec<FfiPersistedRecord>, IntakeError> {
        let records = self.context.search_patients(&query)?;
        Ok(records.into_iter().map(|r| r.into()).collect())
    }

    // =========================================================================
    // Record Actions
    // =========================================================================

    pub fn update_status(
        &self,
        id: String,
        status: String,
    ) -> Result<FfiPersistedRecord, IntakeError> {
        let status = VisitStatus::parse(&status)
            .ok_or_else(|| IntakeError::InvalidInput(format!("unknown status {:?}", status)))?;
        Ok(self.context.update_status(&id, status)?.into())
    }

    pub fn add_prescription(
        &self,
        id: String,
        prescription: String,
    ) -> Result<FfiPersistedRecord, IntakeError> {
        Ok(self.context.add_prescription(&id, &prescription)?.into())
    }

    pub fn delete_patient(&self, id: String) -> Result<(), IntakeError> {
        Ok(self.context.delete_patient(&id)?)
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe intake form.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiIntakeForm {
    pub name: String,
    pub age: u32,
    pub phone: String,
    pub problem: String,
    pub doctor: String,
    pub date: String,
    pub time: String,
}

impl From<FfiIntakeForm> for IntakeForm {
    fn from(form: FfiIntakeForm) -> Self {
        IntakeForm {
            name: form.name,
            age: form.age,
            phone: form.phone,
            problem: form.problem,
            doctor: form.doctor,
            date: form.date,
            time: form.time,
        }
    }
}

/// FFI-safe record awaiting a server ID.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientRecord {
    pub client_ref: String,
    pub name: String,
    pub age: u32,
    pub phone: String,
    pub problem: String,
    pub doctor: String,
    pub date: String,
    pub time: String,
    pub status: String,
    pub prescription: String,
}

impl From<PatientRecord> for FfiPatientRecord {
    fn from(record: PatientRecord) -> Self {
        Self {
            client_ref: record.client_ref,
            name: record.name,
            age: record.age,
            phone: record.phone,
            problem: record.problem,
            doctor: record.doctor,
            date: record.date,
            time: record.time,
            status: record.status.as_str().to_string(),
            prescription: record.prescription,
        }
    }
}

/// FFI-safe server record.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPersistedRecord {
    pub id: String,
    pub name: String,
    pub age: u32,
    pub phone: String,
    pub problem: String,
    pub doctor: String,
    pub date: String,
    pub time: String,
    pub status: String,
    pub prescription: String,
    pub created_at: String,
}

impl From<PersistedRecord> for FfiPersistedRecord {
    fn from(record: PersistedRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            age: record.age,
            phone: record.phone,
            problem: record.problem,
            doctor: record.doctor,
            date: record.date,
            time: record.time,
            status: record.status.as_str().to_string(),
            prescription: record.prescription,
            created_at: record.created_at,
        }
    }
}

impl TryFrom<FfiPersistedRecord> for PersistedRecord {
    type Error = String;

    fn try_from(record: FfiPersistedRecord) -> Result<Self, Self::Error> {
        let status = VisitStatus::parse(&record.status)
            .ok_or_else(|| format!("unknown status {:?}", record.status))?;
        Ok(PersistedRecord {
            id: record.id,
            name: record.name,
            age: record.age,
            phone: record.phone,
            problem: record.problem,
            doctor: record.doctor,
            date: record.date,
            time: record.time,
            status,
            prescription: record.prescription,
            created_at: record.created_at,
        })
    }
}

/// FFI-safe queue entry.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiQueuedRecord {
    pub queue_id: i64,
    pub record: FfiPatientRecord,
    pub queued_at: String,
}

impl From<QueueEntry> for FfiQueuedRecord {
    fn from(entry: QueueEntry) -> Self {
        Self {
            queue_id: entry.id.0,
            record: entry.record.into(),
            queued_at: entry.queued_at,
        }
    }
}

/// Where a registration ended up.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSubmitReport {
    pub queued: bool,
    pub record: Option<FfiPersistedRecord>,
    pub queue_id: Option<i64>,
}

/// FFI-safe sync outcome.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSyncReport {
    /// "synced", "nothing_to_sync", "already_in_flight" or "offline"
    pub outcome: String,
    pub synced: u64,
}

impl From<SyncOutcome> for FfiSyncReport {
    fn from(outcome: SyncOutcome) -> Self {
        let (label, synced) = match outcome {
            SyncOutcome::Synced { count } => ("synced", count as u64),
            SyncOutcome::NothingToSync => ("nothing_to_sync", 0),
            SyncOutcome::AlreadyInFlight => ("already_in_flight", 0),
            SyncOutcome::Offline => ("offline", 0),
        };
        Self {
            outcome: label.to_string(),
            synced,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSyncStatus {
    pub pending: u64,
    pub last_sync_at: Option<String>,
    pub last_sync_count: u64,
}

impl From<SyncStatus> for FfiSyncStatus {
    fn from(status: SyncStatus) -> Self {
        Self {
            pending: status.pending as u64,
            last_sync_at: status.last_sync_at,
            last_sync_count: status.last_sync_count as u64,
        }
    }
}

/// FFI-safe patient listing.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientListing {
    /// "live", "cached", "pending" or "empty"
    pub source: String,
    pub fetched_at: Option<String>,
    pub records: Vec<FfiPersistedRecord>,
    pub pending: Vec<FfiQueuedRecord>,
}

impl From<PatientListing> for FfiPatientListing {
    fn from(listing: PatientListing) -> Self {
        let persisted = |records: Vec<PersistedRecord>| -> Vec<FfiPersistedRecord> {
            records.into_iter().map(|r| r.into()).collect()
        };
        match listing {
            PatientListing::Live(records) => Self {
                source: "live".to_string(),
                fetched_at: None,
                records: persisted(records),
                pending: Vec::new(),
            },
            PatientListing::Cached {
                records,
                fetched_at,
            } => Self {
                source: "cached".to_string(),
                fetched_at: Some(fetched_at),
                records: persisted(records),
                pending: Vec::new(),
            },
            PatientListing::PendingOnly(entries) => Self {
                source: "pending".to_string(),
                fetched_at: None,
                records: Vec::new(),
                pending: entries.into_iter().map(|e| e.into()).collect(),
            },
            PatientListing::Empty => Self {
                source: "empty".to_string(),
                fetched_at: None,
                records: Vec::new(),
                pending: Vec::new(),
            },
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDoctorCount {
    pub doctor: Option<String>,
    pub count: u64,
}

/// FFI-safe dashboard counters.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiStatsSummary {
    pub total: u64,
    pub pending: u64,
    pub confirmed: u64,
    pub done: u64,
    pub today_patients: u64,
    pub doctor_stats: Vec<FfiDoctorCount>,
}

impl From<StatsSummary> for FfiStatsSummary {
    fn from(stats: StatsSummary) -> Self {
        Self {
            total: stats.total,
            pending: stats.pending,
            confirmed: stats.confirmed,
            done: stats.done,
            today_patients: stats.today_patients,
            doctor_stats: stats
                .doctor_stats
                .into_iter()
                .map(|d| FfiDoctorCount {
                    doctor: d.doctor,
                    count: d.count,
                })
                .collect(),
        }
    }
}

impl From<FfiStatsSummary> for StatsSummary {
    fn from(stats: FfiStatsSummary) -> Self {
        StatsSummary {
            total: stats.total,
            pending: stats.pending,
            confirmed: stats.confirmed,
            done: stats.done,
            today_patients: stats.today_patients,
            doctor_stats: stats
                .doctor_stats
                .into_iter()
                .map(|d| DoctorCount {
                    doctor: d.doctor,
                    count: d.count,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiStatsReport {
    pub stats: FfiStatsSummary,
    pub fresh: bool,
    pub fetched_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Host-side store backed by the in-crate mock.
    struct HostStore(MockRemoteStore);

    impl FfiRemoteStore for HostStore {
        fn create_record(
            &self,
            record: FfiPatientRecord,
        ) -> Result<FfiPersistedRecord, FfiTransportError> {
            let record = PatientRecord {
                client_ref: record.client_ref,
                name: record.name,
                age: record.age,
                phone: record.phone,
                problem: record.problem,
                doctor: record.doctor,
                date: record.date,
                time: record.time,
                status: VisitStatus::parse(&record.status).unwrap_or_default(),
                prescription: record.prescription,
            };
            self.0
                .create_record(&record)
                .map(Into::into)
                .map_err(|e| FfiTransportError::Network(e.to_string()))
        }

        fn batch_create(&self, records: Vec<FfiPatientRecord>) -> Result<u64, FfiTransportError> {
            let mut inserted = 0;
            for record in records {
                self.create_record(record)?;
                inserted += 1;
            }
            Ok(inserted)
        }

        fn fetch_list(
            &self,
            query: Option<String>,
        ) -> Result<Vec<FfiPersistedRecord>, FfiTransportError> {
            let filter = query.map(ListFilter::new);
            self.0
                .fetch_list(filter.as_ref())
                .map(|records| records.into_iter().map(Into::into).collect())
                .map_err(|e| FfiTransportError::Network(e.to_string()))
        }

        fn fetch_stats(&self) -> Result<FfiStatsSummary, FfiTransportError> {
            Err(FfiTransportError::Status(503))
        }

        fn update_status(
            &self,
            _id: String,
            _status: String,
        ) -> Result<FfiPersistedRecord, FfiTransportError> {
            Ok(FfiPersistedRecord {
                id: "srv-1".into(),
                name: "Asha".into(),
                age: 30,
                phone: "555".into(),
                problem: "fever".into(),
                doctor: "Dr.Rao".into(),
                date: "2024-05-01".into(),
                time: "10:00".into(),
                status: "Cancelled".into(),
                prescription: String::new(),
                created_at: "2024-05-01T10:00:00Z".into(),
            })
        }

        fn set_prescription(
            &self,
            _id: String,
            _prescription: String,
        ) -> Result<FfiPersistedRecord, FfiTransportError> {
            Err(FfiTransportError::Timeout)
        }

        fn delete_record(&self, _id: String) -> Result<(), FfiTransportError> {
            Ok(())
        }
    }

    fn form(name: &str) -> FfiIntakeForm {
        FfiIntakeForm {
            name: name.into(),
            age: 30,
            phone: "555".into(),
            problem: "fever".into(),
            doctor: "Dr.Rao".into(),
            date: "2024-05-01".into(),
            time: "10:00".into(),
        }
    }

    fn open() -> Arc<ClinicIntake> {
        open_intake_in_memory(Arc::new(HostStore(MockRemoteStore::new())), None).unwrap()
    }

    #[test]
    fn test_open_with_reachability() {
        let host = Arc::new(HostStore(MockRemoteStore::new()));
        let intake = open_intake_in_memory(host.clone(), Some(false)).unwrap();
        assert!(!intake.is_online());

        let report = intake.register_patient(form("Asha")).unwrap();
        assert!(report.queued);
        assert!(host.0.records().is_empty());
    }

    #[test]
    fn test_reopen_online_syncs_leftover_queue() {
        let dir = tempfile::tempdir().unwrap();
        let config = IntakeConfig {
            database_path: dir.path().join("intake.db").to_string_lossy().into_owned(),
            ..IntakeConfig::default()
        };
        let host = Arc::new(HostStore(MockRemoteStore::new()));

        {
            let intake = open_intake(config.clone(), host.clone(), Some(false)).unwrap();
            intake.register_patient(form("Asha")).unwrap();
            intake.register_patient(form("Ravi")).unwrap();
            assert_eq!(intake.sync_status().unwrap().pending, 2);
        }
        assert!(host.0.records().is_empty());

        // Starting online is not a transition; the open itself drains the queue
        let intake = open_intake(config, host.clone(), Some(true)).unwrap();
        assert!(intake.is_online());
        assert_eq!(intake.sync_status().unwrap().pending, 0);
        assert_eq!(host.0.records().len(), 2);
        assert!(intake.report_connectivity(true).unwrap().is_none());
    }

    #[test]
    fn test_reopen_offline_keeps_leftover_queue() {
        let dir = tempfile::tempdir().unwrap();
        let config = IntakeConfig {
            database_path: dir.path().join("intake.db").to_string_lossy().into_owned(),
            ..IntakeConfig::default()
        };
        let host = Arc::new(HostStore(MockRemoteStore::new()));

        {
            let intake = open_intake(config.clone(), host.clone(), Some(false)).unwrap();
            intake.register_patient(form("Asha")).unwrap();
        }

        let intake = open_intake(config, host.clone(), Some(false)).unwrap();
        assert_eq!(intake.sync_status().unwrap().pending, 1);
        assert!(host.0.records().is_empty());
    }

    #[test]
    fn test_register_online_and_offline() {
        let intake = open();
        let report = intake.register_patient(form("Asha")).unwrap();
        assert!(!report.queued);
        assert_eq!(report.record.unwrap().status, "Pending");

        assert!(intake.report_connectivity(false).unwrap().is_none());
        let report = intake.register_patient(form("Ravi")).unwrap();
        assert!(report.queued);
        assert_eq!(intake.pending_records().unwrap().len(), 1);
    }

    #[test]
    fn test_reconnect_reports_sync() {
        let intake = open();
        intake.report_connectivity(false).unwrap();
        intake.register_patient(form("Asha")).unwrap();
        intake.register_patient(form("Ravi")).unwrap();

        let report = intake.report_connectivity(true).unwrap().unwrap();
        assert_eq!(report.outcome, "synced");
        assert_eq!(report.synced, 2);

        let status = intake.sync_status().unwrap();
        assert_eq!(status.pending, 0);
        assert_eq!(status.last_sync_count, 2);
    }

    #[test]
    fn test_invalid_input() {
        let intake = open();
        let mut bad = form("Asha");
        bad.name = " ".into();
        assert!(matches!(
            intake.register_patient(bad),
            Err(IntakeError::InvalidInput(_))
        ));
        assert!(matches!(
            intake.update_status("srv-1".into(), "Maybe".into()),
            Err(IntakeError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_offline_actions_and_stats() {
        let intake = open();
        // Stats endpoint is down and nothing is cached
        assert!(intake.load_stats().unwrap().is_none());

        intake.report_connectivity(false).unwrap();
        assert!(matches!(
            intake.search_patients("asha".into()),
            Err(IntakeError::Offline)
        ));
        assert!(matches!(
            intake.delete_patient("srv-1".into()),
            Err(IntakeError::Offline)
        ));
    }

    #[test]
    fn test_host_errors_are_mapped() {
        let intake = open();
        // Host answered with a status the core does not know
        assert!(matches!(
            intake.update_status("srv-1".into(), "Done".into()),
            Err(IntakeError::TransportError(_))
        ));
        assert!(matches!(
            intake.add_prescription("srv-1".into(), "rest".into()),
            Err(IntakeError::TransportError(_))
        ));
    }

    #[test]
    fn test_listing_sources() {
        let intake = open();
        intake.report_connectivity(false).unwrap();
        assert_eq!(intake.load_patients().unwrap().source, "empty");

        intake.register_patient(form("Asha")).unwrap();
        let listing = intake.load_patients().unwrap();
        assert_eq!(listing.source, "pending");
        assert_eq!(listing.pending[0].record.name, "Asha");

        intake.report_connectivity(true).unwrap();
        let listing = intake.load_patients().unwrap();
        assert_eq!(listing.source, "live");
        assert_eq!(listing.records.len(), 1);
    }
}
