//! Process-scoped intake context.
//!
//! Owns the one shared connectivity monitor, database handle and remote
//! store, and hands them to each component. Created once at startup.

use std::sync::mpsc::Receiver;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::{CacheLayer, CachedRead, PATIENTS_LIST_KEY, STATS_KEY};
use crate::connectivity::{ConnectivityEvent, ConnectivityMonitor, ConnectivityState};
use crate::db::{Database, DbError, DbResult, QueueEntry, SharedDatabase};
use crate::gateway::{SubmissionGateway, SubmitOutcome};
use crate::models::{
    IntakeForm, PatientRecord, PersistedRecord, StatsSummary, ValidationError, VisitStatus,
};
use crate::queue::OfflineQueue;
use crate::remote::{ListFilter, RemoteStore, TransportError};
use crate::sync::{SyncError, SyncEvent, SyncOrchestrator, SyncOutcome, SyncStatus};

/// Failures of online-only record actions and intake validation.
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("This action needs connectivity")]
    Offline,

    #[error("Invalid input: {0}")]
    Invalid(#[from] ValidationError),

    #[error("Remote call failed: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Storage(#[from] DbError),
}

/// Patient list as shown to the front desk.
#[derive(Debug, Clone, PartialEq)]
pub enum PatientListing {
    /// Straight from the server
    Live(Vec<PersistedRecord>),
    /// Last snapshot, served offline or after a failed fetch
    Cached {
        records: Vec<PersistedRecord>,
        fetched_at: String,
    },
    /// No snapshot yet; only records still waiting in the offline queue
    PendingOnly(Vec<QueueEntry>),
    /// Nothing to show
    Empty,
}

/// All intake components sharing one connectivity truth.
pub struct IntakeContext {
    remote: Arc<dyn RemoteStore>,
    connectivity: Arc<ConnectivityMonitor>,
    queue: OfflineQueue,
    cache: CacheLayer,
    gateway: SubmissionGateway,
    sync: SyncOrchestrator,
}

impl IntakeContext {
    pub fn new(db: Database, remote: Arc<dyn RemoteStore>, initial: ConnectivityState) -> Self {
        Self::with_shared(db.into_shared(), remote, initial)
    }

    pub fn with_shared(
        db: SharedDatabase,
        remote: Arc<dyn RemoteStore>,
        initial: ConnectivityState,
    ) -> Self {
        let connectivity = Arc::new(ConnectivityMonitor::new(initial));
        let queue = OfflineQueue::new(Arc::clone(&db));
        let cache = CacheLayer::new(Arc::clone(&db), Arc::clone(&connectivity));
        let gateway =
            SubmissionGateway::new(queue.clone(), Arc::clone(&remote), Arc::clone(&connectivity));
        let sync = SyncOrchestrator::new(db, Arc::clone(&remote), Arc::clone(&connectivity));

        info!(?initial, "intake context ready");
        Self {
            remote,
            connectivity,
            queue,
            cache,
            gateway,
            sync,
        }
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    pub fn queue(&self) -> &OfflineQueue {
        &self.queue
    }

    pub fn cache(&self) -> &CacheLayer {
        &self.cache
    }

    pub fn orchestrator(&self) -> &SyncOrchestrator {
        &self.sync
    }

    pub fn subscribe_connectivity(&self) -> Receiver<ConnectivityEvent> {
        self.connectivity.subscribe()
    }

    pub fn subscribe_sync(&self) -> Receiver<SyncEvent> {
        self.sync.subscribe()
    }

    // =========================================================================
    // Intake
    // =========================================================================

    /// Validate form input and submit it.
    pub fn register_patient(&self, form: IntakeForm) -> Result<SubmitOutcome, ValidationError> {
        let record = PatientRecord::from_form(form);
        record.validate()?;
        let outcome = self.gateway.submit(record);
        if matches!(outcome, SubmitOutcome::PersistedRemote(_)) {
            self.refresh_snapshots();
        }
        Ok(outcome)
    }

    /// Submit an already-built record without validation.
    pub fn submit(&self, record: PatientRecord) -> SubmitOutcome {
        self.gateway.submit(record)
    }

    // =========================================================================
    // Connectivity & Sync
    // =========================================================================

    /// Feed an environment reachability signal.
    ///
    /// Going online runs a sync; the result is returned so the host can
    /// notify the user. Repeated signals do nothing.
    pub fn report_connectivity(&self, reachable: bool) -> Result<Option<SyncOutcome>, SyncError> {
        let Some(event) = self.connectivity.report(reachable) else {
            return Ok(None);
        };
        let outcome = self.sync.handle(event)?;
        if let Some(SyncOutcome::Synced { .. }) = outcome {
            self.refresh_snapshots();
        }
        Ok(outcome)
    }

    /// Drain records left queued by an earlier session.
    ///
    /// Starting online is not a transition, so nothing else would trigger
    /// this sync. Does nothing when offline or when the queue is empty.
    pub fn resume_pending(&self) -> Result<Option<SyncOutcome>, SyncError> {
        if !self.connectivity.is_online() || self.queue.is_empty()? {
            return Ok(None);
        }
        info!("resuming sync of records queued before restart");
        self.sync_now().map(Some)
    }

    /// Manual sync, e.g. a retry button.
    pub fn sync_now(&self) -> Result<SyncOutcome, SyncError> {
        let outcome = self.sync.sync_now()?;
        if let SyncOutcome::Synced { .. } = outcome {
            self.refresh_snapshots();
        }
        Ok(outcome)
    }

    pub fn sync_status(&self) -> DbResult<SyncStatus> {
        self.sync.status()
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Patient list: live, else last snapshot, else the offline queue.
    pub fn load_patients(&self) -> DbResult<PatientListing> {
        let read = self
            .cache
            .fetch_or_cached(PATIENTS_LIST_KEY, || self.remote.fetch_list(None))?;

        Ok(match read {
            CachedRead::Fresh(records) => PatientListing::Live(records),
            CachedRead::Cached(snapshot) => PatientListing::Cached {
                records: snapshot.value,
                fetched_at: snapshot.fetched_at,
            },
            CachedRead::NoData => {
                let pending = self.queue.list_all()?;
                if pending.is_empty() {
                    PatientListing::Empty
                } else {
                    PatientListing::PendingOnly(pending)
                }
            }
        })
    }

    /// Dashboard stats, live or last snapshot.
    pub fn load_stats(&self) -> DbResult<CachedRead<StatsSummary>> {
        self.cache
            .fetch_or_cached(STATS_KEY, || self.remote.fetch_stats())
    }

    /// Server-side search over name, phone and problem. Not cached.
    ///
    /// A blank query is the full list.
    pub fn search_patients(&self, query: &str) -> Result<Vec<PersistedRecord>, ActionError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(match self.load_patients()? {
                PatientListing::Live(records) | PatientListing::Cached { records, .. } => records,
                PatientListing::PendingOnly(_) | PatientListing::Empty => Vec::new(),
            });
        }
        self.require_online()?;
        Ok(self.remote.fetch_list(Some(&ListFilter::new(query)))?)
    }

    // =========================================================================
    // Record Actions (online only)
    // =========================================================================

    pub fn update_status(
        &self,
        id: &str,
        status: VisitStatus,
    ) -> Result<PersistedRecord, ActionError> {
        self.require_online()?;
        let record = self.remote.update_status(id, status)?;
        info!(id, status = status.as_str(), "status updated");
        self.refresh_snapshots();
        Ok(record)
    }

    pub fn add_prescription(
        &self,
        id: &str,
        prescription: &str,
    ) -> Result<PersistedRecord, ActionError> {
        let prescription = prescription.trim();
        if prescription.is_empty() {
            return Err(ValidationError::MissingField("prescription").into());
        }
        self.require_online()?;
        let record = self.remote.set_prescription(id, prescription)?;
        info!(id, "prescription added");
        self.refresh_snapshots();
        Ok(record)
    }

    pub fn delete_patient(&self, id: &str) -> Result<(), ActionError> {
        self.require_online()?;
        self.remote.delete_record(id)?;
        info!(id, "patient deleted");
        self.refresh_snapshots();
        Ok(())
    }

    fn require_online(&self) -> Result<(), ActionError> {
        if self.connectivity.is_online() {
            Ok(())
        } else {
            Err(ActionError::Offline)
        }
    }

    /// Re-read list and stats so snapshots reflect a change just made.
    fn refresh_snapshots(&self) {
        for (key, result) in [
            (PATIENTS_LIST_KEY, self.load_patients().map(|_| ())),
            (STATS_KEY, self.load_stats().map(|_| ())),
        ] {
            match result {
                Ok(()) => debug!(key, "snapshot refreshed"),
                Err(e) => warn!(key, error = %e, "snapshot refresh failed"),
            }
        }
    }
}
