//! Offline queue drain on reconnect.
//!
//! Protocol:
//! 1. Snapshot the queue (`list_all`)
//! 2. Submit the snapshot as one batch, in queue order
//! 3. Server confirms every record: remove exactly the snapshot's entries,
//!    matched by ID and revision so a record edited mid-flight stays queued
//! 4. Anything else: leave the queue alone for the next trigger
//!
//! Delivery is at-least-once. A batch that the server stored but never
//! acknowledged is sent again; every record carries its `client_ref` so the
//! server can drop the replay.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::connectivity::{ConnectivityEvent, ConnectivityMonitor};
use crate::db::{DbError, DbResult, QueueStamp, SharedDatabase};
use crate::events::EventFanout;
use crate::models::PatientRecord;
use crate::queue::OfflineQueue;
use crate::remote::{RemoteStore, TransportError};

const LAST_SYNC_AT: &str = "last_sync_at";
const LAST_SYNC_COUNT: &str = "last_sync_count";

/// Sync failures. The queue is intact after every one of them.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Sync of {batch_size} records failed, kept for retry: {source}")]
    PartialFailure {
        batch_size: usize,
        #[source]
        source: TransportError,
    },

    #[error("Server confirmed {confirmed} of {submitted} records, kept for retry")]
    Unconfirmed { submitted: usize, confirmed: usize },

    #[error("Storage error: {0}")]
    Storage(#[from] DbError),
}

/// What a sync trigger did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncOutcome {
    /// The whole batch was confirmed and removed from the queue
    Synced { count: usize },
    /// Queue was empty
    NothingToSync,
    /// Another sync is running; it or the next trigger will pick up the queue
    AlreadyInFlight,
    /// Connectivity is down; nothing was attempted
    Offline,
}

/// Notification for observers (e.g. a "3 patients synced" toast).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncEvent {
    Completed { synced: usize },
    Failed { pending: usize, reason: String },
}

/// Sync bookkeeping for status displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub pending: usize,
    pub last_sync_at: Option<String>,
    pub last_sync_count: usize,
}

/// Clears the in-flight flag when the attempt ends, however it ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drains the offline queue into the remote store.
pub struct SyncOrchestrator {
    db: SharedDatabase,
    queue: OfflineQueue,
    remote: Arc<dyn RemoteStore>,
    connectivity: Arc<ConnectivityMonitor>,
    in_flight: AtomicBool,
    observers: EventFanout<SyncEvent>,
}

impl SyncOrchestrator {
    pub fn new(
        db: SharedDatabase,
        remote: Arc<dyn RemoteStore>,
        connectivity: Arc<ConnectivityMonitor>,
    ) -> Self {
        Self {
            queue: OfflineQueue::new(Arc::clone(&db)),
            db,
            remote,
            connectivity,
            in_flight: AtomicBool::new(false),
            observers: EventFanout::new(),
        }
    }

    /// Receive a [`SyncEvent`] after every attempt that reached the server.
    pub fn subscribe(&self) -> Receiver<SyncEvent> {
        self.observers.subscribe()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// React to a connectivity transition. Only `WentOnline` triggers a sync.
    pub fn handle(&self, event: ConnectivityEvent) -> Result<Option<SyncOutcome>, SyncError> {
        match event {
            ConnectivityEvent::WentOnline => self.sync_now().map(Some),
            ConnectivityEvent::WentOffline => Ok(None),
        }
    }

    /// Run one sync attempt now.
    pub fn sync_now(&self) -> Result<SyncOutcome, SyncError> {
        if !self.connectivity.is_online() {
            return Ok(SyncOutcome::Offline);
        }

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            info!("sync already in flight, trigger dropped");
            return Ok(SyncOutcome::AlreadyInFlight);
        };

        let batch = self.queue.list_all()?;
        if batch.is_empty() {
            return Ok(SyncOutcome::NothingToSync);
        }

        let (stamps, records): (Vec<QueueStamp>, Vec<PatientRecord>) = batch
            .into_iter()
            .map(|entry| (entry.stamp(), entry.record))
            .unzip();
        let submitted = records.len();
        info!(batch_size = submitted, "syncing offline queue");

        // The queue lock is not held here; new enqueues land after `stamps`.
        match self.remote.batch_create(&records) {
            Ok(receipt) if receipt.inserted_count == submitted => {
                let removed = match self.queue.clear(&stamps) {
                    Ok(removed) => removed,
                    Err(e) => {
                        error!(error = %e, "batch persisted remotely but queue clear failed");
                        let err = SyncError::Storage(e);
                        self.report_failure(&err);
                        return Err(err);
                    }
                };
                if removed != submitted {
                    warn!(submitted, removed, "entries replaced during sync stay queued");
                }
                self.record_success(submitted);
                info!(synced = submitted, "offline queue synced");
                self.observers.publish(SyncEvent::Completed { synced: submitted });
                Ok(SyncOutcome::Synced { count: submitted })
            }
            Ok(receipt) => {
                let err = SyncError::Unconfirmed {
                    submitted,
                    confirmed: receipt.inserted_count,
                };
                self.report_failure(&err);
                Err(err)
            }
            Err(source) => {
                let err = SyncError::PartialFailure {
                    batch_size: submitted,
                    source,
                };
                self.report_failure(&err);
                Err(err)
            }
        }
    }

    /// Pending count and last successful sync.
    pub fn status(&self) -> DbResult<SyncStatus> {
        let pending = self.queue.len()?;
        let db = self.db.lock()?;
        let last_sync_at = db
            .get_sync_state(LAST_SYNC_AT)?
            .filter(|s| !s.is_empty());
        let last_sync_count = db
            .get_sync_state(LAST_SYNC_COUNT)?
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        Ok(SyncStatus {
            pending,
            last_sync_at,
            last_sync_count,
        })
    }

    fn record_success(&self, count: usize) {
        let result = self.db.lock().map_err(DbError::from).and_then(|db| {
            db.set_sync_state(LAST_SYNC_AT, &chrono::Utc::now().to_rfc3339())?;
            db.set_sync_state(LAST_SYNC_COUNT, &count.to_string())
        });
        if let Err(e) = result {
            warn!(error = %e, "failed to record sync bookkeeping");
        }
    }

    fn report_failure(&self, err: &SyncError) {
        let pending = self.queue.len().unwrap_or(0);
        warn!(error = %err, pending, "sync failed, queue kept");
        self.observers.publish(SyncEvent::Failed {
            pending,
            reason: err.to_string(),
        });
    }
}
