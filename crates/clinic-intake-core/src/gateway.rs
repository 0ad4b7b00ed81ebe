//! Single entry point for new patient records.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::connectivity::ConnectivityMonitor;
use crate::db::{DbError, QueueEntryId};
use crate::models::{PatientRecord, PersistedRecord};
use crate::queue::OfflineQueue;
use crate::remote::RemoteStore;

/// Where a submitted record ended up.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Stored by the server; carries server ID and defaults
    PersistedRemote(PersistedRecord),
    /// Held in the offline queue until the next sync
    QueuedOffline(QueueEntryId),
    /// Neither the server nor local storage took it. The record is handed
    /// back so the caller can keep it on screen.
    Failed {
        record: Box<PatientRecord>,
        error: DbError,
    },
}

impl SubmitOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, SubmitOutcome::Failed { .. })
    }
}

/// Live-first submission with offline queue fallback.
#[derive(Clone)]
pub struct SubmissionGateway {
    queue: OfflineQueue,
    remote: Arc<dyn RemoteStore>,
    connectivity: Arc<ConnectivityMonitor>,
}

impl SubmissionGateway {
    pub fn new(
        queue: OfflineQueue,
        remote: Arc<dyn RemoteStore>,
        connectivity: Arc<ConnectivityMonitor>,
    ) -> Self {
        Self {
            queue,
            remote,
            connectivity,
        }
    }

    /// Submit a record: server when online, queue otherwise or on failure.
    pub fn submit(&self, record: PatientRecord) -> SubmitOutcome {
        if self.connectivity.is_online() {
            match self.remote.create_record(&record) {
                Ok(persisted) => {
                    info!(id = %persisted.id, "record persisted remotely");
                    return SubmitOutcome::PersistedRemote(persisted);
                }
                Err(e) => {
                    warn!(error = %e, client_ref = %record.client_ref, "live create failed, queueing");
                }
            }
        }

        match self.queue.enqueue(&record) {
            Ok(id) => SubmitOutcome::QueuedOffline(id),
            Err(error) => {
                error!(error = %error, client_ref = %record.client_ref, "record could not be stored anywhere");
                SubmitOutcome::Failed {
                    record: Box::new(record),
                    error,
                }
            }
        }
    }
}
