//! Blocking HTTP implementation of [`RemoteStore`].

use std::time::Duration;

use tracing::{debug, warn};

use clinic_intake_core::config::IntakeConfig;
use clinic_intake_core::models::{PatientRecord, PersistedRecord, StatsSummary, VisitStatus};
use clinic_intake_core::remote::{
    BatchReceipt, ListFilter, RemoteStore, TransportError, TransportResult,
};

use crate::endpoints::Endpoints;
use crate::wire::{
    parse_envelope, parse_record, parse_sync_response, PrescriptionUpdate, StatusUpdate,
    SyncRequest,
};

type HttpResult = Result<ureq::http::Response<ureq::Body>, ureq::Error>;

/// Talks to the intake server over its JSON API.
pub struct HttpRemoteStore {
    endpoints: Endpoints,
    agent: ureq::Agent,
}

impl HttpRemoteStore {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let agent = ureq::Agent::new_with_config(
            ureq::config::Config::builder()
                .timeout_global(Some(timeout))
                .build(),
        );
        Self {
            endpoints: Endpoints::new(base_url),
            agent,
        }
    }

    pub fn from_config(config: &IntakeConfig) -> Self {
        Self::new(&config.server_url, config.request_timeout())
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Turn a finished request into its body text.
    fn read_body(&self, what: &str, result: HttpResult) -> TransportResult<String> {
        let mut response = result.map_err(|e| {
            let err = transport_error(e);
            warn!(request = what, error = %err, "request failed");
            err
        })?;
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(transport_error)?;
        debug!(request = what, bytes = body.len(), "response received");
        Ok(body)
    }
}

fn transport_error(e: ureq::Error) -> TransportError {
    match e {
        ureq::Error::StatusCode(code) => TransportError::Status(code),
        ureq::Error::Timeout(_) => TransportError::Timeout,
        other => TransportError::Network(other.to_string()),
    }
}

impl RemoteStore for HttpRemoteStore {
    fn create_record(&self, record: &PatientRecord) -> TransportResult<PersistedRecord> {
        let result = self.agent.post(&self.endpoints.patients()).send_json(record);
        parse_record(&self.read_body("create", result)?)
    }

    fn batch_create(&self, records: &[PatientRecord]) -> TransportResult<BatchReceipt> {
        let result = self
            .agent
            .post(&self.endpoints.sync())
            .send_json(&SyncRequest { patients: records });
        parse_sync_response(&self.read_body("sync", result)?)
    }

    fn fetch_list(&self, filter: Option<&ListFilter>) -> TransportResult<Vec<PersistedRecord>> {
        let result = match filter {
            Some(filter) => self
                .agent
                .get(&self.endpoints.search())
                .query("q", &filter.query)
                .call(),
            None => self.agent.get(&self.endpoints.patients()).call(),
        };
        Ok(parse_envelope(&self.read_body("list", result)?)?.unwrap_or_default())
    }

    fn fetch_stats(&self) -> TransportResult<StatsSummary> {
        let result = self.agent.get(&self.endpoints.stats()).call();
        parse_record(&self.read_body("stats", result)?)
    }

    fn update_status(&self, id: &str, status: VisitStatus) -> TransportResult<PersistedRecord> {
        let result = self
            .agent
            .patch(&self.endpoints.patient(id))
            .send_json(&StatusUpdate { status });
        parse_record(&self.read_body("update status", result)?)
    }

    fn set_prescription(&self, id: &str, prescription: &str) -> TransportResult<PersistedRecord> {
        let result = self
            .agent
            .patch(&self.endpoints.prescription(id))
            .send_json(&PrescriptionUpdate { prescription });
        parse_record(&self.read_body("prescription", result)?)
    }

    fn delete_record(&self, id: &str) -> TransportResult<()> {
        let result = self.agent.delete(&self.endpoints.patient(id)).call();
        parse_envelope::<serde_json::Value>(&self.read_body("delete", result)?)?;
        Ok(())
    }
}
