//! JSON bodies exchanged with the intake server.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use clinic_intake_core::models::{PatientRecord, VisitStatus};
use clinic_intake_core::remote::{BatchReceipt, TransportError, TransportResult};

/// Every response body: `{ success, data?, error? }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
}

/// `POST /api/sync` body.
#[derive(Debug, Serialize)]
pub struct SyncRequest<'a> {
    pub patients: &'a [PatientRecord],
}

/// `POST /api/sync` response. The count sits next to `success`, not in `data`.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncResponse {
    pub success: bool,
    #[serde(default)]
    pub synced: Option<usize>,
    #[serde(default)]
    pub error: Option<String>,
}

/// `PATCH /api/patients/:id` body.
#[derive(Debug, Serialize)]
pub struct StatusUpdate {
    pub status: VisitStatus,
}

/// `PATCH /api/patients/:id/prescription` body.
#[derive(Debug, Serialize)]
pub struct PrescriptionUpdate<'a> {
    pub prescription: &'a str,
}

/// Decode an envelope. `success: false` becomes [`TransportError::Rejected`].
///
/// `data` may legitimately be absent (delete) or `null` (update of an
/// unknown ID), so it is returned as an `Option`.
pub fn parse_envelope<T: DeserializeOwned>(body: &str) -> TransportResult<Option<T>> {
    let envelope: ApiEnvelope<T> =
        serde_json::from_str(body).map_err(|e| TransportError::Malformed(e.to_string()))?;
    if !envelope.success {
        return Err(rejected(envelope.error));
    }
    Ok(envelope.data)
}

/// Like [`parse_envelope`], but a missing or `null` record means 404.
pub fn parse_record<T: DeserializeOwned>(body: &str) -> TransportResult<T> {
    parse_envelope(body)?.ok_or(TransportError::Status(404))
}

/// Decode a sync acknowledgment.
pub fn parse_sync_response(body: &str) -> TransportResult<BatchReceipt> {
    let response: SyncResponse =
        serde_json::from_str(body).map_err(|e| TransportError::Malformed(e.to_string()))?;
    if !response.success {
        return Err(rejected(response.error));
    }
    let inserted_count = response
        .synced
        .ok_or_else(|| TransportError::Malformed("sync response without count".into()))?;
    Ok(BatchReceipt { inserted_count })
}

fn rejected(error: Option<String>) -> TransportError {
    TransportError::Rejected(error.unwrap_or_else(|| "unspecified server error".into()))
}
