//! Patient intake records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Oldest age the intake form accepts.
pub const MAX_AGE: u32 = 150;

/// Visit status tracked by the front desk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum VisitStatus {
    /// Registered, not yet seen
    #[default]
    Pending,
    /// Appointment confirmed
    Confirmed,
    /// Visit finished
    Done,
}

impl VisitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisitStatus::Pending => "Pending",
            VisitStatus::Confirmed => "Confirmed",
            VisitStatus::Done => "Done",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(VisitStatus::Pending),
            "Confirmed" => Some(VisitStatus::Confirmed),
            "Done" => Some(VisitStatus::Done),
            _ => None,
        }
    }
}

/// Raw values captured by the intake form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct IntakeForm {
    pub name: String,
    pub age: u32,
    pub phone: String,
    pub problem: String,
    pub doctor: String,
    /// Visit date, `YYYY-MM-DD`
    pub date: String,
    /// Visit time as entered, e.g. `10:00`
    pub time: String,
}

/// Intake validation failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("age {0} is out of range")]
    AgeOutOfRange(u32),

    #[error("date {0:?} is not YYYY-MM-DD")]
    BadDate(String),
}

/// A patient record that has not been given a server ID yet.
///
/// This is what the submission gateway sends and what the offline queue stores.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatientRecord {
    /// Client-generated UUID, sent along so the server can drop replays
    pub client_ref: String,
    pub name: String,
    pub age: u32,
    pub phone: String,
    pub problem: String,
    pub doctor: String,
    pub date: String,
    pub time: String,
    #[serde(default)]
    pub status: VisitStatus,
    #[serde(default)]
    pub prescription: String,
}

impl PatientRecord {
    /// Build a fresh record from form input with default status and no prescription.
    pub fn from_form(form: IntakeForm) -> Self {
        Self {
            client_ref: uuid::Uuid::new_v4().to_string(),
            name: form.name,
            age: form.age,
            phone: form.phone,
            problem: form.problem,
            doctor: form.doctor,
            date: form.date,
            time: form.time,
            status: VisitStatus::Pending,
            prescription: String::new(),
        }
    }

    /// Check the fields the clinic cannot work without.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        if self.doctor.trim().is_empty() {
            return Err(ValidationError::MissingField("doctor"));
        }
        if self.age > MAX_AGE {
            return Err(ValidationError::AgeOutOfRange(self.age));
        }
        NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
            .map_err(|_| ValidationError::BadDate(self.date.clone()))?;
        Ok(())
    }

    /// Case-insensitive match on name, phone or problem.
    pub fn matches(&self, query: &str) -> bool {
        text_matches(query, [&self.name, &self.phone, &self.problem])
    }
}

/// A patient record confirmed by the server of record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedRecord {
    /// Server-assigned ID
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    pub age: u32,
    pub phone: String,
    pub problem: String,
    pub doctor: String,
    pub date: String,
    pub time: String,
    #[serde(default)]
    pub status: VisitStatus,
    #[serde(default)]
    pub prescription: String,
    /// Server creation timestamp
    pub created_at: String,
}

impl PersistedRecord {
    /// Attach server identity to a pending record.
    pub fn from_pending(id: String, record: &PatientRecord, created_at: String) -> Self {
        Self {
            id,
            name: record.name.clone(),
            age: record.age,
            phone: record.phone.clone(),
            problem: record.problem.clone(),
            doctor: record.doctor.clone(),
            date: record.date.clone(),
            time: record.time.clone(),
            status: record.status,
            prescription: record.prescription.clone(),
            created_at,
        }
    }

    /// Case-insensitive match on name, phone or problem.
    pub fn matches(&self, query: &str) -> bool {
        text_matches(query, [&self.name, &self.phone, &self.problem])
    }
}

fn text_matches(query: &str, fields: [&String; 3]) -> bool {
    let needle = query.to_lowercase();
    fields
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
}
