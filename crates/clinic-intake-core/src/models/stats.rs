//! Dashboard statistics.

use serde::{Deserialize, Serialize};

use super::{PersistedRecord, VisitStatus};

/// Per-doctor patient count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DoctorCount {
    /// Doctor name (`_id` of the server's group stage)
    #[serde(rename = "_id")]
    pub doctor: Option<String>,
    pub count: u64,
}

/// Clinic-wide counters shown on the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    pub total: u64,
    pub pending: u64,
    pub confirmed: u64,
    pub done: u64,
    /// Patients whose visit date is today
    pub today_patients: u64,
    #[serde(default)]
    pub doctor_stats: Vec<DoctorCount>,
}

impl StatsSummary {
    /// Aggregate a record list the way the server does.
    ///
    /// `today` is a `YYYY-MM-DD` string; doctors are listed in first-seen order.
    pub fn from_records(records: &[PersistedRecord], today: &str) -> Self {
        let mut stats = StatsSummary {
            total: records.len() as u64,
            ..Default::default()
        };

        for record in records {
            match record.status {
                VisitStatus::Pending => stats.pending += 1,
                VisitStatus::Confirmed => stats.confirmed += 1,
                VisitStatus::Done => stats.done += 1,
            }
            if record.date == today {
                stats.today_patients += 1;
            }
            match stats
                .doctor_stats
                .iter_mut()
                .find(|d| d.doctor.as_deref() == Some(record.doctor.as_str()))
            {
                Some(entry) => entry.count += 1,
                None => stats.doctor_stats.push(DoctorCount {
                    doctor: Some(record.doctor.clone()),
                    count: 1,
                }),
            }
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(doctor: &str, date: &str, status: VisitStatus) -> PersistedRecord {
        PersistedRecord {
            id: format!("{}-{}", doctor, date),
            name: "Test".into(),
            age: 40,
            phone: "555".into(),
            problem: "cough".into(),
            doctor: doctor.into(),
            date: date.into(),
            time: "09:00".into(),
            status,
            prescription: String::new(),
            created_at: "2024-05-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn test_from_records() {
        let records = vec![
            record("Dr.Rao", "2024-05-01", VisitStatus::Pending),
            record("Dr.Iyer", "2024-05-01", VisitStatus::Done),
            record("Dr.Rao", "2024-05-02", VisitStatus::Confirmed),
        ];

        let stats = StatsSummary::from_records(&records, "2024-05-01");
        assert_eq!(stats.total, 3);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.confirmed, 1);
        assert_eq!(stats.done, 1);
        assert_eq!(stats.today_patients, 2);
        assert_eq!(stats.doctor_stats.len(), 2);
        assert_eq!(stats.doctor_stats[0].doctor.as_deref(), Some("Dr.Rao"));
        assert_eq!(stats.doctor_stats[0].count, 2);
    }

    #[test]
    fn test_server_payload() {
        let json = r#"{"total":4,"pending":2,"confirmed":1,"done":1,"todayPatients":1,
            "doctorStats":[{"_id":"Dr.Rao","count":3},{"_id":null,"count":1}]}"#;
        let stats: StatsSummary = serde_json::from_str(json).unwrap();
        assert_eq!(stats.today_patients, 1);
        assert_eq!(stats.doctor_stats[1].doctor, None);
    }
}
