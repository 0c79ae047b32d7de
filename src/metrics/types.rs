use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::Diagnosis;

/// One day of history activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineBucket {
    pub date: NaiveDate,
    pub total: u64,
    pub fractures: u64,
}

/// Per-patient view of stored history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRollup {
    pub patient_id: String,
    pub name: String,
    pub analysis_count: u64,
    pub fracture_count: u64,
    pub last_analysis: DateTime<Utc>,
    pub last_diagnosis: Diagnosis,
}
