use chrono::{DateTime, Utc};

use crate::db::models::{AnalysisStatus, Diagnosis, Sex};
use crate::error::{StoreError, StoreResult};

pub fn parse_datetime(value: &str, field: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| StoreError::CorruptRecord(format!("bad {field} '{value}': {err}")))
}

pub fn parse_diagnosis(value: &str) -> StoreResult<Diagnosis> {
    match value {
        "Fracture" => Ok(Diagnosis::Fracture),
        "Normal" => Ok(Diagnosis::Normal),
        other => Err(StoreError::CorruptRecord(format!(
            "unknown diagnosis '{other}'"
        ))),
    }
}

pub fn parse_status(value: &str) -> StoreResult<AnalysisStatus> {
    match value {
        "completed" => Ok(AnalysisStatus::Completed),
        "in-progress" => Ok(AnalysisStatus::InProgress),
        "failed" => Ok(AnalysisStatus::Failed),
        other => Err(StoreError::CorruptRecord(format!(
            "unknown analysis status '{other}'"
        ))),
    }
}

pub fn parse_sex(value: &str) -> StoreResult<Sex> {
    match value {
        "Male" => Ok(Sex::Male),
        "Female" => Ok(Sex::Female),
        "Other" => Ok(Sex::Other),
        other => Err(StoreError::CorruptRecord(format!("unknown sex '{other}'"))),
    }
}

pub fn to_u32(value: i64, field: &str) -> StoreResult<u32> {
    u32::try_from(value)
        .map_err(|_| StoreError::CorruptRecord(format!("{field} out of range: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_round_trip_datetimes() {
        let now = Utc::now();
        let parsed = parse_datetime(&now.to_rfc3339(), "created_at").expect("parse");
        assert_eq!(parsed, now);
    }

    #[test]
    fn rejects_unknown_enum_values() {
        assert!(matches!(
            parse_diagnosis("Sprain"),
            Err(StoreError::CorruptRecord(_))
        ));
        assert!(matches!(
            parse_status("pending"),
            Err(StoreError::CorruptRecord(_))
        ));
        assert!(matches!(
            parse_sex("unknown"),
            Err(StoreError::CorruptRecord(_))
        ));
    }

    #[test]
    fn rejects_negative_age() {
        assert!(matches!(
            to_u32(-3, "age"),
            Err(StoreError::CorruptRecord(_))
        ));
    }
}
