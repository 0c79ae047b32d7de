//! History analytics: day-granularity timeline buckets and per-patient
//! rollups, computed from a slice of stored records.

mod types;

pub use types::{PatientRollup, TimelineBucket};

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::db::models::{Diagnosis, StoredAnalysis};

const TIMELINE_DAYS: usize = 30;

/// Bucket analyses by calendar day, most recent day first, capped at the
/// last 30 active days.
pub fn timeline(analyses: &[StoredAnalysis]) -> Vec<TimelineBucket> {
    let mut days: BTreeMap<NaiveDate, (u64, u64)> = BTreeMap::new();
    for analysis in analyses {
        let entry = days.entry(analysis.created_at.date_naive()).or_insert((0, 0));
        entry.0 += 1;
        if analysis.result.diagnosis == Diagnosis::Fracture {
            entry.1 += 1;
        }
    }

    days.into_iter()
        .rev()
        .take(TIMELINE_DAYS)
        .map(|(date, (total, fractures))| TimelineBucket {
            date,
            total,
            fractures,
        })
        .collect()
}

/// Group analyses by patient id, most recently seen patient first.
pub fn patient_rollups(analyses: &[StoredAnalysis]) -> Vec<PatientRollup> {
    let mut rollups: HashMap<&str, PatientRollup> = HashMap::new();

    for analysis in analyses {
        let entry = rollups
            .entry(analysis.patient.patient_id.as_str())
            .or_insert_with(|| PatientRollup {
                patient_id: analysis.patient.patient_id.clone(),
                name: analysis.patient.name.clone(),
                analysis_count: 0,
                fracture_count: 0,
                last_analysis: analysis.created_at,
                last_diagnosis: analysis.result.diagnosis,
            });

        entry.analysis_count += 1;
        if analysis.result.diagnosis == Diagnosis::Fracture {
            entry.fracture_count += 1;
        }
        if analysis.created_at >= entry.last_analysis {
            entry.last_analysis = analysis.created_at;
            entry.last_diagnosis = analysis.result.diagnosis;
            entry.name = analysis.patient.name.clone();
        }
    }

    let mut ordered: Vec<PatientRollup> = rollups.into_values().collect();
    ordered.sort_by(|a, b| b.last_analysis.cmp(&a.last_analysis));
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};

    use crate::db::models::{
        AnalysisStatus, PatientSnapshot, ResultSnapshot, Sex, StoredAnalysis,
    };
    use crate::imaging::EncodedImage;

    fn record(
        patient_id: &str,
        diagnosis: Diagnosis,
        created_at: DateTime<Utc>,
    ) -> StoredAnalysis {
        StoredAnalysis {
            id: format!("analysis_{}_{}", created_at.timestamp_millis(), patient_id),
            patient: PatientSnapshot {
                name: format!("Patient {patient_id}"),
                patient_id: patient_id.into(),
                sex: Sex::Female,
                age: 40,
                symptoms: String::new(),
                medical_history: String::new(),
                allergies: String::new(),
                current_medications: String::new(),
                clinical_note: String::new(),
                xray_image: EncodedImage::from_parts("image/png", "QUJD"),
            },
            result: ResultSnapshot {
                diagnosis,
                confidence: 0.9,
                grad_cam_image: None,
                processing_time: 1.0,
                timestamp: created_at,
                detailed_analysis: None,
                shap_explanation: None,
            },
            created_at,
            updated_at: created_at,
            tags: Vec::new(),
            notes: None,
            status: AnalysisStatus::Completed,
        }
    }

    #[test]
    fn timeline_buckets_by_day_most_recent_first() {
        let now = Utc::now();
        let records = vec![
            record("PT-A", Diagnosis::Fracture, now),
            record("PT-B", Diagnosis::Normal, now),
            record("PT-C", Diagnosis::Fracture, now - Duration::days(1)),
        ];

        let buckets = timeline(&records);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].date, now.date_naive());
        assert_eq!(buckets[0].total, 2);
        assert_eq!(buckets[0].fractures, 1);
        assert_eq!(buckets[1].total, 1);
        assert_eq!(buckets[1].fractures, 1);
    }

    #[test]
    fn timeline_caps_at_thirty_days() {
        let now = Utc::now();
        let records: Vec<StoredAnalysis> = (0..40)
            .map(|n| record("PT-A", Diagnosis::Normal, now - Duration::days(n)))
            .collect();

        let buckets = timeline(&records);
        assert_eq!(buckets.len(), 30);
        // The most recent 30 days survive the cap.
        assert_eq!(buckets[0].date, now.date_naive());
        assert_eq!(buckets[29].date, (now - Duration::days(29)).date_naive());
    }

    #[test]
    fn timeline_of_nothing_is_empty() {
        assert!(timeline(&[]).is_empty());
    }

    #[test]
    fn rollups_track_latest_per_patient() {
        let now = Utc::now();
        let records = vec![
            record("PT-A", Diagnosis::Normal, now - Duration::days(3)),
            record("PT-A", Diagnosis::Fracture, now),
            record("PT-B", Diagnosis::Normal, now - Duration::days(1)),
        ];

        let rollups = patient_rollups(&records);
        assert_eq!(rollups.len(), 2);

        assert_eq!(rollups[0].patient_id, "PT-A");
        assert_eq!(rollups[0].analysis_count, 2);
        assert_eq!(rollups[0].fracture_count, 1);
        assert_eq!(rollups[0].last_diagnosis, Diagnosis::Fracture);

        assert_eq!(rollups[1].patient_id, "PT-B");
        assert_eq!(rollups[1].analysis_count, 1);
        assert_eq!(rollups[1].fracture_count, 0);
    }
}
