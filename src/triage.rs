//! Intake pipeline: analyze, then persist.

use anyhow::Result;
use log::warn;
use serde::Serialize;

use crate::db::{Database, PatientSnapshot, ResultSnapshot};
use crate::inference::InferenceClient;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub result: ResultSnapshot,
    /// Id of the stored history record; `None` when the history write
    /// failed and the result was returned anyway.
    pub analysis_id: Option<String>,
}

pub struct TriageService {
    db: Database,
    inference: InferenceClient,
}

impl TriageService {
    pub fn new(db: Database, inference: InferenceClient) -> Self {
        Self { db, inference }
    }

    /// Full intake flow. Inference failure propagates and nothing is
    /// stored — failed analyses never reach history. A persistence
    /// failure after a successful analysis is logged and reported via
    /// `analysis_id = None`; it never blocks the diagnostic result.
    pub async fn submit(&self, patient: PatientSnapshot) -> Result<Submission> {
        let result = self.inference.analyze(&patient).await?;
        Ok(self.record(patient, result).await)
    }

    /// Persist a completed analysis, degrading gracefully when the store
    /// rejects the write.
    pub async fn record(&self, patient: PatientSnapshot, result: ResultSnapshot) -> Submission {
        let analysis_id = match self.db.insert_analysis(patient, result.clone()).await {
            Ok(id) => Some(id),
            Err(err) => {
                warn!("Analysis completed but history write failed: {err}");
                None
            }
        };
        Submission {
            result,
            analysis_id,
        }
    }
}
