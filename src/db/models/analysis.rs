//! Analysis record data models.
//!
//! Field names and nesting mirror the JSON export format exactly
//! (`patientData` / `analysisResult`, camelCase throughout), so an export
//! taken from one version of the tool stays readable by another.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::imaging::EncodedImage;

/// Closed two-value classification outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Diagnosis {
    Fracture,
    Normal,
}

impl Diagnosis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Diagnosis::Fracture => "Fracture",
            Diagnosis::Normal => "Normal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisStatus {
    Completed,
    InProgress,
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::InProgress => "in-progress",
            AnalysisStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
    Other,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "Male",
            Sex::Female => "Female",
            Sex::Other => "Other",
        }
    }
}

/// Denormalized copy of the patient intake at analysis time. The record
/// owns this snapshot exclusively, image bytes included — later edits to
/// a patient elsewhere never reach stored history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSnapshot {
    pub name: String,
    pub patient_id: String,
    pub sex: Sex,
    pub age: u32,
    pub symptoms: String,
    pub medical_history: String,
    pub allergies: String,
    pub current_medications: String,
    pub clinical_note: String,
    #[serde(rename = "xrayImageData")]
    pub xray_image: EncodedImage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixelPosition {
    pub row: u32,
    pub col: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapFeature {
    pub position: PixelPosition,
    pub importance: f64,
    pub region: String,
}

/// Pixel-importance explanation attached to a result when the inference
/// service produced one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapExplanation {
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<EncodedImage>,
    pub top_features: Vec<ShapFeature>,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClinicalConfidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedFindings {
    pub fracture_analysis: String,
    pub joint_alignment_analysis: String,
    pub bone_integrity_analysis: String,
    pub soft_tissue_analysis: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainabilityAnalysis {
    pub focus_correlation: String,
    pub secondary_findings: String,
    pub clinical_confidence: ClinicalConfidence,
}

/// Extended narrative analysis, present when a consultation model was
/// available at analysis time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedAnalysis {
    pub overall_impression: String,
    pub detailed_findings: DetailedFindings,
    pub explainability_analysis: ExplainabilityAnalysis,
    pub potential_complications: String,
    pub recommended_follow_up: String,
    pub full_analysis: String,
}

/// Diagnostic outcome at analysis time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSnapshot {
    pub diagnosis: Diagnosis,
    /// Model confidence in [0, 1].
    pub confidence: f64,
    #[serde(rename = "gradCamImageUrl", default, skip_serializing_if = "Option::is_none")]
    pub grad_cam_image: Option<EncodedImage>,
    /// Processing duration in seconds, as reported by the service.
    pub processing_time: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_analysis: Option<DetailedAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shap_explanation: Option<ShapExplanation>,
}

/// One persisted analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAnalysis {
    pub id: String,
    #[serde(rename = "patientData")]
    pub patient: PatientSnapshot,
    #[serde(rename = "analysisResult")]
    pub result: ResultSnapshot,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub status: AnalysisStatus,
}

/// Conjunction of optional list predicates. Empty filter matches all.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub patient_id: Option<String>,
    pub diagnosis: Option<Diagnosis>,
    /// Inclusive lower bound on `created_at`.
    pub date_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`.
    pub date_to: Option<DateTime<Utc>>,
}

/// One page of history plus the exact match count. This is also the
/// export document shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisPage {
    pub analyses: Vec<StoredAnalysis>,
    pub total_count: u64,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total_analyses: u64,
    pub fracture_detected: u64,
    pub normal_results: u64,
    pub average_confidence: f64,
    /// Analyses created within the 7 days preceding the call.
    pub recent_analyses: u64,
}

/// Partial update payload. `Some` replaces the field, `None` leaves it.
#[derive(Debug, Clone, Default)]
pub struct AnalysisUpdate {
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
}
