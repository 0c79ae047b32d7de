pub mod analysis;

pub use analysis::{
    AnalysisPage, AnalysisStatus, AnalysisUpdate, ClinicalConfidence, DetailedAnalysis,
    DetailedFindings, Diagnosis, ExplainabilityAnalysis, HistoryFilter, PatientSnapshot,
    PixelPosition, ResultSnapshot, Sex, ShapExplanation, ShapFeature, StoreStats, StoredAnalysis,
};
