//! Client for the external fracture-analysis service.
//!
//! The service runs the model (classification, Grad-CAM, pixel-importance
//! explanation); this side only ships the intake payload and maps the
//! response into a result snapshot. The 30-second default timeout lives
//! here — the store layer below never enforces one.

use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::db::models::{
    Diagnosis, PatientSnapshot, PixelPosition, ResultSnapshot, ShapExplanation, ShapFeature,
};
use crate::imaging::EncodedImage;
use crate::settings::InferenceSettings;

pub struct InferenceClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    /// Raw base64 payload, no data-URL prefix.
    image: &'a str,
    filename: String,
    patient_data: PatientFields<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PatientFields<'a> {
    name: &'a str,
    patient_id: &'a str,
    age: u32,
    sex: &'a str,
    symptoms: &'a str,
    medical_history: &'a str,
    allergies: &'a str,
    current_medications: &'a str,
    clinical_note: &'a str,
}

#[derive(Deserialize)]
struct AnalyzeResponse {
    prediction: String,
    confidence: f64,
    #[serde(default)]
    processing_time: Option<f64>,
    #[serde(default)]
    gradcam_image: Option<String>,
    #[serde(default)]
    shap_explanation: Option<ShapResponse>,
}

#[derive(Deserialize)]
struct ShapResponse {
    available: bool,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    top_features: Vec<ShapFeatureResponse>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
struct ShapFeatureResponse {
    position: PositionResponse,
    importance: f64,
    region: String,
}

#[derive(Deserialize)]
struct PositionResponse {
    row: u32,
    col: u32,
}

#[derive(Deserialize)]
struct ServiceError {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        _ => "bin",
    }
}

/// Map the service's free-form prediction label onto the closed
/// diagnosis set.
fn map_prediction(raw: &str) -> Diagnosis {
    let normalized = raw.trim().to_lowercase();
    if normalized.contains("fracture") || normalized == "positive" || normalized == "1" {
        Diagnosis::Fracture
    } else {
        Diagnosis::Normal
    }
}

fn assemble_result(body: AnalyzeResponse, elapsed_secs: f64) -> ResultSnapshot {
    let shap_explanation = body.shap_explanation.map(|shap| ShapExplanation {
        available: shap.available,
        image: shap
            .image
            .map(|payload| EncodedImage::from_parts("image/png", payload)),
        top_features: shap
            .top_features
            .into_iter()
            .map(|feature| ShapFeature {
                position: PixelPosition {
                    row: feature.position.row,
                    col: feature.position.col,
                },
                importance: feature.importance,
                region: feature.region,
            })
            .collect(),
        description: shap
            .description
            .unwrap_or_else(|| "Pixel-importance explanation not available".into()),
    });

    ResultSnapshot {
        diagnosis: map_prediction(&body.prediction),
        confidence: body.confidence,
        grad_cam_image: body
            .gradcam_image
            .map(|payload| EncodedImage::from_parts("image/png", payload)),
        processing_time: body.processing_time.unwrap_or(elapsed_secs),
        timestamp: Utc::now(),
        detailed_analysis: None,
        shap_explanation,
    }
}

impl InferenceClient {
    pub fn new(settings: &InferenceSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Availability probe against the service's health endpoint.
    pub async fn health(&self) -> bool {
        match self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                warn!("Analysis service health check failed: {err}");
                false
            }
        }
    }

    /// Submit an X-ray for analysis and map the response into a result
    /// snapshot. Nothing is persisted here; that is the caller's call.
    pub async fn analyze(&self, patient: &PatientSnapshot) -> Result<ResultSnapshot> {
        let started = Instant::now();
        let request = AnalyzeRequest {
            image: patient.xray_image.payload(),
            filename: format!(
                "xray_{}.{}",
                patient.patient_id,
                extension_for_mime(patient.xray_image.mime())
            ),
            patient_data: PatientFields {
                name: &patient.name,
                patient_id: &patient.patient_id,
                age: patient.age,
                sex: patient.sex.as_str(),
                symptoms: &patient.symptoms,
                medical_history: &patient.medical_history,
                allergies: &patient.allergies,
                current_medications: &patient.current_medications,
                clinical_note: &patient.clinical_note,
            },
        };

        let response = self
            .http
            .post(format!("{}/analyze", self.base_url))
            .json(&request)
            .send()
            .await
            .context("analysis service unreachable")?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response
                .json::<ServiceError>()
                .await
                .ok()
                .and_then(|body| body.error.or(body.message))
                .unwrap_or_default();
            bail!("analysis request failed: {status} {detail}");
        }

        let body: AnalyzeResponse = response
            .json()
            .await
            .context("invalid analysis response")?;
        let result = assemble_result(body, started.elapsed().as_secs_f64());
        info!(
            "Analysis completed: {} ({:.1}% confidence)",
            result.diagnosis.as_str(),
            result.confidence * 100.0
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_prediction_labels_onto_closed_set() {
        assert_eq!(map_prediction("Fracture"), Diagnosis::Fracture);
        assert_eq!(map_prediction("  fractured bone "), Diagnosis::Fracture);
        assert_eq!(map_prediction("positive"), Diagnosis::Fracture);
        assert_eq!(map_prediction("1"), Diagnosis::Fracture);
        assert_eq!(map_prediction("Normal"), Diagnosis::Normal);
        assert_eq!(map_prediction("negative"), Diagnosis::Normal);
        assert_eq!(map_prediction(""), Diagnosis::Normal);
    }

    #[test]
    fn request_uses_service_field_names() {
        let request = AnalyzeRequest {
            image: "QUJD",
            filename: "xray_PT-1.png".into(),
            patient_data: PatientFields {
                name: "Jordan Reyes",
                patient_id: "PT-1",
                age: 34,
                sex: "Other",
                symptoms: "wrist pain",
                medical_history: "none",
                allergies: "none",
                current_medications: "none",
                clinical_note: "FOOSH",
            },
        };

        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(value["image"], "QUJD");
        assert_eq!(value["patient_data"]["patientId"], "PT-1");
        assert_eq!(value["patient_data"]["medicalHistory"], "none");
        assert_eq!(value["patient_data"]["clinicalNote"], "FOOSH");
    }

    #[test]
    fn assembles_result_with_fallbacks() {
        let body = AnalyzeResponse {
            prediction: "Fracture".into(),
            confidence: 0.91,
            processing_time: None,
            gradcam_image: Some("QUJD".into()),
            shap_explanation: Some(ShapResponse {
                available: true,
                image: None,
                top_features: vec![ShapFeatureResponse {
                    position: PositionResponse { row: 3, col: 7 },
                    importance: 0.42,
                    region: "Region (3, 7)".into(),
                }],
                description: None,
            }),
        };

        let result = assemble_result(body, 2.5);
        assert_eq!(result.diagnosis, Diagnosis::Fracture);
        assert_eq!(result.processing_time, 2.5);
        let grad_cam = result.grad_cam_image.expect("grad-cam image");
        assert_eq!(grad_cam.mime(), "image/png");
        assert_eq!(grad_cam.payload(), "QUJD");
        let shap = result.shap_explanation.expect("shap");
        assert!(shap.available);
        assert_eq!(shap.top_features.len(), 1);
        assert_eq!(shap.top_features[0].position.row, 3);
        assert!(!shap.description.is_empty());
    }

    #[test]
    fn keeps_service_reported_processing_time() {
        let body = AnalyzeResponse {
            prediction: "Normal".into(),
            confidence: 0.6,
            processing_time: Some(0.8),
            gradcam_image: None,
            shap_explanation: None,
        };
        let result = assemble_result(body, 12.0);
        assert_eq!(result.processing_time, 0.8);
        assert!(result.grad_cam_image.is_none());
    }
}
