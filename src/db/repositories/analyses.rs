use chrono::{Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use rusqlite::{params, params_from_iter, types::Value, Connection, Row};
use serde::Serialize;

use crate::db::{
    helpers::{parse_datetime, parse_diagnosis, parse_sex, parse_status, to_u32},
    models::{
        AnalysisPage, AnalysisStatus, AnalysisUpdate, HistoryFilter, PatientSnapshot,
        ResultSnapshot, StoreStats, StoredAnalysis,
    },
    Database,
};
use crate::error::{StoreError, StoreResult};
use crate::imaging::EncodedImage;

const SELECT_COLUMNS: &str = "id, patient_name, patient_id, sex, age, symptoms, \
     medical_history, allergies, current_medications, clinical_note, xray_image, \
     diagnosis, confidence, grad_cam_image, processing_time, analyzed_at, \
     detailed_json, shap_json, tags_json, notes, status, created_at, updated_at";

/// Time-based id with a random suffix, unique under rapid successive calls.
fn new_analysis_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(char::from)
        .collect();
    format!("analysis_{}_{}", Utc::now().timestamp_millis(), suffix)
}

fn to_json<T: Serialize>(value: &T, field: &str) -> StoreResult<String> {
    serde_json::to_string(value)
        .map_err(|err| StoreError::PersistenceFailure(format!("failed to serialize {field}: {err}")))
}

fn from_json<T: serde::de::DeserializeOwned>(raw: &str, field: &str) -> StoreResult<T> {
    serde_json::from_str(raw)
        .map_err(|err| StoreError::CorruptRecord(format!("bad {field}: {err}")))
}

fn parse_image(raw: &str, field: &str) -> StoreResult<EncodedImage> {
    EncodedImage::from_data_url(raw)
        .map_err(|err| StoreError::CorruptRecord(format!("bad {field}: {err}")))
}

fn row_to_analysis(row: &Row) -> StoreResult<StoredAnalysis> {
    let sex: String = row.get("sex")?;
    let age: i64 = row.get("age")?;
    let xray_image: String = row.get("xray_image")?;
    let diagnosis: String = row.get("diagnosis")?;
    let grad_cam_image: Option<String> = row.get("grad_cam_image")?;
    let analyzed_at: String = row.get("analyzed_at")?;
    let detailed_json: Option<String> = row.get("detailed_json")?;
    let shap_json: Option<String> = row.get("shap_json")?;
    let tags_json: String = row.get("tags_json")?;
    let status: String = row.get("status")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    let patient = PatientSnapshot {
        name: row.get("patient_name")?,
        patient_id: row.get("patient_id")?,
        sex: parse_sex(&sex)?,
        age: to_u32(age, "age")?,
        symptoms: row.get("symptoms")?,
        medical_history: row.get("medical_history")?,
        allergies: row.get("allergies")?,
        current_medications: row.get("current_medications")?,
        clinical_note: row.get("clinical_note")?,
        xray_image: parse_image(&xray_image, "xray_image")?,
    };

    let result = ResultSnapshot {
        diagnosis: parse_diagnosis(&diagnosis)?,
        confidence: row.get("confidence")?,
        grad_cam_image: grad_cam_image
            .map(|raw| parse_image(&raw, "grad_cam_image"))
            .transpose()?,
        processing_time: row.get("processing_time")?,
        timestamp: parse_datetime(&analyzed_at, "analyzed_at")?,
        detailed_analysis: detailed_json
            .map(|raw| from_json(&raw, "detailed_json"))
            .transpose()?,
        shap_explanation: shap_json
            .map(|raw| from_json(&raw, "shap_json"))
            .transpose()?,
    };

    Ok(StoredAnalysis {
        id: row.get("id")?,
        patient,
        result,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
        tags: from_json(&tags_json, "tags_json")?,
        notes: row.get("notes")?,
        status: parse_status(&status)?,
    })
}

/// WHERE clause plus bound values for a filter conjunction. Empty filter
/// yields an empty clause.
fn filter_sql(filter: &HistoryFilter) -> (String, Vec<Value>) {
    let mut clauses: Vec<&str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(patient_id) = &filter.patient_id {
        clauses.push("patient_id = ?");
        values.push(Value::from(patient_id.clone()));
    }
    if let Some(diagnosis) = filter.diagnosis {
        clauses.push("diagnosis = ?");
        values.push(Value::from(diagnosis.as_str().to_string()));
    }
    if let Some(from) = filter.date_from {
        clauses.push("created_at >= ?");
        values.push(Value::from(from.to_rfc3339()));
    }
    if let Some(to) = filter.date_to {
        clauses.push("created_at <= ?");
        values.push(Value::from(to.to_rfc3339()));
    }

    let clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    (clause, values)
}

/// One page of filter-matching records, most recent first, plus the exact
/// match count. `limit = -1` means unbounded (the export path).
fn query_page(
    conn: &Connection,
    limit: i64,
    offset: i64,
    filter: &HistoryFilter,
) -> StoreResult<AnalysisPage> {
    let (where_clause, values) = filter_sql(filter);

    let total_count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM analyses {where_clause}"),
        params_from_iter(values.iter()),
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM analyses {where_clause} \
         ORDER BY created_at DESC LIMIT ? OFFSET ?"
    ))?;

    let mut page_values = values;
    page_values.push(Value::from(limit));
    page_values.push(Value::from(offset));

    let mut rows = stmt.query(params_from_iter(page_values.iter()))?;
    let mut analyses = Vec::new();
    while let Some(row) = rows.next()? {
        analyses.push(row_to_analysis(row)?);
    }

    Ok(AnalysisPage {
        analyses,
        total_count: u64::try_from(total_count).unwrap_or(0),
        last_updated: Utc::now(),
    })
}

impl Database {
    /// Persist a completed analysis. Returns the generated record id.
    pub async fn insert_analysis(
        &self,
        patient: PatientSnapshot,
        result: ResultSnapshot,
    ) -> StoreResult<String> {
        self.execute(move |conn| {
            let id = new_analysis_id();
            let now = Utc::now().to_rfc3339();
            let detailed_json = result
                .detailed_analysis
                .as_ref()
                .map(|detailed| to_json(detailed, "detailed analysis"))
                .transpose()?;
            let shap_json = result
                .shap_explanation
                .as_ref()
                .map(|shap| to_json(shap, "shap explanation"))
                .transpose()?;

            conn.execute(
                "INSERT INTO analyses (
                    id, patient_name, patient_id, sex, age, symptoms,
                    medical_history, allergies, current_medications, clinical_note,
                    xray_image, diagnosis, confidence, grad_cam_image,
                    processing_time, analyzed_at, detailed_json, shap_json,
                    tags_json, notes, status, created_at, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                           ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23)",
                params![
                    id,
                    patient.name,
                    patient.patient_id,
                    patient.sex.as_str(),
                    i64::from(patient.age),
                    patient.symptoms,
                    patient.medical_history,
                    patient.allergies,
                    patient.current_medications,
                    patient.clinical_note,
                    patient.xray_image.as_data_url(),
                    result.diagnosis.as_str(),
                    result.confidence,
                    result.grad_cam_image.as_ref().map(|img| img.as_data_url()),
                    result.processing_time,
                    result.timestamp.to_rfc3339(),
                    detailed_json,
                    shap_json,
                    "[]",
                    Option::<String>::None,
                    AnalysisStatus::Completed.as_str(),
                    now,
                    now,
                ],
            )?;
            Ok(id)
        })
        .await
    }

    /// Point read. A missing id is `None`, not an error.
    pub async fn get_analysis(&self, id: &str) -> StoreResult<Option<StoredAnalysis>> {
        let id = id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM analyses WHERE id = ?1"
            ))?;
            let mut rows = stmt.query(params![id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_analysis(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    /// Filtered, paginated history in strictly descending creation order.
    ///
    /// `offset` skips filter-matching records, and `total_count` is the
    /// exact number of matches for the filter, counted with the same
    /// predicates in the same worker turn as the page scan.
    pub async fn list_analyses(
        &self,
        limit: usize,
        offset: usize,
        filter: HistoryFilter,
    ) -> StoreResult<AnalysisPage> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        self.execute(move |conn| query_page(conn, limit, offset, &filter))
            .await
    }

    /// Merge the provided fields into an existing record and bump
    /// `updated_at`. One atomic statement, so there is no read-modify-write
    /// window between concurrent callers.
    pub async fn update_analysis(&self, id: &str, update: AnalysisUpdate) -> StoreResult<()> {
        let id = id.to_string();
        self.execute(move |conn| {
            let mut sets: Vec<&str> = vec!["updated_at = ?"];
            let mut values: Vec<Value> = vec![Value::from(Utc::now().to_rfc3339())];

            if let Some(notes) = update.notes {
                sets.push("notes = ?");
                values.push(Value::from(notes));
            }
            if let Some(tags) = &update.tags {
                sets.push("tags_json = ?");
                values.push(Value::from(to_json(tags, "tags")?));
            }

            values.push(Value::from(id.clone()));
            let rows_affected = conn.execute(
                &format!("UPDATE analyses SET {} WHERE id = ?", sets.join(", ")),
                params_from_iter(values.iter()),
            )?;

            if rows_affected == 0 {
                return Err(StoreError::NotFound(id));
            }
            Ok(())
        })
        .await
    }

    /// Remove a record. Deleting an id that is already gone is a no-op,
    /// matching the engine's own delete semantics.
    pub async fn delete_analysis(&self, id: &str) -> StoreResult<()> {
        let id = id.to_string();
        self.execute(move |conn| {
            conn.execute("DELETE FROM analyses WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
    }

    /// Empty the store. Irreversible; confirmation is the caller's concern.
    pub async fn clear_analyses(&self) -> StoreResult<()> {
        self.execute(|conn| {
            conn.execute("DELETE FROM analyses", [])?;
            Ok(())
        })
        .await
    }

    /// Aggregate counters over the whole store. An empty store yields all
    /// zeros, never a division by zero.
    pub async fn analysis_stats(&self) -> StoreResult<StoreStats> {
        self.execute(|conn| {
            let week_ago = (Utc::now() - Duration::days(7)).to_rfc3339();
            let (total, fractures, normals, average, recent): (i64, i64, i64, f64, i64) = conn
                .query_row(
                    "SELECT COUNT(*),
                            COALESCE(SUM(CASE WHEN diagnosis = 'Fracture' THEN 1 ELSE 0 END), 0),
                            COALESCE(SUM(CASE WHEN diagnosis = 'Normal' THEN 1 ELSE 0 END), 0),
                            COALESCE(AVG(confidence), 0.0),
                            COALESCE(SUM(CASE WHEN created_at >= ?1 THEN 1 ELSE 0 END), 0)
                     FROM analyses",
                    params![week_ago],
                    |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                        ))
                    },
                )?;

            Ok(StoreStats {
                total_analyses: u64::try_from(total).unwrap_or(0),
                fracture_detected: u64::try_from(fractures).unwrap_or(0),
                normal_results: u64::try_from(normals).unwrap_or(0),
                average_confidence: average,
                recent_analyses: u64::try_from(recent).unwrap_or(0),
            })
        })
        .await
    }

    /// Serialize the entire store to the interchange JSON document:
    /// `{ "analyses": [...], "totalCount": n, "lastUpdated": <iso8601> }`.
    pub async fn export_analyses(&self) -> StoreResult<String> {
        let page = self
            .execute(|conn| query_page(conn, -1, 0, &HistoryFilter::default()))
            .await?;
        serde_json::to_string_pretty(&page).map_err(|err| {
            StoreError::PersistenceFailure(format!("failed to serialize export: {err}"))
        })
    }

    /// Case-insensitive substring search over patient name and patient id,
    /// most recent first.
    pub async fn search_analyses(&self, query: &str) -> StoreResult<Vec<StoredAnalysis>> {
        let pattern = format!("%{}%", query.to_lowercase());
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM analyses \
                 WHERE LOWER(patient_name) LIKE ?1 OR LOWER(patient_id) LIKE ?1 \
                 ORDER BY created_at DESC"
            ))?;
            let mut rows = stmt.query(params![pattern])?;
            let mut analyses = Vec::new();
            while let Some(row) = rows.next()? {
                analyses.push(row_to_analysis(row)?);
            }
            Ok(analyses)
        })
        .await
    }
}
