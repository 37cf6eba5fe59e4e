//! Classifier endpoints
//!
//! GET /api/features, POST /api/predict, POST /api/predict/csv

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use exo_common::batch::{score_csv, BatchOutcome, OUTPUT_FILE_NAME};
use exo_common::classifier::validate_threshold;
use exo_common::PredictionResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::{ApiError, ApiResult, AppState};

/// Largest accepted CSV upload
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Count of cells replaced with the default, sent with CSV downloads
pub const COERCED_CELLS_HEADER: &str = "x-coerced-cells";

/// GET /api/features response
#[derive(Debug, Serialize)]
pub struct FeaturesResponse {
    pub model: String,
    pub features: Vec<String>,
    pub threshold: f64,
    pub missing_value_default: f64,
}

/// POST /api/predict request
#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    /// Feature values; numbers or numeric strings, anything else counts as missing
    #[serde(default)]
    pub features: HashMap<String, Value>,
    pub threshold: Option<f64>,
}

/// POST /api/predict response
#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub model: String,
    #[serde(flatten)]
    pub result: PredictionResult,
}

/// Query parameters of POST /api/predict/csv
#[derive(Debug, Default, Deserialize)]
pub struct CsvQuery {
    pub threshold: Option<f64>,
    /// `csv` returns the scored file instead of the JSON summary
    pub format: Option<String>,
}

fn coerce(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

/// GET /api/features
pub async fn list_features(State(state): State<AppState>) -> ApiResult<Json<FeaturesResponse>> {
    let facade = state.classifier.facade()?;
    Ok(Json(FeaturesResponse {
        model: facade.model_name().to_string(),
        features: facade.manifest().names().to_vec(),
        threshold: facade.threshold(),
        missing_value_default: facade.missing_default(),
    }))
}

/// POST /api/predict
pub async fn predict(
    State(state): State<AppState>,
    Json(request): Json<PredictRequest>,
) -> ApiResult<Json<PredictResponse>> {
    let facade = state.classifier.facade()?;

    let inputs: HashMap<String, Option<f64>> = request
        .features
        .iter()
        .map(|(name, value)| (name.clone(), coerce(value)))
        .collect();

    let result = facade.classify(&inputs, request.threshold)?;
    Ok(Json(PredictResponse {
        model: facade.model_name().to_string(),
        result,
    }))
}

/// POST /api/predict/csv
///
/// The body is the raw CSV file. `?format=csv` returns the scored file as a
/// download with the coerced-cell count in `X-Coerced-Cells`.
pub async fn predict_csv(
    State(state): State<AppState>,
    Query(query): Query<CsvQuery>,
    body: Bytes,
) -> ApiResult<Response> {
    let facade = state.classifier.facade()?.clone();
    let threshold = match query.threshold {
        Some(t) => validate_threshold(t)?,
        None => facade.threshold(),
    };

    let outcome: BatchOutcome =
        tokio::task::spawn_blocking(move || score_csv(&facade, &body, threshold))
            .await
            .map_err(|e| ApiError::Internal(format!("Scoring task failed: {}", e)))??;

    match query.format.as_deref() {
        Some("csv") => Ok((
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", OUTPUT_FILE_NAME),
                ),
                (
                    HeaderName::from_static(COERCED_CELLS_HEADER),
                    outcome.coerced_cells.to_string(),
                ),
            ],
            outcome.csv,
        )
            .into_response()),
        Some("json") | None => Ok(Json(outcome).into_response()),
        Some(other) => Err(ApiError::BadRequest(format!(
            "Unknown format '{}', expected 'json' or 'csv'",
            other
        ))),
    }
}

/// Build classifier routes
pub fn predict_routes() -> Router<AppState> {
    Router::new()
        .route("/api/features", get(list_features))
        .route("/api/predict", post(predict))
        .route(
            "/api/predict/csv",
            post(predict_csv).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
}
