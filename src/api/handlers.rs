use crate::api::{AppState, USER_ID_HEADER};
use crate::error::{AppError, Result};
use crate::metrics::gather_metrics;
use crate::models::{CallerIdentity, PredictRequest, Practitioner, TriageResponse};
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let bundle = state.pipeline.bundles().current().ok();

    Json(HealthResponse {
        status: if bundle.is_some() { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_loaded: bundle.is_some(),
        model_version: bundle.as_ref().map(|b| b.version()),
        vocabulary_size: bundle.as_ref().map(|b| b.vocabulary_size()).unwrap_or(0),
        labels: bundle.as_ref().map(|b| b.labels().len()).unwrap_or(0),
    })
}

/// Liveness only; does not look at the model
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub model_loaded: bool,
    pub model_version: Option<String>,
    pub vocabulary_size: usize,
    pub labels: usize,
}

/// Classify a free-text symptom description
pub async fn predict(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<PredictRequest>,
) -> Result<Json<TriageResponse>> {
    request.validate()?;

    let caller = caller_identity(&headers);
    let response = state.pipeline.predict(&caller, &request.symptoms)?;

    Ok(Json(response))
}

fn caller_identity(headers: &HeaderMap) -> CallerIdentity {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(CallerIdentity::new)
        .unwrap_or_else(CallerIdentity::anonymous)
}

/// Full practitioner directory
pub async fn list_doctors(State(state): State<AppState>) -> Result<Json<Vec<Practitioner>>> {
    let bundle = state.pipeline.bundles().current()?;
    Ok(Json(bundle.catalogue().directory().all().to_vec()))
}

/// Practitioners of one specialty, matched case-insensitively
pub async fn doctors_by_specialty(
    State(state): State<AppState>,
    Path(specialty): Path<String>,
) -> Result<Json<Vec<Practitioner>>> {
    let bundle = state.pipeline.bundles().current()?;
    let practitioners: Vec<Practitioner> = bundle
        .catalogue()
        .directory()
        .by_specialty(&specialty)
        .into_iter()
        .cloned()
        .collect();

    if practitioners.is_empty() {
        return Err(AppError::NotFound(format!(
            "No practitioners found for specialty '{}'",
            specialty
        )));
    }
    Ok(Json(practitioners))
}

/// Prometheus text exposition
pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        gather_metrics(),
    )
}
