//! Request handlers.

use argus_detect::types::{DetectionRequest, DetectionResult};
use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}

/// Liveness probe.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: crate::SERVICE_NAME,
    })
}

/// Runs detection over the posted series.
pub async fn detect(
    State(state): State<AppState>,
    payload: Result<Json<DetectionRequest>, JsonRejection>,
) -> ApiResult<Json<DetectionResult>> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let result = state.engine.detect(request).await?;
    Ok(Json(result))
}
