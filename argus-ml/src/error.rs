//! Error mapping at the HTTP boundary.

use argus_detect::error::DetectionError;
use argus_detect::logging::truncate_field;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errors a handler can return.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request was malformed or the series unusable; the caller can fix it.
    #[error("{0}")]
    BadRequest(String),

    /// Detection itself failed.
    #[error("{0}")]
    Internal(String),
}

impl From<DetectionError> for ApiError {
    fn from(err: DetectionError) -> Self {
        if err.is_client_error() {
            ApiError::BadRequest(err.to_string())
        } else {
            ApiError::Internal(err.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                tracing::debug!(error = %truncate_field(&message, 256), "Rejected detection request");
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": message, "anomalies": [] })),
                )
                    .into_response()
            }
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Detection failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": message })),
                )
                    .into_response()
            }
        }
    }
}

/// Result type alias for handlers.
pub type ApiResult<T> = Result<T, ApiError>;
