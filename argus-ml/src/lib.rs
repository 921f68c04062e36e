//! HTTP boundary for the argus anomaly detection engine.
//!
//! Exposes `GET /health` and `POST /detect`. The engine is built once at
//! startup and shared by every request.

use std::sync::Arc;

use argus_detect::engine::AnomalyEngine;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub mod error;
pub mod handlers;
pub mod settings;

/// Name reported by the health endpoint.
pub const SERVICE_NAME: &str = "argus-ml";

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub engine: Arc<AnomalyEngine>,
}

impl AppState {
    pub fn new(engine: AnomalyEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/detect", post(handlers::detect))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
