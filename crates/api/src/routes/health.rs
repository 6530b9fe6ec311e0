use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether a generative API key is configured.
    pub api_key_configured: bool,
}

/// GET /health -- returns service health.
///
/// A missing API key degrades the service: every generation call would fail.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let api_key_configured = state.context.read().await.has_api_key();
    let status = if api_key_configured { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        api_key_configured,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
