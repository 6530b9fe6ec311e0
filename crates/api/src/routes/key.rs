//! Key endpoint: hands the server-held generative API key to the browser
//! client.

use atelier_core::error::CoreError;
use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::error::AppResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyResponse {
    pub api_key: String,
}

/// GET /api/key
///
/// `200 {"apiKey": ...}`, or `500` with the missing-key message when the
/// server has none.
async fn get_key(State(state): State<AppState>) -> AppResult<Json<KeyResponse>> {
    let context = state.context.read().await;
    let api_key = context
        .api_key()
        .ok_or(CoreError::MissingApiKey)?
        .to_string();
    Ok(Json(KeyResponse { api_key }))
}

/// Mount the key route (root level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/api/key", get(get_key))
}
