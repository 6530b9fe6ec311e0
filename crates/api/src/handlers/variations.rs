use atelier_core::model::MAX_IMAGES_PER_CALL;
use atelier_pipeline::variations::generate_variations;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateVariations {
    pub prompt: String,
    #[serde(default = "default_count")]
    pub count: usize,
}

fn default_count() -> usize {
    MAX_IMAGES_PER_CALL as usize
}

/// POST /api/v1/variations
///
/// Generate `count` images of one prompt concurrently. Each job in the
/// response is independently `done` or `error`, in request order.
pub async fn create_variations(
    State(state): State<AppState>,
    Json(input): Json<CreateVariations>,
) -> AppResult<impl IntoResponse> {
    state.require_api_key().await?;
    let jobs = generate_variations(state.backend.as_ref(), &input.prompt, input.count).await?;

    tracing::info!(
        requested = input.count,
        failed = jobs.iter().filter(|j| j.error.is_some()).count(),
        "Variations generated",
    );
    Ok(Json(DataResponse { data: jobs }))
}
