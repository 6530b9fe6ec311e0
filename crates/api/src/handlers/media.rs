//! One-off generation calls that do not start a run.

use atelier_core::error::CoreError;
use atelier_core::job::ArtifactRef;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EditImage {
    pub image: ArtifactRef,
    pub instruction: String,
}

#[derive(Debug, Deserialize)]
pub struct GenerateText {
    pub prompt: String,
}

#[derive(Debug, Serialize)]
pub struct GeneratedText {
    pub text: String,
}

fn non_blank<'a>(field: &str, value: &'a str) -> Result<&'a str, CoreError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CoreError::Validation(format!("{field} must not be empty")));
    }
    Ok(value)
}

/// POST /api/v1/images/edit
///
/// Apply a text instruction to an existing image.
pub async fn edit_image(
    State(state): State<AppState>,
    Json(input): Json<EditImage>,
) -> AppResult<impl IntoResponse> {
    state.require_api_key().await?;
    let instruction = non_blank("instruction", &input.instruction)?;
    let edited = state.backend.edit_image(&input.image, instruction).await?;
    Ok(Json(DataResponse { data: edited }))
}

/// POST /api/v1/text
pub async fn generate_text(
    State(state): State<AppState>,
    Json(input): Json<GenerateText>,
) -> AppResult<impl IntoResponse> {
    state.require_api_key().await?;
    let prompt = non_blank("prompt", &input.prompt)?;
    let text = state.backend.generate_text(prompt).await?;
    Ok(Json(DataResponse {
        data: GeneratedText { text },
    }))
}
