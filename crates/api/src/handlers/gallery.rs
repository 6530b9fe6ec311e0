//! Handlers for `/gallery`: images the signed-in user saved to the store.

use atelier_core::context::AuthSession;
use atelier_core::error::CoreError;
use atelier_core::job::{ArtifactKind, ArtifactRef};
use atelier_store::images::{object_path, IMAGES_BUCKET};
use atelier_store::NewSavedImage;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SaveImage {
    pub prompt: String,
    pub image: ArtifactRef,
}

async fn signed_in(state: &AppState) -> Result<AuthSession, CoreError> {
    state
        .context
        .read()
        .await
        .require_session(chrono::Utc::now())
        .cloned()
}

/// POST /api/v1/gallery
///
/// Upload the image bytes to the images bucket and record the row.
/// Returns 201 with the stored row.
pub async fn save_image(
    State(state): State<AppState>,
    Json(input): Json<SaveImage>,
) -> AppResult<impl IntoResponse> {
    let store = state.store()?;
    let session = signed_in(&state).await?;
    let prompt = input.prompt.trim();
    if prompt.is_empty() {
        return Err(CoreError::Validation("prompt must not be empty".to_string()).into());
    }

    let bytes = state.backend.fetch(&input.image).await?;
    let content_type = input
        .image
        .mime_type()
        .unwrap_or(ArtifactKind::Image.default_mime_type())
        .to_string();
    let path = object_path(
        &session.user_id,
        chrono::Utc::now(),
        input.image.extension(ArtifactKind::Image),
    );
    let image_url = store
        .upload_object(&session, IMAGES_BUCKET, &path, bytes, &content_type)
        .await?;

    let row = store
        .insert_saved_image(
            &session,
            &NewSavedImage {
                user_id: session.user_id.clone(),
                prompt: prompt.to_string(),
                image_url,
            },
        )
        .await?;

    tracing::info!(user_id = %session.user_id, image_id = row.id, "Image saved");
    Ok((StatusCode::CREATED, Json(DataResponse { data: row })))
}

/// GET /api/v1/gallery
///
/// The signed-in user's saved images, newest first.
pub async fn list_images(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let store = state.store()?;
    let session = signed_in(&state).await?;
    let images = store.list_saved_images(&session).await?;
    Ok(Json(DataResponse { data: images }))
}
