//! Handlers for `/auth`: account sign-up and the server's signed-in session.
//!
//! The session lives in the shared [`AppContext`](atelier_core::context::AppContext):
//! signing in stores it, signing out clears it.

use atelier_core::context::AuthSession;
use atelier_core::error::CoreError;
use atelier_core::types::Timestamp;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    fn validate(&self) -> Result<(), CoreError> {
        if !self.email.contains('@') {
            return Err(CoreError::Validation("a valid email address is required".to_string()));
        }
        if self.password.is_empty() {
            return Err(CoreError::Validation("password must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Session details safe to hand back to the client. Tokens stay server-side.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub user_id: String,
    pub email: Option<String>,
    pub expires_at: Option<Timestamp>,
}

impl From<&AuthSession> for SessionView {
    fn from(session: &AuthSession) -> Self {
        Self {
            user_id: session.user_id.clone(),
            email: session.email.clone(),
            expires_at: session.expires_at,
        }
    }
}

/// POST /api/v1/auth/sign-up
pub async fn sign_up(
    State(state): State<AppState>,
    Json(input): Json<Credentials>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    state.store()?.sign_up(input.email.trim(), &input.password).await?;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: serde_json::json!({ "email": input.email.trim() }),
        }),
    ))
}

/// POST /api/v1/auth/sign-in
///
/// Replaces any existing session.
pub async fn sign_in(
    State(state): State<AppState>,
    Json(input): Json<Credentials>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let session = state.store()?.sign_in(input.email.trim(), &input.password).await?;
    let view = SessionView::from(&session);
    state.context.write().await.sign_in(session);
    Ok(Json(DataResponse { data: view }))
}

/// POST /api/v1/auth/sign-out
///
/// The local session is cleared even if the store cannot revoke it.
pub async fn sign_out(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let store = state.store()?;
    let session = state.context.write().await.sign_out();
    if let Some(session) = session {
        if let Err(e) = store.sign_out(&session).await {
            tracing::warn!(user_id = %session.user_id, error = %e, "Session revoke failed");
        }
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/auth/session
pub async fn current_session(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let context = state.context.read().await;
    let session = context.require_session(chrono::Utc::now())?;
    Ok(Json(DataResponse {
        data: SessionView::from(session),
    }))
}
