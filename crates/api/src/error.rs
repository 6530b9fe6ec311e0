use atelier_core::batch::BatchLoadError;
use atelier_core::error::CoreError;
use atelier_genai::{ErrorKind, GenAiError};
use atelier_pipeline::PipelineError;
use atelier_store::{AuthError, AuthErrorKind, StoreError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Message returned when the server holds no generative API key.
pub const MISSING_KEY_MESSAGE: &str = "API key not configured on server";

/// Application-level error type for HTTP handlers.
///
/// Wraps the domain errors and adds HTTP-specific variants. Implements
/// [`IntoResponse`] to produce consistent `{"error", "code"}` JSON bodies.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A generative API call made directly by a handler failed.
    #[error(transparent)]
    GenAi(#[from] GenAiError),

    /// An uploaded prompt file was rejected.
    #[error(transparent)]
    BatchLoad(#[from] BatchLoadError),

    /// A backend store call failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The server was started without `STORE_URL`/`STORE_ANON_KEY`.
    #[error("Backend store not configured")]
    StoreNotConfigured,

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::GenAi(e) => AppError::GenAi(e),
            PipelineError::Core(e) => AppError::Core(e),
            other => AppError::InternalError(other.to_string()),
        }
    }
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- Domain errors ---
            AppError::Core(core) => classify_core_error(core),

            // --- Generative API errors ---
            AppError::GenAi(err) => classify_genai_error(err),

            // --- Prompt file errors ---
            AppError::BatchLoad(err) => {
                let code = match err {
                    BatchLoadError::Parse(_) => "INVALID_JSON",
                    BatchLoadError::InvalidStructure(_) => "INVALID_STRUCTURE",
                    BatchLoadError::Empty => "EMPTY_BATCH",
                };
                (StatusCode::BAD_REQUEST, code, err.to_string())
            }

            // --- Backend store errors ---
            AppError::Store(err) => classify_store_error(err),
            AppError::StoreNotConfigured => (
                StatusCode::SERVICE_UNAVAILABLE,
                "STORE_NOT_CONFIGURED",
                self.to_string(),
            ),

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn classify_core_error(err: &CoreError) -> (StatusCode, &'static str, String) {
    match err {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
        CoreError::MissingApiKey => {
            tracing::error!("Request needs the generative API key but none is configured");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                MISSING_KEY_MESSAGE.to_string(),
            )
        }
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}

/// Auth failures keep their friendly message; everything else the store
/// says stays in the logs.
fn classify_store_error(err: &StoreError) -> (StatusCode, &'static str, String) {
    match err {
        StoreError::Auth(auth) => classify_auth_error(auth),
        StoreError::Api { status, body } => {
            tracing::warn!(status, body = %body, "Backend store request failed");
            (
                StatusCode::BAD_GATEWAY,
                "STORE_ERROR",
                format!("Backend store request failed (HTTP {status})"),
            )
        }
        StoreError::Request(e) => {
            tracing::warn!(error = %e, "Backend store unreachable");
            (
                StatusCode::BAD_GATEWAY,
                "STORE_UNAVAILABLE",
                "Backend store is unreachable".to_string(),
            )
        }
        StoreError::Core(core) => classify_core_error(core),
    }
}

fn classify_auth_error(err: &AuthError) -> (StatusCode, &'static str, String) {
    let (status, code) = match err.kind {
        AuthErrorKind::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
        AuthErrorKind::EmailNotConfirmed => (StatusCode::FORBIDDEN, "EMAIL_NOT_CONFIRMED"),
        AuthErrorKind::UserAlreadyExists => (StatusCode::CONFLICT, "USER_ALREADY_EXISTS"),
        AuthErrorKind::WeakPassword => (StatusCode::BAD_REQUEST, "WEAK_PASSWORD"),
        AuthErrorKind::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
        AuthErrorKind::Other if (400..500).contains(&err.status) => {
            (StatusCode::BAD_REQUEST, "AUTH_ERROR")
        }
        AuthErrorKind::Other => (StatusCode::BAD_GATEWAY, "AUTH_ERROR"),
    };
    tracing::info!(kind = ?err.kind, upstream_status = err.status, "Auth request rejected");
    (status, code, err.message.clone())
}

/// Map a generative API failure to an HTTP status, error code and message.
///
/// Upstream messages are user-facing already and are passed through.
fn classify_genai_error(err: &GenAiError) -> (StatusCode, &'static str, String) {
    let (status, code) = match err.kind() {
        ErrorKind::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
        ErrorKind::SafetyBlocked => (StatusCode::UNPROCESSABLE_ENTITY, "SAFETY_BLOCKED"),
        ErrorKind::Timeout => (StatusCode::GATEWAY_TIMEOUT, "UPSTREAM_TIMEOUT"),
        ErrorKind::Auth => (StatusCode::BAD_GATEWAY, "UPSTREAM_AUTH"),
        ErrorKind::EmptyResult
        | ErrorKind::MalformedJson
        | ErrorKind::Api
        | ErrorKind::Transport => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
    };
    tracing::warn!(kind = ?err.kind(), status = ?err.status(), error = %err, "Generative API call failed");
    (status, code, err.message().to_string())
}
