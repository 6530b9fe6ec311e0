#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// No API key is configured; generation calls must not be attempted.
    #[error("An API key is required before generating content")]
    MissingApiKey,

    #[error("Internal error: {0}")]
    Internal(String),
}
