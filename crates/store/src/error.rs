use atelier_core::error::CoreError;

use crate::auth::AuthError;

/// Errors from the backend store client.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The store returned a non-2xx status outside the auth endpoints.
    #[error("Store API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}
