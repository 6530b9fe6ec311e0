pub mod auth;
pub mod batch;
pub mod gallery;
pub mod health;
pub mod key;
pub mod media;
pub mod variations;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /batches                    list, start a batch
/// /batches/load               validate an uploaded prompt file
/// /batches/story              start a story run
/// /batches/story/script       write a script only
/// /batches/ad                 start an ad video run
/// /batches/{id}               run status and scenes
/// /batches/{id}/events        progress stream (server-sent events)
/// /batches/{id}/cancel        cancel between scenes
///
/// /variations                 concurrent image variations
/// /images/edit                edit an image with an instruction
/// /text                       plain text generation
///
/// /auth/sign-up               create a store account
/// /auth/sign-in               start the server session
/// /auth/sign-out              end it
/// /auth/session               current session
/// /gallery                    list, save images to the store
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/batches", batch::router())
        .nest("/variations", variations::router())
        .nest("/auth", auth::router())
        .nest("/gallery", gallery::router())
        .merge(media::router())
}
