//! Route definitions for the `/batches` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::batch;
use crate::state::AppState;

/// Routes mounted at `/batches`.
///
/// ```text
/// GET    /                -> list_batches
/// POST   /                -> create_batch
/// POST   /load            -> load_batch
/// POST   /story           -> create_story
/// POST   /story/script    -> preview_script
/// POST   /ad              -> create_ad
/// GET    /{id}            -> get_batch
/// GET    /{id}/events     -> stream_events
/// POST   /{id}/cancel     -> cancel_batch
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(batch::list_batches).post(batch::create_batch))
        .route("/load", post(batch::load_batch))
        .route("/story", post(batch::create_story))
        .route("/story/script", post(batch::preview_script))
        .route("/ad", post(batch::create_ad))
        .route("/{id}", get(batch::get_batch))
        .route("/{id}/events", get(batch::stream_events))
        .route("/{id}/cancel", post(batch::cancel_batch))
}
