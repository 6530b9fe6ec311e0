use axum::routing::post;
use axum::Router;

use crate::handlers::media;
use crate::state::AppState;

/// Single-call generation routes, mounted at the `/api/v1` root.
///
/// ```text
/// POST   /images/edit     -> edit_image
/// POST   /text            -> generate_text
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/images/edit", post(media::edit_image))
        .route("/text", post(media::generate_text))
}
