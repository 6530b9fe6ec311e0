use axum::routing::get;
use axum::Router;

use crate::handlers::gallery;
use crate::state::AppState;

/// Routes mounted at `/gallery`.
///
/// ```text
/// GET    /                -> list_images
/// POST   /                -> save_image
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(gallery::list_images).post(gallery::save_image))
}
