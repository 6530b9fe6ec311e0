use axum::routing::post;
use axum::Router;

use crate::handlers::variations;
use crate::state::AppState;

/// Routes mounted at `/variations`.
///
/// ```text
/// POST   /                -> create_variations
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/", post(variations::create_variations))
}
