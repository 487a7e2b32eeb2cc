//! Route definitions for the `/sketches` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::sketches;
use crate::state::AppState;

/// Routes mounted at `/sketches`.
///
/// ```text
/// POST   /preview                   -> preview
/// GET    /{subject_id}/conversion   -> get_conversion
/// POST   /{subject_id}/conversion   -> create_conversion
/// PUT    /{subject_id}/conversion   -> replace_conversion
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/preview", post(sketches::preview))
        .route(
            "/{subject_id}/conversion",
            get(sketches::get_conversion)
                .post(sketches::create_conversion)
                .put(sketches::replace_conversion),
        )
}
