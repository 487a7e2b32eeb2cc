//! Route definitions for the `/images` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::images;
use crate::state::AppState;

/// Routes mounted at `/images`.
///
/// ```text
/// GET    /{subject_id}/conversion   -> get_conversion
/// POST   /{subject_id}/conversion   -> create_conversion (multipart)
/// PUT    /{subject_id}/conversion   -> replace_conversion (multipart)
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/{subject_id}/conversion",
        get(images::get_conversion)
            .post(images::create_conversion)
            .put(images::replace_conversion),
    )
}
