//! Route definitions for the `/conversions` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::conversions;
use crate::state::AppState;

/// Routes mounted at `/conversions`.
///
/// ```text
/// GET    /stats              -> stats
/// GET    /{kind}/{id}        -> get_job
/// POST   /{kind}/{id}/retry  -> retry_job
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(conversions::stats))
        .route("/{kind}/{id}", get(conversions::get_job))
        .route("/{kind}/{id}/retry", post(conversions::retry_job))
}
