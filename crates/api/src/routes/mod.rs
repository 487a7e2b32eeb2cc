pub mod conversions;
pub mod health;
pub mod images;
pub mod sketches;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /sketches/preview                        preview conversion (POST)
/// /sketches/{subject_id}/conversion        get, create (POST), replace (PUT)
///
/// /images/{subject_id}/conversion          get, create (POST), replace (PUT)
///
/// /conversions/stats                       per-status counts, retry and storage stats
/// /conversions/{kind}/{id}                 get job by id
/// /conversions/{kind}/{id}/retry           synchronous retry (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/sketches", sketches::router())
        .nest("/images", images::router())
        .nest("/conversions", conversions::router())
}
