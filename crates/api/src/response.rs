//! Shared response envelope types for API handlers.

use serde::Serialize;

/// Standard `{ "data": ... }` envelope used by every success response.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
