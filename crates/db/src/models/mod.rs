//! Conversion job models and DTOs.
//!
//! Each job kind has a `FromRow` + `Serialize` row struct, a create DTO,
//! and an input-replacement DTO used when the owning entity changes.

pub mod image_job;
pub mod script_job;
pub mod status;

use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use status::{ConversionStatus, StatusId};

/// Partial status write used by the conversion invoker.
///
/// `derived_path` and `error_message` overwrite the stored value only when
/// non-empty. Moving to `processed` always clears the error message.
/// When `lease` is set the write only applies while the row still carries
/// that lease token.
#[derive(Debug, Clone, Copy)]
pub struct StatusUpdate<'a> {
    pub status: ConversionStatus,
    pub derived_path: Option<&'a str>,
    pub error_message: Option<&'a str>,
    pub lease: Option<Uuid>,
}

impl<'a> StatusUpdate<'a> {
    /// Successful conversion.
    pub fn processed(derived_path: &'a str, lease: Option<Uuid>) -> Self {
        Self {
            status: ConversionStatus::Processed,
            derived_path: Some(derived_path),
            error_message: None,
            lease,
        }
    }

    /// Failed conversion.
    pub fn error(message: &'a str, lease: Option<Uuid>) -> Self {
        Self {
            status: ConversionStatus::Error,
            derived_path: None,
            error_message: Some(message),
            lease,
        }
    }
}

/// One row of a `GROUP BY status_id` count.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StatusCount {
    pub status_id: StatusId,
    pub count: i64,
}
