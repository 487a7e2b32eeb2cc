//! Image conversion jobs: uploaded image to compressed derived image.

use serde::{Deserialize, Serialize};
use sketchbook_core::types::{DbId, Timestamp};
use sqlx::FromRow;
use uuid::Uuid;

use super::status::{ConversionStatus, StatusId};

/// A row from the `image_conversion_jobs` table.
///
/// The size and dimension columns are only populated once the job is
/// processed.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ImageConversionJob {
    pub id: DbId,
    pub subject_id: DbId,
    pub input_path: Option<String>,
    pub file_name: String,
    pub original_name: String,
    pub canvas_id: String,
    pub status_id: StatusId,
    pub derived_path: Option<String>,
    pub error_message: Option<String>,
    pub original_size: Option<i64>,
    pub derived_size: Option<i64>,
    pub compression_ratio: Option<f64>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub attempt_count: i32,
    #[serde(skip_serializing)]
    pub lease_token: Option<Uuid>,
    pub lease_expires_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ImageConversionJob {
    pub fn status(&self) -> Option<ConversionStatus> {
        ConversionStatus::from_id(self.status_id)
    }
}

/// DTO for creating an image conversion job.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateImageJob {
    pub subject_id: DbId,
    pub input_path: Option<String>,
    pub file_name: String,
    pub original_name: String,
    pub canvas_id: String,
}

/// Replacement input for an existing image job.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplaceImageInput {
    pub input_path: Option<String>,
    pub file_name: String,
    pub original_name: String,
    pub canvas_id: String,
}

/// Compression results reported by the conversion function.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageMetrics {
    pub original_size: i64,
    pub derived_size: i64,
    pub compression_ratio: f64,
    pub width: i32,
    pub height: i32,
}
