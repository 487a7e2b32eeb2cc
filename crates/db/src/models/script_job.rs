//! Script conversion jobs: sketch source (PDE) to browser-executable script.

use serde::{Deserialize, Serialize};
use sketchbook_core::types::{DbId, Timestamp};
use sqlx::FromRow;
use uuid::Uuid;

use super::status::{ConversionStatus, StatusId};

/// A row from the `script_conversion_jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ScriptConversionJob {
    pub id: DbId,
    /// The sketch this job produces a script for. Never reassigned.
    pub subject_id: DbId,
    /// Inline sketch source. May be empty when only `input_path` is set.
    pub input_content: String,
    /// Stored copy of the source, used to hydrate empty inline content.
    pub input_path: Option<String>,
    pub file_name: String,
    pub original_name: String,
    pub canvas_id: String,
    pub status_id: StatusId,
    pub derived_path: Option<String>,
    pub error_message: Option<String>,
    pub attempt_count: i32,
    #[serde(skip_serializing)]
    pub lease_token: Option<Uuid>,
    pub lease_expires_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ScriptConversionJob {
    /// Typed status. Unknown IDs cannot occur thanks to the foreign key.
    pub fn status(&self) -> Option<ConversionStatus> {
        ConversionStatus::from_id(self.status_id)
    }
}

/// DTO for creating a script conversion job.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateScriptJob {
    pub subject_id: DbId,
    pub input_content: String,
    pub input_path: Option<String>,
    pub file_name: String,
    pub original_name: String,
    pub canvas_id: String,
}

/// Replacement input for an existing job (the sketch was edited).
#[derive(Debug, Clone, Deserialize)]
pub struct ReplaceScriptInput {
    pub input_content: String,
    pub input_path: Option<String>,
    pub file_name: String,
    pub original_name: String,
    pub canvas_id: String,
}
