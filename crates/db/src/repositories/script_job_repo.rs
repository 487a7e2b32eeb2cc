//! Repository for the `script_conversion_jobs` table.

use std::time::Duration;

use sqlx::PgPool;
use sketchbook_core::types::DbId;
use uuid::Uuid;

use super::job_table::JobTable;
use crate::models::script_job::{CreateScriptJob, ReplaceScriptInput, ScriptConversionJob};
use crate::models::status::ConversionStatus;
use crate::models::{StatusCount, StatusUpdate};

/// Column list for `script_conversion_jobs` queries.
const COLUMNS: &str = "\
    id, subject_id, input_content, input_path, file_name, original_name, canvas_id, \
    status_id, derived_path, error_message, attempt_count, \
    lease_token, lease_expires_at, created_at, updated_at";

static TABLE: JobTable = JobTable {
    name: "script_conversion_jobs",
    columns: COLUMNS,
};

/// Provides CRUD and status-machine operations for script conversion jobs.
pub struct ScriptJobRepo;

impl ScriptJobRepo {
    /// Insert a new job in `pending` status.
    pub async fn create(
        pool: &PgPool,
        input: &CreateScriptJob,
    ) -> Result<ScriptConversionJob, sqlx::Error> {
        let query = format!(
            "INSERT INTO script_conversion_jobs \
                (subject_id, input_content, input_path, file_name, original_name, canvas_id, status_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ScriptConversionJob>(&query)
            .bind(input.subject_id)
            .bind(&input.input_content)
            .bind(&input.input_path)
            .bind(&input.file_name)
            .bind(&input.original_name)
            .bind(&input.canvas_id)
            .bind(ConversionStatus::Pending.id())
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<ScriptConversionJob>, sqlx::Error> {
        TABLE.find_by_id(pool, id).await
    }

    /// Find the job attached to a sketch.
    pub async fn find_by_subject(
        pool: &PgPool,
        subject_id: DbId,
    ) -> Result<Option<ScriptConversionJob>, sqlx::Error> {
        TABLE.find_by_subject(pool, subject_id).await
    }

    /// Full-record replace of every mutable column.
    ///
    /// `subject_id` is never written. Callers must re-read the job before
    /// calling this; there is no version check.
    pub async fn update(
        pool: &PgPool,
        job: &ScriptConversionJob,
    ) -> Result<Option<ScriptConversionJob>, sqlx::Error> {
        let query = format!(
            "UPDATE script_conversion_jobs \
             SET input_content = $2, input_path = $3, file_name = $4, original_name = $5, \
                 canvas_id = $6, status_id = $7, derived_path = $8, error_message = $9, \
                 attempt_count = $10, lease_token = $11, lease_expires_at = $12 \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ScriptConversionJob>(&query)
            .bind(job.id)
            .bind(&job.input_content)
            .bind(&job.input_path)
            .bind(&job.file_name)
            .bind(&job.original_name)
            .bind(&job.canvas_id)
            .bind(job.status_id)
            .bind(&job.derived_path)
            .bind(&job.error_message)
            .bind(job.attempt_count)
            .bind(job.lease_token)
            .bind(job.lease_expires_at)
            .fetch_optional(pool)
            .await
    }

    /// Replace the job's input after the sketch was edited.
    ///
    /// Resets the status to `pending` and drops any outstanding lease, so
    /// an attempt still running against the old input can no longer
    /// commit. The previous `derived_path` stays until a new artifact
    /// replaces it.
    pub async fn replace_input(
        pool: &PgPool,
        id: DbId,
        input: &ReplaceScriptInput,
    ) -> Result<Option<ScriptConversionJob>, sqlx::Error> {
        let query = format!(
            "UPDATE script_conversion_jobs \
             SET input_content = $2, input_path = $3, file_name = $4, original_name = $5, \
                 canvas_id = $6, status_id = $7, lease_token = NULL, lease_expires_at = NULL \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ScriptConversionJob>(&query)
            .bind(id)
            .bind(&input.input_content)
            .bind(&input.input_path)
            .bind(&input.file_name)
            .bind(&input.original_name)
            .bind(&input.canvas_id)
            .bind(ConversionStatus::Pending.id())
            .fetch_optional(pool)
            .await
    }

    /// Store hydrated inline content for a job that only had `input_path`.
    ///
    /// Only fills an empty `input_content`, and only while `lease` (when
    /// given) is still held. Returns whether a row was written.
    pub async fn set_input_content(
        pool: &PgPool,
        id: DbId,
        content: &str,
        lease: Option<Uuid>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE script_conversion_jobs SET input_content = $2 \
             WHERE id = $1 AND input_content = '' \
               AND ($3::UUID IS NULL OR lease_token = $3)",
        )
        .bind(id)
        .bind(content)
        .bind(lease)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Pending jobs, oldest first.
    pub async fn list_pending(
        pool: &PgPool,
        limit: i64,
    ) -> Result<Vec<ScriptConversionJob>, sqlx::Error> {
        TABLE.list_pending(pool, limit).await
    }

    pub async fn count_pending(pool: &PgPool) -> Result<i64, sqlx::Error> {
        TABLE.count_pending(pool).await
    }

    pub async fn status_counts(pool: &PgPool) -> Result<Vec<StatusCount>, sqlx::Error> {
        TABLE.status_counts(pool).await
    }

    /// Return expired `processing` jobs to `pending`. See [`JobTable::requeue_expired`].
    pub async fn requeue_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
        TABLE.requeue_expired(pool).await
    }

    /// Claim the job for one conversion attempt. See [`JobTable::claim`].
    pub async fn claim(
        pool: &PgPool,
        id: DbId,
        lease_ttl: Duration,
    ) -> Result<Option<ScriptConversionJob>, sqlx::Error> {
        TABLE.claim(pool, id, lease_ttl).await
    }

    /// Partial status write. See [`StatusUpdate`].
    pub async fn update_status(
        pool: &PgPool,
        id: DbId,
        update: &StatusUpdate<'_>,
    ) -> Result<Option<ScriptConversionJob>, sqlx::Error> {
        TABLE.update_status(pool, id, update).await
    }
}
