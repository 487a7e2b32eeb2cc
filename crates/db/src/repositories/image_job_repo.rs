//! Repository for the `image_conversion_jobs` table.

use std::time::Duration;

use sqlx::PgPool;
use sketchbook_core::types::DbId;
use uuid::Uuid;

use super::job_table::JobTable;
use crate::models::image_job::{CreateImageJob, ImageConversionJob, ImageMetrics, ReplaceImageInput};
use crate::models::status::ConversionStatus;
use crate::models::{StatusCount, StatusUpdate};

/// Column list for `image_conversion_jobs` queries.
const COLUMNS: &str = "\
    id, subject_id, input_path, file_name, original_name, canvas_id, \
    status_id, derived_path, error_message, \
    original_size, derived_size, compression_ratio, width, height, \
    attempt_count, lease_token, lease_expires_at, created_at, updated_at";

static TABLE: JobTable = JobTable {
    name: "image_conversion_jobs",
    columns: COLUMNS,
};

/// Provides CRUD and status-machine operations for image conversion jobs.
pub struct ImageJobRepo;

impl ImageJobRepo {
    /// Insert a new job in `pending` status.
    pub async fn create(
        pool: &PgPool,
        input: &CreateImageJob,
    ) -> Result<ImageConversionJob, sqlx::Error> {
        let query = format!(
            "INSERT INTO image_conversion_jobs \
                (subject_id, input_path, file_name, original_name, canvas_id, status_id) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ImageConversionJob>(&query)
            .bind(input.subject_id)
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
    ) -> Result<Option<ImageConversionJob>, sqlx::Error> {
        TABLE.find_by_id(pool, id).await
    }

    /// Find the job attached to an image asset.
    pub async fn find_by_subject(
        pool: &PgPool,
        subject_id: DbId,
    ) -> Result<Option<ImageConversionJob>, sqlx::Error> {
        TABLE.find_by_subject(pool, subject_id).await
    }

    /// Full-record replace of every mutable column. `subject_id` is never written.
    pub async fn update(
        pool: &PgPool,
        job: &ImageConversionJob,
    ) -> Result<Option<ImageConversionJob>, sqlx::Error> {
        let query = format!(
            "UPDATE image_conversion_jobs \
             SET input_path = $2, file_name = $3, original_name = $4, canvas_id = $5, \
                 status_id = $6, derived_path = $7, error_message = $8, \
                 original_size = $9, derived_size = $10, compression_ratio = $11, \
                 width = $12, height = $13, attempt_count = $14, \
                 lease_token = $15, lease_expires_at = $16 \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ImageConversionJob>(&query)
            .bind(job.id)
            .bind(&job.input_path)
            .bind(&job.file_name)
            .bind(&job.original_name)
            .bind(&job.canvas_id)
            .bind(job.status_id)
            .bind(&job.derived_path)
            .bind(&job.error_message)
            .bind(job.original_size)
            .bind(job.derived_size)
            .bind(job.compression_ratio)
            .bind(job.width)
            .bind(job.height)
            .bind(job.attempt_count)
            .bind(job.lease_token)
            .bind(job.lease_expires_at)
            .fetch_optional(pool)
            .await
    }

    /// Replace the job's input after a new image was uploaded.
    ///
    /// Resets to `pending` and drops any outstanding lease.
    pub async fn replace_input(
        pool: &PgPool,
        id: DbId,
        input: &ReplaceImageInput,
    ) -> Result<Option<ImageConversionJob>, sqlx::Error> {
        let query = format!(
            "UPDATE image_conversion_jobs \
             SET input_path = $2, file_name = $3, original_name = $4, canvas_id = $5, \
                 status_id = $6, lease_token = NULL, lease_expires_at = NULL \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ImageConversionJob>(&query)
            .bind(id)
            .bind(&input.input_path)
            .bind(&input.file_name)
            .bind(&input.original_name)
            .bind(&input.canvas_id)
            .bind(ConversionStatus::Pending.id())
            .fetch_optional(pool)
            .await
    }

    /// Pending jobs, oldest first.
    pub async fn list_pending(
        pool: &PgPool,
        limit: i64,
    ) -> Result<Vec<ImageConversionJob>, sqlx::Error> {
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

    /// Claim the job for one conversion attempt.
    pub async fn claim(
        pool: &PgPool,
        id: DbId,
        lease_ttl: Duration,
    ) -> Result<Option<ImageConversionJob>, sqlx::Error> {
        TABLE.claim(pool, id, lease_ttl).await
    }

    /// Partial status write. See [`StatusUpdate`].
    pub async fn update_status(
        pool: &PgPool,
        id: DbId,
        update: &StatusUpdate<'_>,
    ) -> Result<Option<ImageConversionJob>, sqlx::Error> {
        TABLE.update_status(pool, id, update).await
    }

    /// Mark the job processed together with its compression metrics in a
    /// single write, guarded by `lease` when given.
    pub async fn complete(
        pool: &PgPool,
        id: DbId,
        derived_path: &str,
        metrics: &ImageMetrics,
        lease: Option<Uuid>,
    ) -> Result<Option<ImageConversionJob>, sqlx::Error> {
        let query = format!(
            "UPDATE image_conversion_jobs \
             SET status_id = $2, derived_path = $3, error_message = NULL, \
                 original_size = $4, derived_size = $5, compression_ratio = $6, \
                 width = $7, height = $8, \
                 lease_token = NULL, lease_expires_at = NULL \
             WHERE id = $1 AND ($9::UUID IS NULL OR lease_token = $9) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ImageConversionJob>(&query)
            .bind(id)
            .bind(ConversionStatus::Processed.id())
            .bind(derived_path)
            .bind(metrics.original_size)
            .bind(metrics.derived_size)
            .bind(metrics.compression_ratio)
            .bind(metrics.width)
            .bind(metrics.height)
            .bind(lease)
            .fetch_optional(pool)
            .await
    }
}
