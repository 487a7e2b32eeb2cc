//! Queries shared by both conversion job tables.
//!
//! Script and image jobs have the same status, lease and timestamp
//! columns, so the status-machine queries are written once against a
//! [`JobTable`] descriptor.

use std::time::Duration;

use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool};
use sketchbook_core::types::DbId;
use uuid::Uuid;

use crate::models::status::{ConversionStatus, StatusId};
use crate::models::{StatusCount, StatusUpdate};

/// Row types that can be read from a job table.
pub(crate) trait JobRow: for<'r> FromRow<'r, PgRow> + Send + Unpin {}

impl<T> JobRow for T where T: for<'r> FromRow<'r, PgRow> + Send + Unpin {}

/// Table name plus the column list selected for its row type.
pub(crate) struct JobTable {
    pub name: &'static str,
    pub columns: &'static str,
}

impl JobTable {
    pub async fn find_by_id<T: JobRow>(&self, pool: &PgPool, id: DbId) -> Result<Option<T>, sqlx::Error> {
        let query = format!("SELECT {} FROM {} WHERE id = $1", self.columns, self.name);
        sqlx::query_as::<_, T>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_subject<T: JobRow>(
        &self,
        pool: &PgPool,
        subject_id: DbId,
    ) -> Result<Option<T>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM {} WHERE subject_id = $1",
            self.columns, self.name
        );
        sqlx::query_as::<_, T>(&query)
            .bind(subject_id)
            .fetch_optional(pool)
            .await
    }

    /// Pending jobs, oldest first.
    pub async fn list_pending<T: JobRow>(&self, pool: &PgPool, limit: i64) -> Result<Vec<T>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM {} WHERE status_id = $1 \
             ORDER BY created_at ASC, id ASC \
             LIMIT $2",
            self.columns, self.name
        );
        sqlx::query_as::<_, T>(&query)
            .bind(ConversionStatus::Pending.id())
            .bind(limit.max(0))
            .fetch_all(pool)
            .await
    }

    pub async fn count_pending(&self, pool: &PgPool) -> Result<i64, sqlx::Error> {
        let query = format!("SELECT COUNT(*) FROM {} WHERE status_id = $1", self.name);
        sqlx::query_scalar::<_, i64>(&query)
            .bind(ConversionStatus::Pending.id())
            .fetch_one(pool)
            .await
    }

    pub async fn status_counts(&self, pool: &PgPool) -> Result<Vec<StatusCount>, sqlx::Error> {
        let query = format!(
            "SELECT status_id, COUNT(*) AS count FROM {} \
             GROUP BY status_id ORDER BY status_id",
            self.name
        );
        sqlx::query_as::<_, StatusCount>(&query).fetch_all(pool).await
    }

    /// Return `processing` jobs whose lease has expired to `pending`.
    ///
    /// An attempt that stopped without recording an outcome leaves its job
    /// in `processing`; once the lease lapses the job rejoins the backlog.
    pub async fn requeue_expired(&self, pool: &PgPool) -> Result<u64, sqlx::Error> {
        let query = format!(
            "UPDATE {} \
             SET status_id = $1, lease_token = NULL, lease_expires_at = NULL \
             WHERE status_id = $2 AND lease_expires_at < NOW()",
            self.name
        );
        let result = sqlx::query(&query)
            .bind(ConversionStatus::Pending.id())
            .bind(ConversionStatus::Processing.id())
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Compare-and-swap into `processing`.
    ///
    /// Succeeds from a claimable status (`pending` or `error`), or from `processing` when the
    /// previous holder's lease has expired. Issues a fresh lease token and
    /// bumps `attempt_count`. Returns `None` when another attempt holds the
    /// job, the job is already processed, or it does not exist.
    pub async fn claim<T: JobRow>(
        &self,
        pool: &PgPool,
        id: DbId,
        lease_ttl: Duration,
    ) -> Result<Option<T>, sqlx::Error> {
        let query = format!(
            "UPDATE {} \
             SET status_id = $2, lease_token = $3, \
                 lease_expires_at = NOW() + make_interval(secs => $4), \
                 attempt_count = attempt_count + 1 \
             WHERE id = $1 \
               AND (status_id = ANY($5) \
                    OR (status_id = $2 \
                        AND (lease_expires_at IS NULL OR lease_expires_at < NOW()))) \
             RETURNING {}",
            self.name, self.columns
        );
        sqlx::query_as::<_, T>(&query)
            .bind(id)
            .bind(ConversionStatus::Processing.id())
            .bind(Uuid::new_v4())
            .bind(lease_ttl.as_secs_f64())
            .bind(claimable_status_ids())
            .fetch_optional(pool)
            .await
    }

    /// Partial status write, optionally guarded by a lease token.
    ///
    /// Leaving `processing` releases the lease. Returns `None` when the
    /// guard no longer matches (the attempt was superseded) or the job
    /// does not exist.
    pub async fn update_status<T: JobRow>(
        &self,
        pool: &PgPool,
        id: DbId,
        update: &StatusUpdate<'_>,
    ) -> Result<Option<T>, sqlx::Error> {
        let query = format!(
            "UPDATE {} \
             SET status_id = $2, \
                 derived_path = COALESCE(NULLIF($3::TEXT, ''), derived_path), \
                 error_message = CASE WHEN $2 = $6 THEN NULL \
                                      ELSE COALESCE(NULLIF($4::TEXT, ''), error_message) END, \
                 lease_token = CASE WHEN $2 = $7 THEN lease_token ELSE NULL END, \
                 lease_expires_at = CASE WHEN $2 = $7 THEN lease_expires_at ELSE NULL END \
             WHERE id = $1 AND ($5::UUID IS NULL OR lease_token = $5) \
             RETURNING {}",
            self.name, self.columns
        );
        sqlx::query_as::<_, T>(&query)
            .bind(id)
            .bind(update.status.id())
            .bind(update.derived_path)
            .bind(update.error_message)
            .bind(update.lease)
            .bind(ConversionStatus::Processed.id())
            .bind(ConversionStatus::Processing.id())
            .fetch_optional(pool)
            .await
    }
}

fn claimable_status_ids() -> Vec<StatusId> {
    ConversionStatus::ALL
        .iter()
        .copied()
        .filter(|s| s.is_claimable())
        .map(ConversionStatus::id)
        .collect()
}
