//! Library half of the external batch consumer.
//!
//! A batch message only carries a size. The consumer re-reads the pending
//! backlog at drain time, oldest first, and runs each job in turn.

use std::sync::Arc;

use serde::Serialize;
use sketchbook_db::repositories::{ImageJobRepo, ScriptJobRepo};
use sketchbook_db::DbPool;

use crate::error::PipelineError;
use crate::job::{JobRef, Reconverter};

/// Outcome counts of one [`BatchDrainer::drain`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub attempted: usize,
    pub processed: usize,
    pub failed: usize,
    /// Jobs another writer claimed or replaced between listing and claiming.
    pub skipped: usize,
}

pub struct BatchDrainer<R> {
    pool: DbPool,
    reconverter: Arc<R>,
}

impl<R: Reconverter> BatchDrainer<R> {
    pub fn new(pool: DbPool, reconverter: Arc<R>) -> Self {
        Self { pool, reconverter }
    }

    /// Convert up to `batch_size` pending jobs, oldest first across both
    /// kinds.
    ///
    /// Jobs whose attempt expired without an outcome are requeued first.
    /// Only listing failures are returned; individual job failures are
    /// recorded on the jobs and counted in the report.
    pub async fn drain(&self, batch_size: i64) -> Result<DrainReport, PipelineError> {
        let requeued = ScriptJobRepo::requeue_expired(&self.pool).await?
            + ImageJobRepo::requeue_expired(&self.pool).await?;
        if requeued > 0 {
            tracing::info!(requeued, "Requeued jobs with expired leases");
        }

        let mut backlog: Vec<_> = ScriptJobRepo::list_pending(&self.pool, batch_size)
            .await?
            .into_iter()
            .map(|job| (job.created_at, JobRef::script(job.id)))
            .collect();
        backlog.extend(
            ImageJobRepo::list_pending(&self.pool, batch_size)
                .await?
                .into_iter()
                .map(|job| (job.created_at, JobRef::image(job.id))),
        );
        backlog.sort_by_key(|(created_at, job)| (*created_at, job.id));
        backlog.truncate(usize::try_from(batch_size).unwrap_or(0));
        let jobs = backlog.into_iter().map(|(_, job)| job);

        let mut report = DrainReport::default();
        for job in jobs {
            report.attempted += 1;
            match self.reconverter.reconvert(job).await {
                Ok(()) => report.processed += 1,
                Err(
                    PipelineError::InFlight(_)
                    | PipelineError::Superseded(_)
                    | PipelineError::AlreadyProcessed(_),
                ) => report.skipped += 1,
                Err(e) => {
                    tracing::warn!(job_id = job.id, kind = %job.kind, error = %e, "Batch conversion failed");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            attempted = report.attempted,
            processed = report.processed,
            failed = report.failed,
            skipped = report.skipped,
            "Batch drained"
        );
        Ok(report)
    }
}
