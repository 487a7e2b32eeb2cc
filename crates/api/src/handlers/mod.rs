//! Request handlers.
//!
//! Job-creating handlers run one synchronous conversion attempt and always
//! answer with the job, whatever the attempt's outcome. A failed attempt is
//! already recorded on the job; retryable failures are handed to the
//! retry supervisor.

pub mod conversions;
pub mod images;
pub mod sketches;

use sketchbook_pipeline::{JobRef, PipelineError, Reconverter, ScheduleError};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Run one attempt for `job` on a tracked task and return its outcome.
///
/// The attempt, and the retry decision for a failure, run to completion
/// even when the request that started them is dropped.
pub(crate) async fn run_attempt(
    state: &AppState,
    job: JobRef,
) -> AppResult<Result<(), PipelineError>> {
    let task_state = state.clone();
    state
        .attempts
        .spawn(async move {
            let outcome = task_state.invoker.reconvert(job).await;
            if let Err(e) = &outcome {
                absorb_failure(&task_state, job, e);
            }
            outcome
        })
        .await
        .map_err(|e| AppError::InternalError(format!("Conversion task for {job} failed: {e}")))
}

/// Run one attempt for `job`, absorbing any failure.
pub(crate) async fn convert_absorbing(state: &AppState, job: JobRef) {
    if let Err(e) = run_attempt(state, job).await {
        tracing::error!(job_id = job.id, kind = %job.kind, error = %e, "Conversion task aborted");
    }
}

/// Log a failed attempt and schedule a retry when one could succeed.
fn absorb_failure(state: &AppState, job: JobRef, err: &PipelineError) {
    if !err.is_retryable() {
        tracing::info!(job_id = job.id, kind = %job.kind, error = %err, "Conversion failed");
        return;
    }

    match state.supervisor.schedule(job) {
        Ok(()) => tracing::info!(
            job_id = job.id,
            kind = %job.kind,
            error = %err,
            "Conversion failed, retry scheduled"
        ),
        Err(ScheduleError::AlreadyScheduled(_)) => {
            tracing::debug!(job_id = job.id, kind = %job.kind, "Retry already scheduled");
        }
        Err(e) => tracing::warn!(
            job_id = job.id,
            kind = %job.kind,
            error = %err,
            schedule_error = %e,
            "Conversion failed and no retry could be scheduled"
        ),
    }
}
