//! Handlers for the `/conversions` resource: lookup by job id, explicit
//! retry, and pipeline statistics.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use sketchbook_core::types::DbId;
use sketchbook_db::models::status::ConversionStatus;
use sketchbook_db::models::StatusCount;
use sketchbook_db::repositories::{ImageJobRepo, ScriptJobRepo};
use sketchbook_pipeline::{JobKind, JobRef, PipelineError, RetryStats};
use sketchbook_storage::StorageStats;

use crate::error::AppResult;
use crate::handlers::run_attempt;
use crate::response::DataResponse;
use crate::state::AppState;
use crate::views::{load_job, JobView};

fn job_ref(kind: &str, id: DbId) -> AppResult<JobRef> {
    let kind: JobKind = kind.parse()?;
    Ok(JobRef { kind, id })
}

/// GET /api/v1/conversions/{kind}/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, DbId)>,
) -> AppResult<Json<DataResponse<JobView>>> {
    let view = load_job(&state.pool, job_ref(&kind, id)?).await?;
    Ok(Json(DataResponse { data: view }))
}

/// POST /api/v1/conversions/{kind}/{id}/retry
///
/// Run one attempt synchronously. Returns 409 when the job is in flight or
/// already processed. Any other failure is recorded on the job, which is
/// returned as with an upload.
pub async fn retry_job(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, DbId)>,
) -> AppResult<Json<DataResponse<JobView>>> {
    let job = job_ref(&kind, id)?;

    match run_attempt(&state, job).await? {
        Ok(()) => tracing::info!(job_id = id, kind = %job.kind, "Manual retry succeeded"),
        Err(
            e @ (PipelineError::NotFound { .. }
            | PipelineError::InFlight(_)
            | PipelineError::AlreadyProcessed(_)
            | PipelineError::Superseded(_)),
        ) => return Err(e.into()),
        // Recorded on the job; returned below like an upload.
        Err(_) => {}
    }

    let view = load_job(&state.pool, job).await?;
    Ok(Json(DataResponse { data: view }))
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Job counts per lifecycle status.
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct StatusTotals {
    pub pending: i64,
    pub processing: i64,
    pub processed: i64,
    pub error: i64,
}

impl StatusTotals {
    fn from_counts(counts: &[StatusCount]) -> Self {
        let mut totals = Self::default();
        for row in counts {
            let slot = match ConversionStatus::from_id(row.status_id) {
                Some(ConversionStatus::Pending) => &mut totals.pending,
                Some(ConversionStatus::Processing) => &mut totals.processing,
                Some(ConversionStatus::Processed) => &mut totals.processed,
                Some(ConversionStatus::Error) => &mut totals.error,
                None => continue,
            };
            *slot += row.count;
        }
        totals
    }
}

#[derive(Debug, Serialize)]
pub struct StorageSummary {
    pub backends: Vec<&'static str>,
    #[serde(flatten)]
    pub writes: StorageStats,
    pub pending_cleanups: usize,
}

#[derive(Debug, Serialize)]
pub struct ConversionStats {
    pub scripts: StatusTotals,
    pub images: StatusTotals,
    pub retry: RetryStats,
    pub storage: StorageSummary,
}

/// GET /api/v1/conversions/stats
pub async fn stats(State(state): State<AppState>) -> AppResult<Json<DataResponse<ConversionStats>>> {
    let scripts = ScriptJobRepo::status_counts(&state.pool).await?;
    let images = ImageJobRepo::status_counts(&state.pool).await?;

    Ok(Json(DataResponse {
        data: ConversionStats {
            scripts: StatusTotals::from_counts(&scripts),
            images: StatusTotals::from_counts(&images),
            retry: state.supervisor.stats(),
            storage: StorageSummary {
                backends: state.storage.backend_names(),
                writes: state.storage.stats(),
                pending_cleanups: state.storage.pending_cleanups(),
            },
        },
    }))
}
