//! Response shapes for conversion jobs.

use serde::Serialize;
use sketchbook_core::error::CoreError;
use sketchbook_db::models::image_job::ImageConversionJob;
use sketchbook_db::models::script_job::ScriptConversionJob;
use sketchbook_db::models::status::ConversionStatus;
use sketchbook_db::repositories::{ImageJobRepo, ScriptJobRepo};
use sketchbook_db::DbPool;
use sketchbook_pipeline::{JobKind, JobRef};

use crate::error::AppResult;

/// A job row of either kind.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ConversionJob {
    Script(ScriptConversionJob),
    Image(ImageConversionJob),
}

impl ConversionJob {
    pub fn kind(&self) -> JobKind {
        match self {
            Self::Script(_) => JobKind::Script,
            Self::Image(_) => JobKind::Image,
        }
    }

    pub fn status(&self) -> Option<ConversionStatus> {
        match self {
            Self::Script(job) => job.status(),
            Self::Image(job) => job.status(),
        }
    }
}

/// A job row with its kind and status name alongside the raw columns.
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    pub kind: JobKind,
    pub status: &'static str,
    #[serde(flatten)]
    pub job: ConversionJob,
}

impl From<ConversionJob> for JobView {
    fn from(job: ConversionJob) -> Self {
        Self {
            kind: job.kind(),
            status: job.status().map_or("unknown", ConversionStatus::name),
            job,
        }
    }
}

/// Load a job by id, or fail with `NOT_FOUND`.
pub async fn load_job(pool: &DbPool, job: JobRef) -> AppResult<JobView> {
    let found = match job.kind {
        JobKind::Script => ScriptJobRepo::find_by_id(pool, job.id)
            .await?
            .map(ConversionJob::Script),
        JobKind::Image => ImageJobRepo::find_by_id(pool, job.id)
            .await?
            .map(ConversionJob::Image),
    };
    found.map(JobView::from).ok_or_else(|| not_found(job).into())
}

fn not_found(job: JobRef) -> CoreError {
    CoreError::NotFound {
        entity: match job.kind {
            JobKind::Script => "Script conversion job",
            JobKind::Image => "Image conversion job",
        },
        id: job.id,
    }
}
