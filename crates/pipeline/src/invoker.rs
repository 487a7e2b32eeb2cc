//! One conversion attempt per call.
//!
//! An attempt starts by claiming the job (`pending|error → processing`
//! with a fresh lease). Everything after the claim, including writing a
//! failure, is guarded by that lease, so an attempt whose job was claimed
//! elsewhere or whose input was replaced can never overwrite the newer
//! state.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use sketchbook_converter::{
    encode_image, ConversionApi, ConvertedImage, ImageConversionRequest, ScriptConversionRequest,
};
use sketchbook_core::naming::{derived_file_name, file_extension, generate_file_name, new_canvas_id};
use sketchbook_core::storage::Namespace;
use sketchbook_core::types::{DbId, PREVIEW_JOB_ID};
use sketchbook_core::upload::inspect_image;
use sketchbook_db::models::image_job::{ImageConversionJob, ImageMetrics};
use sketchbook_db::models::script_job::ScriptConversionJob;
use sketchbook_db::models::status::ConversionStatus;
use sketchbook_db::models::StatusUpdate;
use sketchbook_db::repositories::{ImageJobRepo, ScriptJobRepo};
use sketchbook_db::DbPool;
use sketchbook_storage::{StorageError, StorageGateway};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::job::{JobKind, JobRef, Reconverter};

/// Error recorded when a job has neither inline nor stored input.
pub const NO_INPUT_CONTENT: &str = "no input content";

/// Extension used for derived images whose format cannot be sniffed and
/// whose input name has none.
const FALLBACK_IMAGE_EXT: &str = "png";

/// Result of a preview conversion. Nothing is persisted in the Job Store.
#[derive(Debug, Clone, Serialize)]
pub struct PreviewArtifact {
    /// Ephemeral `/uploads/preview/...` path, removed after the retention period.
    pub path: String,
    pub js_content: String,
}

#[derive(Clone)]
pub struct ConversionInvoker {
    pool: DbPool,
    api: ConversionApi,
    storage: Arc<StorageGateway>,
    lease_ttl: Duration,
}

impl ConversionInvoker {
    pub fn new(
        pool: DbPool,
        api: ConversionApi,
        storage: Arc<StorageGateway>,
        lease_ttl: Duration,
    ) -> Self {
        Self {
            pool,
            api,
            storage,
            lease_ttl,
        }
    }

    pub fn lease_ttl(&self) -> Duration {
        self.lease_ttl
    }

    pub fn storage(&self) -> &Arc<StorageGateway> {
        &self.storage
    }

    // -----------------------------------------------------------------------
    // Script jobs
    // -----------------------------------------------------------------------

    /// Run one attempt for a script job.
    ///
    /// Returns the processed row. On failure the error is recorded on the
    /// job (while the lease is still held) before it is returned.
    pub async fn convert_script(&self, job_id: DbId) -> Result<ScriptConversionJob, PipelineError> {
        let job_ref = JobRef::script(job_id);
        let job = match ScriptJobRepo::claim(&self.pool, job_id, self.lease_ttl).await? {
            Some(job) => job,
            None => {
                let current = ScriptJobRepo::find_by_id(&self.pool, job_id).await?;
                return Err(claim_refused(job_ref, current.and_then(|j| j.status())));
            }
        };
        let lease = job.lease_token;
        tracing::info!(
            job_id,
            kind = "script",
            attempt = job.attempt_count,
            "Conversion attempt started"
        );

        let content = match self.script_source(&job, lease).await {
            Ok(content) => content,
            Err(e) => return Err(self.record_failure(job_ref, lease, e).await),
        };
        if content.trim().is_empty() {
            let err = PipelineError::Validation(NO_INPUT_CONTENT.to_string());
            return Err(self.record_failure(job_ref, lease, err).await);
        }

        let request = ScriptConversionRequest {
            processing_id: job.id,
            pde_content: content,
            file_name: job.file_name.clone(),
            original_name: job.original_name.clone(),
            canvas_id: job.canvas_id.clone(),
            is_preview: false,
        };
        let converted = match self.api.convert_script(&request).await {
            Ok(converted) => converted,
            Err(e) => return Err(self.record_failure(job_ref, lease, e.into()).await),
        };

        let file_name = derived_file_name(&job.file_name, "js");
        let stored = match self
            .storage
            .store(converted.js_content.as_bytes(), &file_name, Namespace::Js)
            .await
        {
            Ok(stored) => stored,
            Err(e) => return Err(self.record_failure(job_ref, lease, e.into()).await),
        };

        let update = StatusUpdate::processed(&stored.path, lease);
        match ScriptJobRepo::update_status(&self.pool, job.id, &update).await {
            Ok(Some(done)) => {
                tracing::info!(
                    job_id,
                    kind = "script",
                    derived_path = %stored.path,
                    backend = stored.backend,
                    fallback = stored.fallback,
                    "Conversion succeeded"
                );
                Ok(done)
            }
            Ok(None) => {
                tracing::info!(job_id, kind = "script", "Lease lost before commit, result discarded");
                Err(PipelineError::Superseded(job_ref))
            }
            Err(e) => {
                tracing::error!(
                    job_id,
                    kind = "script",
                    error = %e,
                    "Failed to record successful conversion"
                );
                Ok(ScriptConversionJob {
                    status_id: ConversionStatus::Processed.id(),
                    derived_path: Some(stored.path),
                    error_message: None,
                    lease_token: None,
                    lease_expires_at: None,
                    ..job
                })
            }
        }
    }

    /// Inline content, or the stored input file when the inline copy is empty.
    async fn script_source(
        &self,
        job: &ScriptConversionJob,
        lease: Option<Uuid>,
    ) -> Result<String, PipelineError> {
        if !job.input_content.trim().is_empty() {
            return Ok(job.input_content.clone());
        }
        let Some(path) = job.input_path.as_deref().filter(|p| !p.is_empty()) else {
            return Ok(String::new());
        };

        let bytes = match self.storage.fetch(path).await {
            Ok(bytes) => bytes,
            Err(StorageError::NotFound(_)) => return Ok(String::new()),
            Err(e) => return Err(e.into()),
        };
        let content = String::from_utf8_lossy(&bytes).into_owned();

        if !content.trim().is_empty() {
            match ScriptJobRepo::set_input_content(&self.pool, job.id, &content, lease).await {
                Ok(_) => tracing::debug!(job_id = job.id, path, "Hydrated input from storage"),
                Err(e) => tracing::warn!(
                    job_id = job.id,
                    error = %e,
                    "Failed to persist hydrated input"
                ),
            }
        }
        Ok(content)
    }

    /// Convert a sketch without creating or touching any job.
    ///
    /// The script is stored under the `preview` namespace and deleted after
    /// the storage gateway's retention period.
    pub async fn preview_script(
        &self,
        content: &str,
        file_name: &str,
    ) -> Result<PreviewArtifact, PipelineError> {
        if content.trim().is_empty() {
            return Err(PipelineError::Validation(NO_INPUT_CONTENT.to_string()));
        }

        let request = ScriptConversionRequest {
            processing_id: PREVIEW_JOB_ID,
            pde_content: content.to_string(),
            file_name: file_name.to_string(),
            original_name: file_name.to_string(),
            canvas_id: new_canvas_id(),
            is_preview: true,
        };
        let converted = self.api.convert_script(&request).await?;

        let stored = self
            .storage
            .store_ephemeral(
                converted.js_content.as_bytes(),
                &generate_file_name(file_name, "js"),
                Namespace::Preview,
            )
            .await?;
        tracing::debug!(path = %stored.path, "Preview conversion stored");

        Ok(PreviewArtifact {
            path: stored.path,
            js_content: converted.js_content,
        })
    }

    // -----------------------------------------------------------------------
    // Image jobs
    // -----------------------------------------------------------------------

    /// Run one attempt for an image job. Same contract as
    /// [`convert_script`](Self::convert_script).
    pub async fn convert_image(&self, job_id: DbId) -> Result<ImageConversionJob, PipelineError> {
        let job_ref = JobRef::image(job_id);
        let job = match ImageJobRepo::claim(&self.pool, job_id, self.lease_ttl).await? {
            Some(job) => job,
            None => {
                let current = ImageJobRepo::find_by_id(&self.pool, job_id).await?;
                return Err(claim_refused(job_ref, current.and_then(|j| j.status())));
            }
        };
        let lease = job.lease_token;
        tracing::info!(
            job_id,
            kind = "image",
            attempt = job.attempt_count,
            "Conversion attempt started"
        );

        let input = match self.image_source(&job).await {
            Ok(input) => input,
            Err(e) => return Err(self.record_failure(job_ref, lease, e).await),
        };
        if input.is_empty() {
            let err = PipelineError::Validation(NO_INPUT_CONTENT.to_string());
            return Err(self.record_failure(job_ref, lease, err).await);
        }

        let request = ImageConversionRequest {
            processing_id: job.id,
            image_data: encode_image(&input),
            file_name: job.file_name.clone(),
            original_name: job.original_name.clone(),
            canvas_id: job.canvas_id.clone(),
            is_preview: false,
        };
        let converted = match self.api.convert_image(&request).await {
            Ok(converted) => converted,
            Err(e) => return Err(self.record_failure(job_ref, lease, e.into()).await),
        };

        let ext = match inspect_image(&converted.data) {
            Some((_, ext)) => ext.to_string(),
            None => file_extension(&job.file_name).unwrap_or_else(|| FALLBACK_IMAGE_EXT.to_string()),
        };
        let file_name = derived_file_name(&job.file_name, &ext);
        let stored = match self
            .storage
            .store(&converted.data, &file_name, Namespace::Thumbnail)
            .await
        {
            Ok(stored) => stored,
            Err(e) => return Err(self.record_failure(job_ref, lease, e.into()).await),
        };

        let metrics = image_metrics(input.len(), &converted);
        match ImageJobRepo::complete(&self.pool, job.id, &stored.path, &metrics, lease).await {
            Ok(Some(done)) => {
                tracing::info!(
                    job_id,
                    kind = "image",
                    derived_path = %stored.path,
                    backend = stored.backend,
                    fallback = stored.fallback,
                    compression_ratio = metrics.compression_ratio,
                    "Conversion succeeded"
                );
                Ok(done)
            }
            Ok(None) => {
                tracing::info!(job_id, kind = "image", "Lease lost before commit, result discarded");
                Err(PipelineError::Superseded(job_ref))
            }
            Err(e) => {
                tracing::error!(
                    job_id,
                    kind = "image",
                    error = %e,
                    "Failed to record successful conversion"
                );
                Ok(ImageConversionJob {
                    status_id: ConversionStatus::Processed.id(),
                    derived_path: Some(stored.path),
                    error_message: None,
                    original_size: Some(metrics.original_size),
                    derived_size: Some(metrics.derived_size),
                    compression_ratio: Some(metrics.compression_ratio),
                    width: Some(metrics.width),
                    height: Some(metrics.height),
                    lease_token: None,
                    lease_expires_at: None,
                    ..job
                })
            }
        }
    }

    async fn image_source(&self, job: &ImageConversionJob) -> Result<Vec<u8>, PipelineError> {
        let Some(path) = job.input_path.as_deref().filter(|p| !p.is_empty()) else {
            return Ok(Vec::new());
        };
        match self.storage.fetch(path).await {
            Ok(bytes) => Ok(bytes),
            Err(StorageError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    // -----------------------------------------------------------------------
    // Shared
    // -----------------------------------------------------------------------

    /// Record `err` on the job under `lease` and return the error the
    /// caller should see.
    async fn record_failure(
        &self,
        job: JobRef,
        lease: Option<Uuid>,
        err: PipelineError,
    ) -> PipelineError {
        let message = err.to_string();
        tracing::warn!(
            job_id = job.id,
            kind = %job.kind,
            retryable = err.is_retryable(),
            error = %message,
            "Conversion attempt failed"
        );

        let update = StatusUpdate::error(&message, lease);
        let written = match job.kind {
            JobKind::Script => ScriptJobRepo::update_status(&self.pool, job.id, &update)
                .await
                .map(|row| row.is_some()),
            JobKind::Image => ImageJobRepo::update_status(&self.pool, job.id, &update)
                .await
                .map(|row| row.is_some()),
        };

        match written {
            Ok(true) => err,
            Ok(false) => {
                tracing::info!(
                    job_id = job.id,
                    kind = %job.kind,
                    "Lease lost before failure was recorded"
                );
                PipelineError::Superseded(job)
            }
            Err(e) => {
                tracing::error!(
                    job_id = job.id,
                    kind = %job.kind,
                    error = %e,
                    "Failed to record conversion failure"
                );
                PipelineError::Persistence(e)
            }
        }
    }
}

impl Reconverter for ConversionInvoker {
    async fn reconvert(&self, job: JobRef) -> Result<(), PipelineError> {
        match job.kind {
            JobKind::Script => self.convert_script(job.id).await.map(|_| ()),
            JobKind::Image => self.convert_image(job.id).await.map(|_| ()),
        }
    }
}

/// Why a claim returned no row.
fn claim_refused(job: JobRef, status: Option<ConversionStatus>) -> PipelineError {
    match status {
        None => PipelineError::NotFound {
            entity: match job.kind {
                JobKind::Script => "Script conversion job",
                JobKind::Image => "Image conversion job",
            },
            id: job.id,
        },
        Some(ConversionStatus::Processed) => PipelineError::AlreadyProcessed(job),
        Some(_) => PipelineError::InFlight(job),
    }
}

/// Metrics for a converted image, filling anything the function did not
/// report from the bytes themselves.
fn image_metrics(input_len: usize, converted: &ConvertedImage) -> ImageMetrics {
    let original_size = converted
        .original_size
        .unwrap_or_else(|| i64::try_from(input_len).unwrap_or(i64::MAX));
    let derived_size = converted
        .derived_size
        .unwrap_or_else(|| i64::try_from(converted.data.len()).unwrap_or(i64::MAX));
    let compression_ratio = converted.compression_ratio.unwrap_or(if original_size > 0 {
        derived_size as f64 / original_size as f64
    } else {
        1.0
    });

    let sniffed = inspect_image(&converted.data).map(|(dims, _)| dims);
    let width = converted
        .width
        .or_else(|| sniffed.and_then(|d| i32::try_from(d.width).ok()))
        .unwrap_or(0);
    let height = converted
        .height
        .or_else(|| sniffed.and_then(|d| i32::try_from(d.height).ok()))
        .unwrap_or(0);

    ImageMetrics {
        original_size,
        derived_size,
        compression_ratio,
        width,
        height,
    }
}
