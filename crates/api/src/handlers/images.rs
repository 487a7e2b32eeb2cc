//! Handlers for image thumbnail conversions (`/images`).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sketchbook_core::error::CoreError;
use sketchbook_core::naming::{file_extension, generate_file_name, new_canvas_id};
use sketchbook_core::storage::Namespace;
use sketchbook_core::types::DbId;
use sketchbook_core::upload::{validate_image_upload, ImageDimensions};
use sketchbook_db::models::image_job::{CreateImageJob, ReplaceImageInput};
use sketchbook_db::repositories::ImageJobRepo;
use sketchbook_pipeline::{JobRef, PipelineError};

use crate::error::{AppError, AppResult};
use crate::extract::FileUpload;
use crate::handlers::convert_absorbing;
use crate::response::DataResponse;
use crate::state::AppState;
use crate::views::{load_job, ConversionJob, JobView};

/// Store an already validated original image.
///
/// Image jobs have no inline copy, so a failed store rejects the request.
async fn store_original(
    state: &AppState,
    upload: &FileUpload,
    dims: ImageDimensions,
) -> AppResult<(String, String)> {
    let ext = file_extension(&upload.file_name).unwrap_or_else(|| "png".to_string());
    let file_name = generate_file_name(&upload.file_name, &ext);

    let stored = state
        .storage
        .store(&upload.data, &file_name, Namespace::Original)
        .await
        .map_err(PipelineError::from)?;
    tracing::debug!(
        path = %stored.path,
        width = dims.width,
        height = dims.height,
        "Original image stored"
    );
    Ok((file_name, stored.path))
}

/// POST /api/v1/images/{subject_id}/conversion
///
/// Upload an image (multipart `file`), create its thumbnail job and run
/// the first attempt. Returns 201 with the job whether or not the attempt
/// succeeded.
pub async fn create_conversion(
    State(state): State<AppState>,
    Path(subject_id): Path<DbId>,
    upload: FileUpload,
) -> AppResult<(StatusCode, Json<DataResponse<JobView>>)> {
    let dims = validate_image_upload(&upload.file_name, &upload.data)?;
    create_job(state, subject_id, upload, dims).await
}

async fn create_job(
    state: AppState,
    subject_id: DbId,
    upload: FileUpload,
    dims: ImageDimensions,
) -> AppResult<(StatusCode, Json<DataResponse<JobView>>)> {
    if ImageJobRepo::find_by_subject(&state.pool, subject_id)
        .await?
        .is_some()
    {
        return Err(AppError::Core(CoreError::Conflict(format!(
            "Image {subject_id} already has a conversion job"
        ))));
    }

    let (file_name, input_path) = store_original(&state, &upload, dims).await?;
    let job = ImageJobRepo::create(
        &state.pool,
        &CreateImageJob {
            subject_id,
            input_path: Some(input_path),
            file_name,
            original_name: upload.file_name,
            canvas_id: new_canvas_id(),
        },
    )
    .await?;
    tracing::info!(job_id = job.id, subject_id, "Image conversion job created");

    let job_ref = JobRef::image(job.id);
    convert_absorbing(&state, job_ref).await;

    let view = load_job(&state.pool, job_ref).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: view })))
}

/// PUT /api/v1/images/{subject_id}/conversion
///
/// Replace the image and reconvert. Creates the job (201) when the image
/// has none yet.
pub async fn replace_conversion(
    State(state): State<AppState>,
    Path(subject_id): Path<DbId>,
    upload: FileUpload,
) -> AppResult<(StatusCode, Json<DataResponse<JobView>>)> {
    let dims = validate_image_upload(&upload.file_name, &upload.data)?;
    let Some(existing) = ImageJobRepo::find_by_subject(&state.pool, subject_id).await? else {
        return create_job(state, subject_id, upload, dims).await;
    };

    let (file_name, input_path) = store_original(&state, &upload, dims).await?;
    let job = ImageJobRepo::replace_input(
        &state.pool,
        existing.id,
        &ReplaceImageInput {
            input_path: Some(input_path),
            file_name,
            original_name: upload.file_name,
            canvas_id: new_canvas_id(),
        },
    )
    .await?
    .ok_or(AppError::Core(CoreError::NotFound {
        entity: "Image conversion job",
        id: existing.id,
    }))?;
    tracing::info!(job_id = job.id, subject_id, "Image conversion input replaced");

    let job_ref = JobRef::image(job.id);
    convert_absorbing(&state, job_ref).await;

    let view = load_job(&state.pool, job_ref).await?;
    Ok((StatusCode::OK, Json(DataResponse { data: view })))
}

/// GET /api/v1/images/{subject_id}/conversion
pub async fn get_conversion(
    State(state): State<AppState>,
    Path(subject_id): Path<DbId>,
) -> AppResult<Json<DataResponse<JobView>>> {
    let job = ImageJobRepo::find_by_subject(&state.pool, subject_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Image conversion",
            id: subject_id,
        }))?;
    Ok(Json(DataResponse {
        data: ConversionJob::Image(job).into(),
    }))
}
