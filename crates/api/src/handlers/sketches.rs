//! Handlers for sketch conversions (`/sketches`).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sketchbook_core::error::CoreError;
use sketchbook_core::naming::{generate_file_name, new_canvas_id};
use sketchbook_core::storage::Namespace;
use sketchbook_core::types::DbId;
use sketchbook_core::upload::validate_script_upload;
use sketchbook_db::models::script_job::{CreateScriptJob, ReplaceScriptInput};
use sketchbook_db::repositories::ScriptJobRepo;
use sketchbook_pipeline::{JobRef, PreviewArtifact};

use crate::error::{AppError, AppResult};
use crate::extract::SketchUpload;
use crate::handlers::convert_absorbing;
use crate::response::DataResponse;
use crate::state::AppState;
use crate::views::{load_job, ConversionJob, JobView};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Stored file name and `/uploads/original/...` path for an upload.
///
/// The job keeps the source inline, so a failed store only loses the
/// stored copy and is not an error.
async fn store_original(
    state: &AppState,
    upload: &SketchUpload,
    ext: &str,
) -> (String, Option<String>) {
    let file_name = generate_file_name(&upload.file_name, ext);
    match state
        .storage
        .store(upload.content.as_bytes(), &file_name, Namespace::Original)
        .await
    {
        Ok(stored) => (file_name, Some(stored.path)),
        Err(e) => {
            tracing::warn!(file_name = %file_name, error = %e, "Failed to store sketch source");
            (file_name, None)
        }
    }
}

// ---------------------------------------------------------------------------
// Create / replace
// ---------------------------------------------------------------------------

/// POST /api/v1/sketches/{subject_id}/conversion
///
/// Create the sketch's conversion job and run the first attempt. Returns
/// 201 with the job whether or not the attempt succeeded.
pub async fn create_conversion(
    State(state): State<AppState>,
    Path(subject_id): Path<DbId>,
    upload: SketchUpload,
) -> AppResult<(StatusCode, Json<DataResponse<JobView>>)> {
    let ext = validate_script_upload(&upload.file_name, upload.content.len())?;

    if ScriptJobRepo::find_by_subject(&state.pool, subject_id)
        .await?
        .is_some()
    {
        return Err(AppError::Core(CoreError::Conflict(format!(
            "Sketch {subject_id} already has a conversion job"
        ))));
    }

    let (file_name, input_path) = store_original(&state, &upload, &ext).await;
    let job = ScriptJobRepo::create(
        &state.pool,
        &CreateScriptJob {
            subject_id,
            input_content: upload.content,
            input_path,
            file_name,
            original_name: upload.file_name,
            canvas_id: new_canvas_id(),
        },
    )
    .await?;
    tracing::info!(job_id = job.id, subject_id, "Script conversion job created");

    let job_ref = JobRef::script(job.id);
    convert_absorbing(&state, job_ref).await;

    let view = load_job(&state.pool, job_ref).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: view })))
}

/// PUT /api/v1/sketches/{subject_id}/conversion
///
/// Replace the sketch's source and reconvert. An attempt still running
/// against the previous source is superseded. Creates the job (201) when
/// the sketch has none yet.
pub async fn replace_conversion(
    State(state): State<AppState>,
    Path(subject_id): Path<DbId>,
    upload: SketchUpload,
) -> AppResult<(StatusCode, Json<DataResponse<JobView>>)> {
    let ext = validate_script_upload(&upload.file_name, upload.content.len())?;
    let Some(existing) = ScriptJobRepo::find_by_subject(&state.pool, subject_id).await? else {
        return create_conversion(State(state), Path(subject_id), upload).await;
    };

    let (file_name, input_path) = store_original(&state, &upload, &ext).await;
    let job = ScriptJobRepo::replace_input(
        &state.pool,
        existing.id,
        &ReplaceScriptInput {
            input_content: upload.content,
            input_path,
            file_name,
            original_name: upload.file_name,
            canvas_id: new_canvas_id(),
        },
    )
    .await?
    .ok_or(AppError::Core(CoreError::NotFound {
        entity: "Script conversion job",
        id: existing.id,
    }))?;
    tracing::info!(job_id = job.id, subject_id, "Script conversion input replaced");

    let job_ref = JobRef::script(job.id);
    convert_absorbing(&state, job_ref).await;

    let view = load_job(&state.pool, job_ref).await?;
    Ok((StatusCode::OK, Json(DataResponse { data: view })))
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// GET /api/v1/sketches/{subject_id}/conversion
pub async fn get_conversion(
    State(state): State<AppState>,
    Path(subject_id): Path<DbId>,
) -> AppResult<Json<DataResponse<JobView>>> {
    let job = ScriptJobRepo::find_by_subject(&state.pool, subject_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Sketch conversion",
            id: subject_id,
        }))?;
    Ok(Json(DataResponse {
        data: ConversionJob::Script(job).into(),
    }))
}

// ---------------------------------------------------------------------------
// Preview
// ---------------------------------------------------------------------------

/// POST /api/v1/sketches/preview
///
/// Convert without creating a job. The script is kept only for the
/// preview retention period. Conversion failures surface as 502.
pub async fn preview(
    State(state): State<AppState>,
    upload: SketchUpload,
) -> AppResult<Json<DataResponse<PreviewArtifact>>> {
    validate_script_upload(&upload.file_name, upload.content.len())?;
    let artifact = state
        .invoker
        .preview_script(&upload.content, &upload.file_name)
        .await?;
    Ok(Json(DataResponse { data: artifact }))
}
