use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use sketchbook_core::error::CoreError;
use sketchbook_pipeline::PipelineError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and [`PipelineError`] for
/// conversion attempts, and adds HTTP-specific variants. Implements
/// [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `sketchbook_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A conversion attempt or storage write that could not be absorbed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Config(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    internal()
                }
            },

            // --- Database errors ---
            AppError::Database(err) => classify_sqlx_error(err),

            // --- Pipeline errors ---
            AppError::Pipeline(err) => classify_pipeline_error(err),

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

/// Classify a pipeline error into an HTTP status, error code, and message.
///
/// - Lease conflicts map to 409.
/// - Conversion function and storage failures map to 502 with the message
///   the function (or gateway) produced.
fn classify_pipeline_error(err: &PipelineError) -> (StatusCode, &'static str, String) {
    match err {
        PipelineError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string()),
        PipelineError::Validation(msg) => {
            (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
        }
        PipelineError::InFlight(_)
        | PipelineError::AlreadyProcessed(_)
        | PipelineError::Superseded(_) => (StatusCode::CONFLICT, "CONFLICT", err.to_string()),
        PipelineError::Transport(msg) | PipelineError::Conversion { message: msg, .. } => {
            (StatusCode::BAD_GATEWAY, "CONVERSION_FAILED", msg.clone())
        }
        PipelineError::Persistence(db_err) => classify_sqlx_error(db_err),
    }
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations (constraint name starting with `uq_`) map to 409.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) => {
            // PostgreSQL unique constraint violation: error code 23505
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                if constraint.starts_with("uq_") {
                    return (
                        StatusCode::CONFLICT,
                        "CONFLICT",
                        format!("Duplicate value violates unique constraint: {constraint}"),
                    );
                }
            }
            tracing::error!(error = %db_err, "Database error");
            internal()
        }
        other => {
            tracing::error!(error = %other, "Database error");
            internal()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sketchbook_pipeline::JobRef;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn lease_conflicts_are_409() {
        for err in [
            PipelineError::InFlight(JobRef::script(1)),
            PipelineError::AlreadyProcessed(JobRef::image(2)),
            PipelineError::Superseded(JobRef::script(3)),
        ] {
            assert_eq!(status_of(err.into()), StatusCode::CONFLICT);
        }
    }

    #[test]
    fn conversion_failures_are_502() {
        let err = PipelineError::Conversion {
            message: "syntax error on line 3".into(),
            retryable: false,
        };
        assert_eq!(status_of(err.into()), StatusCode::BAD_GATEWAY);

        let err = PipelineError::Transport("timed out".into());
        assert_eq!(status_of(err.into()), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn pipeline_validation_is_400() {
        let err = PipelineError::Validation("no input content".into());
        assert_eq!(status_of(err.into()), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn missing_job_is_404() {
        let err = PipelineError::NotFound {
            entity: "script job",
            id: 9,
        };
        assert_eq!(status_of(err.into()), StatusCode::NOT_FOUND);
        let err = CoreError::NotFound {
            entity: "Sketch",
            id: 9,
        };
        assert_eq!(status_of(err.into()), StatusCode::NOT_FOUND);
    }

    #[test]
    fn config_errors_are_sanitized() {
        let status = status_of(CoreError::Config("secret".into()).into());
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
