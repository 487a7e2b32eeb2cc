use sketchbook_converter::ConverterError;
use sketchbook_core::types::DbId;
use sketchbook_storage::StorageError;

use crate::job::JobRef;

/// Errors from a conversion attempt.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: DbId },

    /// Nothing to convert, or input the function can never accept.
    #[error("{0}")]
    Validation(String),

    /// Network or timeout failure talking to a collaborator.
    #[error("{0}")]
    Transport(String),

    /// The conversion function answered but produced no usable artifact.
    #[error("{message}")]
    Conversion { message: String, retryable: bool },

    #[error("Database error: {0}")]
    Persistence(#[from] sqlx::Error),

    /// Another attempt currently holds the job's lease.
    #[error("{0} is already being converted")]
    InFlight(JobRef),

    /// The job already holds a derived artifact for its current input.
    #[error("{0} is already processed")]
    AlreadyProcessed(JobRef),

    /// The job's input changed while this attempt was running.
    #[error("{0} was superseded by newer input")]
    Superseded(JobRef),
}

impl PipelineError {
    /// Whether an automatic retry of the same job could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Conversion { retryable, .. } => *retryable,
            Self::NotFound { .. }
            | Self::Validation(_)
            | Self::Persistence(_)
            | Self::InFlight(_)
            | Self::AlreadyProcessed(_)
            | Self::Superseded(_) => false,
        }
    }
}

impl From<ConverterError> for PipelineError {
    fn from(err: ConverterError) -> Self {
        match err {
            ConverterError::Transport(_) => Self::Transport(err.to_string()),
            other => Self::Conversion {
                retryable: other.is_retryable(),
                message: other.to_string(),
            },
        }
    }
}

impl From<StorageError> for PipelineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidPath(e) => Self::Validation(e.to_string()),
            other => Self::Transport(format!("Artifact storage failed: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converter_errors_keep_their_classification() {
        let declined: PipelineError = ConverterError::Declined("bad sketch".into()).into();
        assert_eq!(declined.to_string(), "bad sketch");
        assert!(!declined.is_retryable());

        let busy: PipelineError = ConverterError::Status {
            status: 503,
            body: "busy".into(),
        }
        .into();
        assert!(busy.is_retryable());
    }

    #[test]
    fn storage_failure_is_retryable() {
        let err: PipelineError = StorageError::AllBackendsFailed("disk full".into()).into();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn lease_conflicts_are_not_retried() {
        assert!(!PipelineError::InFlight(JobRef::script(1)).is_retryable());
        assert!(!PipelineError::Superseded(JobRef::image(1)).is_retryable());
        assert!(!PipelineError::Validation("no input content".into()).is_retryable());
    }
}
