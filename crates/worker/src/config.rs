use sketchbook_core::config::env_required;
use sketchbook_core::error::CoreError;

/// Settings for the batch trigger binary.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    /// SQS queue URL the batch message is sent to.
    pub queue_url: String,
}

impl WorkerConfig {
    /// Load `DATABASE_URL` and `BATCH_QUEUE_URL`, both required.
    pub fn from_env() -> Result<Self, CoreError> {
        Ok(Self {
            database_url: env_required("DATABASE_URL")?,
            queue_url: env_required("BATCH_QUEUE_URL")?,
        })
    }
}
