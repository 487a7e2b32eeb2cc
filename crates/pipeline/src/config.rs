use std::time::Duration;

use sketchbook_core::config::env_secs_or;
use sketchbook_core::error::CoreError;

use crate::retry::RetryConfig;

/// Invoker and retry settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// How long a claim protects a job from other attempts (`JOB_LEASE_SECS`, default 300).
    pub lease_ttl: Duration,
    pub retry: RetryConfig,
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, CoreError> {
        Ok(Self {
            lease_ttl: env_secs_or("JOB_LEASE_SECS", 300)?,
            retry: RetryConfig::from_env()?,
        })
    }
}
