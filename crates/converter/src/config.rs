use std::time::Duration;

use sketchbook_core::config::{env_secs_or, env_string_or};
use sketchbook_core::error::CoreError;

/// Endpoints and timeout of the conversion function.
#[derive(Debug, Clone)]
pub struct ConverterConfig {
    pub script_url: String,
    pub image_url: String,
    pub timeout: Duration,
}

impl ConverterConfig {
    /// Load from `CONVERTER_SCRIPT_URL`, `CONVERTER_IMAGE_URL` and
    /// `CONVERTER_TIMEOUT_SECS` (default 60).
    pub fn from_env() -> Result<Self, CoreError> {
        Ok(Self {
            script_url: env_string_or(
                "CONVERTER_SCRIPT_URL",
                "http://localhost:9000/convert/script",
            ),
            image_url: env_string_or("CONVERTER_IMAGE_URL", "http://localhost:9000/convert/image"),
            timeout: env_secs_or("CONVERTER_TIMEOUT_SECS", 60)?,
        })
    }

    /// Build the shared HTTP client with the configured request timeout.
    pub fn build_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder().timeout(self.timeout).build()
    }
}
