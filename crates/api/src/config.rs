use std::time::Duration;

use sketchbook_core::config::{env_list_or, env_or, env_secs_or, env_string_or};
use sketchbook_core::error::CoreError;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds. Job-creating requests wait for a
    /// synchronous conversion attempt, so this is well above the converter
    /// timeout.
    pub request_timeout_secs: u64,
    /// How long shutdown waits for each background component to drain.
    pub shutdown_timeout: Duration,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                 |
    /// |-------------------------|-------------------------|
    /// | `HOST`                  | `0.0.0.0`               |
    /// | `PORT`                  | `3000`                  |
    /// | `CORS_ORIGINS`          | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`  | `90`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                    |
    pub fn from_env() -> Result<Self, CoreError> {
        Ok(Self {
            host: env_string_or("HOST", "0.0.0.0"),
            port: env_or("PORT", 3000)?,
            cors_origins: env_list_or("CORS_ORIGINS", "http://localhost:5173"),
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 90)?,
            shutdown_timeout: env_secs_or("SHUTDOWN_TIMEOUT_SECS", 30)?,
        })
    }
}
