//! Storage configuration loaded from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sketchbook_core::config::{env_list_or, env_secs_or, env_string_or};
use sketchbook_core::error::CoreError;
use sketchbook_core::storage::Namespace;

use crate::backend::StorageBackend;
use crate::error::StorageError;
use crate::gateway::StorageGateway;
use crate::local::LocalBackend;
use crate::remote::RemoteGatewayBackend;
use crate::s3::S3Backend;

/// One entry of the ranked `STORAGE_BACKENDS` list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Gateway,
    S3,
    Local,
}

impl FromStr for BackendKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gateway" => Ok(Self::Gateway),
            "s3" => Ok(Self::S3),
            "local" => Ok(Self::Local),
            other => Err(CoreError::Config(format!(
                "Unknown storage backend '{other}' (expected gateway, s3 or local)"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Backends in priority order.
    pub backends: Vec<BackendKind>,
    pub worker_url: String,
    pub public_url: String,
    pub api_key: String,
    pub timeout: Duration,
    pub s3_bucket: Option<String>,
    pub s3_prefix: String,
    pub upload_root: PathBuf,
    pub preview_retention: Duration,
}

impl StorageConfig {
    /// Load from the environment.
    ///
    /// | Env var                  | Default                  |
    /// |--------------------------|--------------------------|
    /// | `STORAGE_BACKENDS`       | `gateway,local`          |
    /// | `STORAGE_WORKER_URL`     | `http://localhost:8787`  |
    /// | `STORAGE_PUBLIC_URL`     | worker URL               |
    /// | `STORAGE_API_KEY`        | empty                    |
    /// | `STORAGE_TIMEOUT_SECS`   | `30`                     |
    /// | `STORAGE_S3_BUCKET`      | unset                    |
    /// | `STORAGE_S3_PREFIX`      | `uploads`                |
    /// | `UPLOAD_ROOT`            | `./uploads`              |
    /// | `PREVIEW_RETENTION_SECS` | `3600`                   |
    pub fn from_env() -> Result<Self, CoreError> {
        let backends = env_list_or("STORAGE_BACKENDS", "gateway,local")
            .iter()
            .map(|s| s.parse())
            .collect::<Result<Vec<BackendKind>, _>>()?;
        if backends.is_empty() {
            return Err(CoreError::Config(
                "STORAGE_BACKENDS must name at least one backend".to_string(),
            ));
        }

        let worker_url = env_string_or("STORAGE_WORKER_URL", "http://localhost:8787");
        let public_url = env_string_or("STORAGE_PUBLIC_URL", &worker_url);
        let s3_bucket = std::env::var("STORAGE_S3_BUCKET")
            .ok()
            .filter(|v| !v.trim().is_empty());
        if backends.contains(&BackendKind::S3) && s3_bucket.is_none() {
            return Err(CoreError::Config(
                "STORAGE_S3_BUCKET must be set when the s3 backend is enabled".to_string(),
            ));
        }

        Ok(Self {
            backends,
            worker_url,
            public_url,
            api_key: env_string_or("STORAGE_API_KEY", ""),
            timeout: env_secs_or("STORAGE_TIMEOUT_SECS", 30)?,
            s3_bucket,
            s3_prefix: env_string_or("STORAGE_S3_PREFIX", "uploads"),
            upload_root: PathBuf::from(env_string_or("UPLOAD_ROOT", "./uploads")),
            preview_retention: env_secs_or("PREVIEW_RETENTION_SECS", 3600)?,
        })
    }

    /// Instantiate the configured backends and wrap them in a gateway.
    pub async fn build_gateway(&self, client: reqwest::Client) -> Result<StorageGateway, StorageError> {
        let mut backends: Vec<Arc<dyn StorageBackend>> = Vec::with_capacity(self.backends.len());

        for kind in &self.backends {
            match kind {
                BackendKind::Gateway => {
                    if self.api_key.is_empty() {
                        tracing::warn!("STORAGE_API_KEY is empty; gateway uploads will be unauthenticated");
                    }
                    backends.push(Arc::new(RemoteGatewayBackend::new(
                        client.clone(),
                        &self.worker_url,
                        &self.public_url,
                        &self.api_key,
                        self.timeout,
                    )));
                }
                BackendKind::S3 => {
                    let bucket = self.s3_bucket.clone().ok_or_else(|| {
                        CoreError::Config("STORAGE_S3_BUCKET must be set".to_string())
                    })?;
                    backends.push(Arc::new(S3Backend::from_env(bucket, &self.s3_prefix).await));
                }
                BackendKind::Local => {
                    let local = LocalBackend::new(&self.upload_root);
                    // Preview deletions scheduled before a restart are lost.
                    match local.sweep(Namespace::Preview, self.preview_retention).await {
                        Ok(0) => {}
                        Ok(removed) => tracing::info!(removed, "Removed stale preview artifacts"),
                        Err(e) => tracing::warn!(error = %e, "Preview sweep failed"),
                    }
                    backends.push(Arc::new(local));
                }
            }
        }

        let gateway = StorageGateway::new(backends, self.preview_retention)?;
        tracing::info!(backends = ?gateway.backend_names(), "Storage gateway ready");
        Ok(gateway)
    }
}
