//! Ranked-fallback storage gateway.
//!
//! [`StorageGateway::store`] tries each backend in order and returns the
//! first success. A failure of every backend is the only error a caller
//! sees; per-backend failures are logged and counted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use sketchbook_core::storage::{artifact_path, parse_artifact_path, Namespace};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::backend::StorageBackend;
use crate::error::StorageError;

/// Result of a successful [`StorageGateway::store`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredArtifact {
    /// Public path, always `/uploads/<namespace>/<file>`.
    pub path: String,
    /// Absolute URL when the serving backend reported one.
    pub public_url: Option<String>,
    /// Name of the backend that accepted the write.
    pub backend: &'static str,
    /// `true` when a higher-ranked backend failed first.
    pub fallback: bool,
}

/// Counters over the gateway's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    pub primary: u64,
    pub fallback: u64,
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    primary: AtomicU64,
    fallback: AtomicU64,
    failed: AtomicU64,
}

type Backends = Arc<[Arc<dyn StorageBackend>]>;

pub struct StorageGateway {
    backends: Backends,
    counters: Counters,
    preview_retention: Duration,
    cleanup: TaskTracker,
    cancel: CancellationToken,
}

impl std::fmt::Debug for StorageGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageGateway")
            .field(
                "backends",
                &self.backends.iter().map(|b| b.name()).collect::<Vec<_>>(),
            )
            .field("preview_retention", &self.preview_retention)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

impl StorageGateway {
    /// Build a gateway over `backends`, highest priority first.
    pub fn new(
        backends: Vec<Arc<dyn StorageBackend>>,
        preview_retention: Duration,
    ) -> Result<Self, StorageError> {
        if backends.is_empty() {
            return Err(StorageError::NoBackends);
        }
        Ok(Self {
            backends: backends.into(),
            counters: Counters::default(),
            preview_retention,
            cleanup: TaskTracker::new(),
            cancel: CancellationToken::new(),
        })
    }

    pub fn backend_names(&self) -> Vec<&'static str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    pub fn stats(&self) -> StorageStats {
        StorageStats {
            primary: self.counters.primary.load(Ordering::Relaxed),
            fallback: self.counters.fallback.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Number of ephemeral artifacts still awaiting cleanup.
    pub fn pending_cleanups(&self) -> usize {
        self.cleanup.len()
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

impl StorageGateway {
    /// Persist `data` as `file_name` under `namespace`.
    pub async fn store(
        &self,
        data: &[u8],
        file_name: &str,
        namespace: Namespace,
    ) -> Result<StoredArtifact, StorageError> {
        let path = artifact_path(namespace, file_name);
        // Reject names that would not round-trip through the public path.
        parse_artifact_path(&path)?;

        let mut last_err: Option<StorageError> = None;

        for (rank, backend) in self.backends.iter().enumerate() {
            match backend.put(namespace, file_name, data).await {
                Ok(public_url) => {
                    let fallback = rank > 0;
                    if fallback {
                        self.counters.fallback.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(
                            backend = backend.name(),
                            path = %path,
                            "Artifact stored on fallback backend"
                        );
                    } else {
                        self.counters.primary.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!(backend = backend.name(), path = %path, "Artifact stored");
                    }
                    return Ok(StoredArtifact {
                        path,
                        public_url,
                        backend: backend.name(),
                        fallback,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        backend = backend.name(),
                        path = %path,
                        error = %e,
                        "Storage backend failed, trying next"
                    );
                    last_err = Some(e);
                }
            }
        }

        self.counters.failed.fetch_add(1, Ordering::Relaxed);
        let message = last_err.map(|e| e.to_string()).unwrap_or_default();
        tracing::error!(path = %path, error = %message, "All storage backends failed");
        Err(StorageError::AllBackendsFailed(message))
    }

    /// Read back an artifact by its public path, trying backends in order.
    pub async fn fetch(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let (namespace, file_name) = parse_artifact_path(path)?;
        let mut last_err: Option<StorageError> = None;

        for backend in self.backends.iter() {
            match backend.get(namespace, file_name).await {
                Ok(data) => return Ok(data),
                Err(StorageError::NotFound(_)) => {}
                Err(e) => {
                    tracing::debug!(backend = backend.name(), path, error = %e, "Fetch failed");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| StorageError::NotFound(path.to_string())))
    }

    /// Best-effort removal from every backend. Never fails.
    pub async fn delete(&self, path: &str) {
        match parse_artifact_path(path) {
            Ok((namespace, file_name)) => {
                delete_everywhere(&self.backends, namespace, file_name).await;
            }
            Err(e) => tracing::warn!(path, error = %e, "Refusing to delete invalid artifact path"),
        }
    }

    /// Store a short-lived artifact and schedule its deletion after the
    /// preview retention period.
    ///
    /// Cleanup runs on a tracked task detached from the caller. On
    /// [`shutdown`](Self::shutdown) pending cleanups run immediately.
    pub async fn store_ephemeral(
        &self,
        data: &[u8],
        file_name: &str,
        namespace: Namespace,
    ) -> Result<StoredArtifact, StorageError> {
        let stored = self.store(data, file_name, namespace).await?;

        let backends = Arc::clone(&self.backends);
        let cancel = self.cancel.clone();
        let retention = self.preview_retention;
        let file_name = file_name.to_string();
        self.cleanup.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(retention) => {}
            }
            delete_everywhere(&backends, namespace, &file_name).await;
        });

        Ok(stored)
    }

    /// Run outstanding cleanups now and wait up to `timeout` for them.
    pub async fn shutdown(&self, timeout: Duration) {
        self.cleanup.close();
        self.cancel.cancel();
        if tokio::time::timeout(timeout, self.cleanup.wait()).await.is_err() {
            tracing::warn!(
                remaining = self.cleanup.len(),
                "Storage cleanup did not finish before shutdown timeout"
            );
        }
    }
}

async fn delete_everywhere(backends: &Backends, namespace: Namespace, file_name: &str) {
    for backend in backends.iter() {
        match backend.delete(namespace, file_name).await {
            Ok(()) => {
                tracing::debug!(backend = backend.name(), %namespace, file_name, "Artifact deleted")
            }
            Err(StorageError::NotFound(_)) => {}
            Err(e) => tracing::warn!(
                backend = backend.name(),
                %namespace,
                file_name,
                error = %e,
                "Artifact deletion failed"
            ),
        }
    }
}
