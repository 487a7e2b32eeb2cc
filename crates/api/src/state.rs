use std::sync::Arc;

use sketchbook_pipeline::{ConversionInvoker, RetrySupervisor};
use sketchbook_storage::StorageGateway;
use tokio_util::task::TaskTracker;

use crate::config::ServerConfig;

/// Shared application state available to all handlers via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: sqlx::PgPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Runs synchronous conversion attempts.
    pub invoker: Arc<ConversionInvoker>,
    /// Out-of-band retries for attempts that failed transiently.
    pub supervisor: Arc<RetrySupervisor>,
    /// Artifact storage, shared with the invoker.
    pub storage: Arc<StorageGateway>,
    /// Synchronous conversion attempts started by requests. Drained on shutdown.
    pub attempts: TaskTracker,
}
