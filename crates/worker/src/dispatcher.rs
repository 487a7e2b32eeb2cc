//! Threshold-gated batch signalling.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sketchbook_db::repositories::{ImageJobRepo, ScriptJobRepo};
use sketchbook_db::DbPool;

use crate::queue::{MessageQueue, QueueError};

/// Message `kind` understood by the batch consumer.
pub const BATCH_MESSAGE_KIND: &str = "batch_conversion";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Failed to count pending jobs: {0}")]
    Count(#[from] sqlx::Error),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("Failed to encode batch message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Body of the published message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchMessage {
    pub kind: &'static str,
    pub batch_size: u32,
    pub timestamp: DateTime<Utc>,
}

impl BatchMessage {
    pub fn new(batch_size: u32) -> Self {
        Self {
            kind: BATCH_MESSAGE_KIND,
            batch_size,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOptions {
    pub batch_size: u32,
    pub threshold: i64,
    /// Publish even when the backlog is below `threshold`.
    pub force: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            batch_size: 20,
            threshold: 100,
            force: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Backlog below threshold and not forced. Not an error.
    Skipped { pending: i64, threshold: i64 },
    Published { pending: i64, message_id: String },
}

/// Something that can report the size of the pending backlog.
pub trait PendingSource: Send + Sync {
    fn count_pending(&self) -> impl Future<Output = Result<i64, sqlx::Error>> + Send;
}

/// Pending script and image jobs in the Job Store.
pub struct JobStorePending {
    pool: DbPool,
}

impl JobStorePending {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl PendingSource for JobStorePending {
    async fn count_pending(&self) -> Result<i64, sqlx::Error> {
        requeue_expired(&self.pool).await?;
        let scripts = ScriptJobRepo::count_pending(&self.pool).await?;
        let images = ImageJobRepo::count_pending(&self.pool).await?;
        Ok(scripts + images)
    }
}

/// Abandoned attempts count towards the backlog once their lease lapses.
async fn requeue_expired(pool: &DbPool) -> Result<(), sqlx::Error> {
    let requeued =
        ScriptJobRepo::requeue_expired(pool).await? + ImageJobRepo::requeue_expired(pool).await?;
    if requeued > 0 {
        tracing::info!(requeued, "Requeued jobs with expired leases");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

pub struct BatchDispatcher<S, Q> {
    source: S,
    queue: Q,
}

impl<S: PendingSource, Q: MessageQueue> BatchDispatcher<S, Q> {
    pub fn new(source: S, queue: Q) -> Self {
        Self { source, queue }
    }

    /// Count the backlog and publish at most one batch message.
    pub async fn dispatch(&self, options: &DispatchOptions) -> Result<DispatchOutcome, DispatchError> {
        let pending = self.source.count_pending().await?;

        if pending < options.threshold && !options.force {
            tracing::info!(
                pending,
                threshold = options.threshold,
                "Pending backlog below threshold, skipping batch"
            );
            return Ok(DispatchOutcome::Skipped {
                pending,
                threshold: options.threshold,
            });
        }

        let body = serde_json::to_string(&BatchMessage::new(options.batch_size))?;
        let message_id = self.queue.send(body).await?;
        tracing::info!(
            pending,
            batch_size = options.batch_size,
            forced = options.force,
            message_id = %message_id,
            "Batch conversion message published"
        );

        Ok(DispatchOutcome::Published {
            pending,
            message_id,
        })
    }
}
