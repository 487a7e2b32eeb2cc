//! Batch Dispatcher.
//!
//! Counts the pending backlog and, when it crosses a threshold (or the run
//! is forced), publishes one coarse "run a batch" message. The message
//! names no jobs; the consumer re-reads the backlog when it drains.

pub mod config;
pub mod dispatcher;
pub mod queue;

pub use config::WorkerConfig;
pub use dispatcher::{
    BatchDispatcher, BatchMessage, DispatchError, DispatchOptions, DispatchOutcome, JobStorePending,
    PendingSource,
};
pub use queue::{MessageQueue, QueueError, SqsQueue};
