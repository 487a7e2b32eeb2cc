//! Conversion job pipeline.
//!
//! - [`invoker::ConversionInvoker`] runs one conversion attempt for a job:
//!   claim, hydrate, call the conversion function, store the artifact and
//!   record the outcome.
//! - [`retry::RetrySupervisor`] re-runs failed attempts out of band on a
//!   bounded, observable task queue.
//! - [`drain::BatchDrainer`] works through the pending backlog oldest-first.

pub mod config;
pub mod drain;
pub mod error;
pub mod invoker;
pub mod job;
pub mod retry;

pub use config::PipelineConfig;
pub use drain::{BatchDrainer, DrainReport};
pub use error::PipelineError;
pub use invoker::{ConversionInvoker, PreviewArtifact};
pub use job::{JobKind, JobRef, Reconverter};
pub use retry::{RetryConfig, RetryStats, RetrySupervisor, ScheduleError};
