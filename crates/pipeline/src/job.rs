//! Job identity shared by the invoker, the supervisor and the drainer.

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sketchbook_core::error::CoreError;
use sketchbook_core::types::DbId;

use crate::error::PipelineError;

/// Which job table a job lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Script,
    Image,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Image => "image",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "script" => Ok(Self::Script),
            "image" => Ok(Self::Image),
            other => Err(CoreError::Validation(format!(
                "Unknown job kind '{other}' (expected script or image)"
            ))),
        }
    }
}

/// A job id qualified by its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct JobRef {
    pub kind: JobKind,
    pub id: DbId,
}

impl JobRef {
    pub fn script(id: DbId) -> Self {
        Self {
            kind: JobKind::Script,
            id,
        }
    }

    pub fn image(id: DbId) -> Self {
        Self {
            kind: JobKind::Image,
            id,
        }
    }
}

impl fmt::Display for JobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} job {}", self.kind, self.id)
    }
}

/// Runs one more conversion attempt for an existing job.
///
/// Implemented by [`crate::ConversionInvoker`]; the retry supervisor and the
/// batch drainer only depend on this trait.
pub trait Reconverter: Send + Sync {
    fn reconvert(&self, job: JobRef) -> impl Future<Output = Result<(), PipelineError>> + Send;
}
