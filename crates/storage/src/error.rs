use sketchbook_core::error::CoreError;

/// Errors from a single storage backend or from the gateway as a whole.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote gateway answered with a non-200 status.
    #[error("Storage gateway error ({status}): {body}")]
    Status { status: u16, body: String },

    /// The remote gateway answered 200 but reported `success: false`.
    #[error("Storage gateway rejected upload: {0}")]
    Rejected(String),

    /// The response body could not be parsed.
    #[error("Malformed storage gateway response: {0}")]
    Malformed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("S3 error: {0}")]
    S3(String),

    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    InvalidPath(#[from] CoreError),

    /// Every configured backend failed; carries the last backend's error.
    #[error("All storage backends failed, last error: {0}")]
    AllBackendsFailed(String),

    #[error("No storage backends configured")]
    NoBackends,
}
