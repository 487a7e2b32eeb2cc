//! Artifact namespaces and the public path shape shared by all storage
//! backends.
//!
//! Every stored artifact is addressed as `/uploads/<namespace>/<file>`
//! regardless of which backend holds it.

use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// URL prefix under which every artifact path lives.
pub const URL_PREFIX: &str = "/uploads";

/// Logical folder an artifact is stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Raw user uploads (sketch sources, original images).
    Original,
    /// Short-lived preview output, deleted after the retention window.
    Preview,
    /// Converted browser-executable scripts.
    Js,
    /// Compressed derived images.
    Thumbnail,
}

impl Namespace {
    pub const ALL: [Namespace; 4] = [
        Namespace::Original,
        Namespace::Preview,
        Namespace::Js,
        Namespace::Thumbnail,
    ];

    /// Folder / multipart `type` value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Preview => "preview",
            Self::Js => "js",
            Self::Thumbnail => "thumbnail",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ns| ns.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown storage namespace '{s}'")))
    }
}

/// Build the public path for a stored file.
pub fn artifact_path(namespace: Namespace, file_name: &str) -> String {
    format!("{URL_PREFIX}/{namespace}/{file_name}")
}

/// Split an artifact path back into its namespace and file name.
///
/// Rejects anything that is not exactly `/uploads/<namespace>/<file>` or
/// whose file component could escape the namespace folder.
pub fn parse_artifact_path(path: &str) -> Result<(Namespace, &str), CoreError> {
    let invalid = || CoreError::Validation(format!("Invalid artifact path '{path}'"));

    let rest = path
        .strip_prefix(URL_PREFIX)
        .and_then(|r| r.strip_prefix('/'))
        .ok_or_else(invalid)?;
    let (namespace, file_name) = rest.split_once('/').ok_or_else(invalid)?;

    if file_name.is_empty()
        || file_name.contains('/')
        || file_name.contains('\\')
        || file_name.starts_with('.')
    {
        return Err(invalid());
    }

    Ok((namespace.parse()?, file_name))
}
