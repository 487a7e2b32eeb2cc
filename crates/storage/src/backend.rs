//! The storage backend abstraction.

use async_trait::async_trait;
use sketchbook_core::naming::file_extension;
use sketchbook_core::storage::Namespace;

use crate::error::StorageError;

/// One place artifacts can be written to and read back from.
///
/// Implementations address files by namespace and file name only; the
/// public `/uploads/<namespace>/<file>` path is built by the gateway so
/// every backend yields the same shape.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short identifier used in logs and in [`crate::StoredArtifact`].
    fn name(&self) -> &'static str;

    /// Write `data`, returning a public URL when the backend has one.
    async fn put(
        &self,
        namespace: Namespace,
        file_name: &str,
        data: &[u8],
    ) -> Result<Option<String>, StorageError>;

    async fn get(&self, namespace: Namespace, file_name: &str) -> Result<Vec<u8>, StorageError>;

    async fn delete(&self, namespace: Namespace, file_name: &str) -> Result<(), StorageError>;
}

/// MIME type sent alongside uploads.
pub fn content_type_for(file_name: &str) -> &'static str {
    match file_extension(file_name).as_deref() {
        Some("pde") => "text/plain; charset=utf-8",
        Some("js") => "application/javascript",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}
