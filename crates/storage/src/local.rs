//! Local-disk backend, the last resort in the ranked list.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use sketchbook_core::storage::Namespace;

use crate::backend::StorageBackend;
use crate::error::StorageError;

/// Stores artifacts under `<root>/<namespace>/<file>`.
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_path(&self, namespace: Namespace, file_name: &str) -> PathBuf {
        self.root.join(namespace.as_str()).join(file_name)
    }

    /// Remove files in `namespace` last modified at least `max_age` ago.
    ///
    /// Returns the number of files removed. A missing namespace directory
    /// counts as empty.
    pub async fn sweep(&self, namespace: Namespace, max_age: Duration) -> Result<usize, StorageError> {
        let dir = self.root.join(namespace.as_str());
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let age = metadata.modified()?.elapsed().unwrap_or_default();
            if age >= max_age {
                tokio::fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn put(
        &self,
        namespace: Namespace,
        file_name: &str,
        data: &[u8],
    ) -> Result<Option<String>, StorageError> {
        let dir = self.root.join(namespace.as_str());
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(file_name), data).await?;
        Ok(None)
    }

    async fn get(&self, namespace: Namespace, file_name: &str) -> Result<Vec<u8>, StorageError> {
        tokio::fs::read(self.file_path(namespace, file_name))
            .await
            .map_err(|e| not_found_or_io(e, namespace, file_name))
    }

    async fn delete(&self, namespace: Namespace, file_name: &str) -> Result<(), StorageError> {
        tokio::fs::remove_file(self.file_path(namespace, file_name))
            .await
            .map_err(|e| not_found_or_io(e, namespace, file_name))
    }
}

fn not_found_or_io(err: std::io::Error, namespace: Namespace, file_name: &str) -> StorageError {
    if err.kind() == ErrorKind::NotFound {
        StorageError::NotFound(format!("{namespace}/{file_name}"))
    } else {
        StorageError::Io(err)
    }
}
