//! S3 backend, used when the deployment talks to the bucket directly.

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use sketchbook_core::storage::Namespace;

use crate::backend::{content_type_for, StorageBackend};
use crate::error::StorageError;

/// Objects live at `<prefix>/<namespace>/<file>` in `bucket`.
pub struct S3Backend {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: String,
}

impl S3Backend {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into().trim_matches('/').to_string(),
        }
    }

    /// Build a client from the ambient AWS configuration (env, profile, IMDS).
    pub async fn from_env(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        let config = aws_config::load_from_env().await;
        Self::new(aws_sdk_s3::Client::new(&config), bucket, prefix)
    }

    fn key(&self, namespace: Namespace, file_name: &str) -> String {
        if self.prefix.is_empty() {
            format!("{namespace}/{file_name}")
        } else {
            format!("{}/{namespace}/{file_name}", self.prefix)
        }
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn put(
        &self,
        namespace: Namespace,
        file_name: &str,
        data: &[u8],
    ) -> Result<Option<String>, StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.key(namespace, file_name))
            .content_type(content_type_for(file_name))
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|e| StorageError::S3(DisplayErrorContext(&e).to_string()))?;
        Ok(None)
    }

    async fn get(&self, namespace: Namespace, file_name: &str) -> Result<Vec<u8>, StorageError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.key(namespace, file_name))
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    StorageError::NotFound(format!("{namespace}/{file_name}"))
                } else {
                    StorageError::S3(DisplayErrorContext(&e).to_string())
                }
            })?;
        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::S3(e.to_string()))?;
        Ok(bytes.into_bytes().to_vec())
    }

    async fn delete(&self, namespace: Namespace, file_name: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(self.key(namespace, file_name))
            .send()
            .await
            .map_err(|e| StorageError::S3(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }
}
