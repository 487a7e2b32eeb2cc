//! Remote object-store gateway backend.
//!
//! Uploads are multipart POSTs to `<worker_url>/upload` carrying the parts
//! `file`, `type` (the namespace) and `fileName`, authenticated with an
//! `X-API-Key` header. The worker answers
//! `{"success": bool, "url"?: string, "error"?: string}`. Stored artifacts
//! are served publicly at `<public_url>/<namespace>/<file>`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;
use sketchbook_core::storage::Namespace;

use crate::backend::{content_type_for, StorageBackend};
use crate::error::StorageError;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    success: bool,
    url: Option<String>,
    error: Option<String>,
}

pub struct RemoteGatewayBackend {
    client: reqwest::Client,
    worker_url: String,
    public_url: String,
    api_key: String,
    timeout: Duration,
}

impl RemoteGatewayBackend {
    pub fn new(
        client: reqwest::Client,
        worker_url: impl Into<String>,
        public_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            worker_url: worker_url.into().trim_end_matches('/').to_string(),
            public_url: public_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout,
        }
    }

    fn public_file_url(&self, namespace: Namespace, file_name: &str) -> String {
        format!("{}/{namespace}/{file_name}", self.public_url)
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, StorageError> {
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl StorageBackend for RemoteGatewayBackend {
    fn name(&self) -> &'static str {
        "gateway"
    }

    async fn put(
        &self,
        namespace: Namespace,
        file_name: &str,
        data: &[u8],
    ) -> Result<Option<String>, StorageError> {
        let part = Part::bytes(data.to_vec())
            .file_name(file_name.to_string())
            .mime_str(content_type_for(file_name))?;
        let form = Form::new()
            .part("file", part)
            .text("type", namespace.as_str())
            .text("fileName", file_name.to_string());

        let response = self
            .client
            .post(format!("{}/upload", self.worker_url))
            .header("X-API-Key", &self.api_key)
            .timeout(self.timeout)
            .multipart(form)
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;

        let text = response.text().await?;
        let body: UploadResponse =
            serde_json::from_str(&text).map_err(|e| StorageError::Malformed(e.to_string()))?;
        if !body.success {
            return Err(StorageError::Rejected(
                body.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        Ok(Some(
            body.url
                .unwrap_or_else(|| self.public_file_url(namespace, file_name)),
        ))
    }

    async fn get(&self, namespace: Namespace, file_name: &str) -> Result<Vec<u8>, StorageError> {
        let response = self
            .client
            .get(self.public_file_url(namespace, file_name))
            .timeout(self.timeout)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(format!("{namespace}/{file_name}")));
        }
        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Deletion goes to `DELETE <worker_url>/<namespace>/<file>`.
    async fn delete(&self, namespace: Namespace, file_name: &str) -> Result<(), StorageError> {
        let response = self
            .client
            .delete(format!("{}/{namespace}/{file_name}", self.worker_url))
            .header("X-API-Key", &self.api_key)
            .timeout(self.timeout)
            .send()
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(StorageError::NotFound(format!("{namespace}/{file_name}"))),
            s if s.is_success() => Ok(()),
            s => Err(StorageError::Status {
                status: s.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }
}
