//! Upload extractors.
//!
//! Sketch sources arrive either as a multipart `file` part or as a JSON
//! body; images only as multipart.

use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use axum::Json;
use serde::Deserialize;
use sketchbook_core::error::CoreError;

use crate::error::AppError;

/// Name of the multipart part carrying the uploaded file.
pub const FILE_FIELD: &str = "file";

/// The `file` part of a multipart upload.
#[derive(Debug)]
pub struct FileUpload {
    pub file_name: String,
    pub data: Vec<u8>,
}

impl<S: Send + Sync> FromRequest<S> for FileUpload {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?
        {
            if field.name() != Some(FILE_FIELD) {
                continue;
            }
            let file_name = field.file_name().unwrap_or_default().to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            return Ok(Self {
                file_name,
                data: data.to_vec(),
            });
        }

        Err(AppError::BadRequest(format!(
            "Missing multipart field '{FILE_FIELD}'"
        )))
    }
}

/// A sketch source, from either body shape.
#[derive(Debug)]
pub struct SketchUpload {
    pub file_name: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct SketchBody {
    file_name: String,
    #[serde(default)]
    content: String,
}

impl<S: Send + Sync> FromRequest<S> for SketchUpload {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_multipart(&req) {
            let upload = FileUpload::from_request(req, state).await?;
            let content = String::from_utf8(upload.data).map_err(|_| {
                CoreError::Validation("Sketch source must be UTF-8 text".to_string())
            })?;
            return Ok(Self {
                file_name: upload.file_name,
                content,
            });
        }

        let Json(body) = Json::<SketchBody>::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        Ok(Self {
            file_name: body.file_name,
            content: body.content,
        })
    }
}

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"))
}
