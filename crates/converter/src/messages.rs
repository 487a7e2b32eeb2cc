//! JSON bodies exchanged with the conversion function.
//!
//! Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

/// `POST <script_url>` body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptConversionRequest {
    /// Job id, or `0` for previews.
    pub processing_id: i64,
    pub pde_content: String,
    pub file_name: String,
    pub original_name: String,
    pub canvas_id: String,
    pub is_preview: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptConversionResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub js_content: Option<String>,
}

/// `POST <image_url>` body. `image_data` is base64.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageConversionRequest {
    pub processing_id: i64,
    pub image_data: String,
    pub file_name: String,
    pub original_name: String,
    pub canvas_id: String,
    pub is_preview: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageConversionResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    /// Base64 of the compressed image.
    #[serde(default)]
    pub image_derived_data: Option<String>,
    #[serde(default)]
    pub original_size: Option<i64>,
    #[serde(default)]
    pub derived_size: Option<i64>,
    #[serde(default)]
    pub compression_ratio: Option<f64>,
    #[serde(default)]
    pub width: Option<i32>,
    #[serde(default)]
    pub height: Option<i32>,
}

/// A successful script conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedScript {
    pub js_content: String,
    pub message: Option<String>,
}

/// A successful image conversion with decoded bytes.
///
/// Metrics the function did not report are left as `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedImage {
    pub data: Vec<u8>,
    pub message: Option<String>,
    pub original_size: Option<i64>,
    pub derived_size: Option<i64>,
    pub compression_ratio: Option<f64>,
    pub width: Option<i32>,
    pub height: Option<i32>,
}
