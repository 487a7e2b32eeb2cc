//! REST client for the conversion function.
//!
//! Both endpoints answer `{success, message, <output>}`. A transport
//! failure, a non-2xx status, `success=false`, missing output or an
//! undecodable body all surface as [`ConverterError`].

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::config::ConverterConfig;
use crate::messages::{
    ConvertedImage, ConvertedScript, ImageConversionRequest, ImageConversionResponse,
    ScriptConversionRequest, ScriptConversionResponse,
};

/// Message recorded when the function declines without saying why.
const DEFAULT_DECLINE_MESSAGE: &str = "Conversion failed";

/// HTTP client for the conversion function.
#[derive(Clone)]
pub struct ConversionApi {
    client: reqwest::Client,
    script_url: String,
    image_url: String,
}

/// Errors from the conversion function layer.
#[derive(Debug, thiserror::Error)]
pub enum ConverterError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("Conversion request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The function returned a non-2xx status code.
    #[error("Conversion function error ({status}): {body}")]
    Status { status: u16, body: String },

    /// The function answered `success: false`. The message is kept verbatim.
    #[error("{0}")]
    Declined(String),

    /// `success: true` without any derived content.
    #[error("Conversion returned no output")]
    EmptyOutput,

    /// The body was not the expected JSON, or the output did not decode.
    #[error("Malformed conversion response: {0}")]
    Malformed(String),
}

impl ConverterError {
    /// Whether repeating the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            Self::Declined(_) | Self::EmptyOutput | Self::Malformed(_) => false,
        }
    }
}

impl ConversionApi {
    /// Create a client with its own timeout-configured [`reqwest::Client`].
    pub fn new(config: &ConverterConfig) -> Result<Self, ConverterError> {
        Ok(Self::with_client(config.build_client()?, config))
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: &ConverterConfig) -> Self {
        Self {
            client,
            script_url: config.script_url.clone(),
            image_url: config.image_url.clone(),
        }
    }

    /// Convert a sketch source into a browser script.
    pub async fn convert_script(
        &self,
        request: &ScriptConversionRequest,
    ) -> Result<ConvertedScript, ConverterError> {
        tracing::debug!(
            processing_id = request.processing_id,
            file_name = %request.file_name,
            is_preview = request.is_preview,
            "Requesting script conversion"
        );

        let response = self.client.post(&self.script_url).json(request).send().await?;
        let body: ScriptConversionResponse = Self::parse_response(response).await?;

        if !body.success {
            return Err(Self::declined(body.message));
        }
        match body.js_content {
            Some(js_content) if !js_content.trim().is_empty() => Ok(ConvertedScript {
                js_content,
                message: body.message,
            }),
            _ => Err(ConverterError::EmptyOutput),
        }
    }

    /// Convert an image into a compressed derivative.
    pub async fn convert_image(
        &self,
        request: &ImageConversionRequest,
    ) -> Result<ConvertedImage, ConverterError> {
        tracing::debug!(
            processing_id = request.processing_id,
            file_name = %request.file_name,
            "Requesting image conversion"
        );

        let response = self.client.post(&self.image_url).json(request).send().await?;
        let body: ImageConversionResponse = Self::parse_response(response).await?;

        if !body.success {
            return Err(Self::declined(body.message));
        }
        let encoded = match body.image_derived_data.as_deref().map(str::trim) {
            Some(data) if !data.is_empty() => data,
            _ => return Err(ConverterError::EmptyOutput),
        };
        let data = BASE64
            .decode(encoded)
            .map_err(|e| ConverterError::Malformed(format!("imageDerivedData: {e}")))?;

        Ok(ConvertedImage {
            data,
            message: body.message,
            original_size: body.original_size,
            derived_size: body.derived_size,
            compression_ratio: body.compression_ratio,
            width: body.width,
            height: body.height,
        })
    }

    // ---- private helpers ----

    fn declined(message: Option<String>) -> ConverterError {
        ConverterError::Declined(
            message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_DECLINE_MESSAGE.to_string()),
        )
    }

    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ConverterError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ConverterError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ConverterError> {
        let response = Self::ensure_success(response).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ConverterError::Malformed(e.to_string()))
    }
}

/// Base64-encode raw image bytes for [`ImageConversionRequest::image_data`].
pub fn encode_image(data: &[u8]) -> String {
    BASE64.encode(data)
}
