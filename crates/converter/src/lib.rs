//! HTTP client for the external conversion function.
//!
//! The function turns sketch sources into browser scripts and images into
//! compressed derivatives. This crate owns the wire format and the
//! classification of failures into retryable and permanent ones.

pub mod api;
pub mod config;
pub mod messages;

pub use api::{encode_image, ConversionApi, ConverterError};
pub use config::ConverterConfig;
pub use messages::{
    ConvertedImage, ConvertedScript, ImageConversionRequest, ImageConversionResponse,
    ScriptConversionRequest, ScriptConversionResponse,
};
