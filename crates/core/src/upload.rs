//! Upload validation for sketch sources and image assets.
//!
//! Runs before anything is handed to the storage gateway, which does not
//! re-validate.

use std::io::Cursor;

use crate::error::CoreError;
use crate::naming::file_extension;

/// Accepted sketch source extensions.
pub const SCRIPT_EXTENSIONS: &[&str] = &["pde"];

/// Accepted image upload extensions.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// Maximum sketch source size (1 MiB).
pub const MAX_SCRIPT_BYTES: usize = 1024 * 1024;

/// Maximum image upload size (10 MiB).
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Pixel dimensions read from an image header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

/// Validate a sketch source upload. Empty content is allowed; it produces
/// a failed conversion job rather than a rejected request.
pub fn validate_script_upload(file_name: &str, size: usize) -> Result<String, CoreError> {
    let ext = require_extension(file_name, SCRIPT_EXTENSIONS)?;
    if size > MAX_SCRIPT_BYTES {
        return Err(CoreError::Validation(format!(
            "Sketch source is {size} bytes; the limit is {MAX_SCRIPT_BYTES} bytes"
        )));
    }
    Ok(ext)
}

/// Validate an image upload and read its dimensions from the header.
pub fn validate_image_upload(file_name: &str, data: &[u8]) -> Result<ImageDimensions, CoreError> {
    require_extension(file_name, IMAGE_EXTENSIONS)?;

    if data.is_empty() {
        return Err(CoreError::Validation("Image upload is empty".into()));
    }
    if data.len() > MAX_IMAGE_BYTES {
        return Err(CoreError::Validation(format!(
            "Image is {} bytes; the limit is {MAX_IMAGE_BYTES} bytes",
            data.len()
        )));
    }

    let (width, height) = image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| CoreError::Validation(format!("Unreadable image: {e}")))?
        .into_dimensions()
        .map_err(|e| CoreError::Validation(format!("Unreadable image: {e}")))?;

    Ok(ImageDimensions { width, height })
}

/// Sniff an image's format and dimensions without the file name.
///
/// Returns the canonical extension of the detected format, or `None` when
/// the bytes are not a readable image.
pub fn inspect_image(data: &[u8]) -> Option<(ImageDimensions, &'static str)> {
    let reader = image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()?;
    let ext = reader.format()?.extensions_str().first().copied()?;
    let (width, height) = reader.into_dimensions().ok()?;
    Some((ImageDimensions { width, height }, ext))
}

fn require_extension(file_name: &str, allowed: &[&str]) -> Result<String, CoreError> {
    let ext = file_extension(file_name).unwrap_or_default();
    if allowed.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(CoreError::Validation(format!(
            "Unsupported file type '.{ext}'. Supported: {}",
            allowed.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn script_extension_is_checked() {
        assert_eq!(validate_script_upload("a.PDE", 10).unwrap(), "pde");
        assert!(validate_script_upload("a.js", 10).is_err());
        assert!(validate_script_upload("pde", 10).is_err());
    }

    #[test]
    fn empty_script_is_accepted() {
        assert!(validate_script_upload("empty.pde", 0).is_ok());
    }

    #[test]
    fn oversize_script_is_rejected() {
        assert!(validate_script_upload("big.pde", MAX_SCRIPT_BYTES + 1).is_err());
    }

    #[test]
    fn image_dimensions_are_read() {
        let dims = validate_image_upload("t.png", &tiny_png(4, 3)).unwrap();
        assert_eq!(dims, ImageDimensions { width: 4, height: 3 });
    }

    #[test]
    fn garbage_image_is_rejected() {
        let err = validate_image_upload("t.png", b"definitely not a png").unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn inspect_detects_format() {
        let (dims, ext) = inspect_image(&tiny_png(2, 5)).unwrap();
        assert_eq!(dims, ImageDimensions { width: 2, height: 5 });
        assert_eq!(ext, "png");
        assert!(inspect_image(b"nope").is_none());
    }

    #[test]
    fn image_extension_is_checked() {
        assert!(validate_image_upload("t.bmp", &tiny_png(1, 1)).is_err());
        assert!(validate_image_upload("t.png", &[]).is_err());
    }
}
