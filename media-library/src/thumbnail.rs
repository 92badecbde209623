use image::{imageops::FilterType, ImageFormat};
use std::io::Cursor;

/// Error type for thumbnail operations
#[derive(Debug)]
pub enum ThumbnailError {
    ImageLoadError(String),
    ImageSaveError(String),
}

impl std::fmt::Display for ThumbnailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThumbnailError::ImageLoadError(msg) => write!(f, "Image load error: {}", msg),
            ThumbnailError::ImageSaveError(msg) => write!(f, "Image save error: {}", msg),
        }
    }
}

impl std::error::Error for ThumbnailError {}

/// Creates a WebP thumbnail from an encoded image held in memory
///
/// Runs synchronously; callers on the upload path accept the cost so the
/// multipart request can carry the thumbnail alongside the original.
pub fn create_thumbnail(data: &[u8], max_size: u32) -> Result<Vec<u8>, ThumbnailError> {
    let img = image::load_from_memory(data)
        .map_err(|e| ThumbnailError::ImageLoadError(format!("Failed to load image: {}", e)))?;

    let thumb = img.resize(max_size, max_size, FilterType::Lanczos3);

    let mut buffer = Cursor::new(Vec::new());
    thumb.write_to(&mut buffer, ImageFormat::WebP).map_err(|e| {
        ThumbnailError::ImageSaveError(format!("Failed to write thumbnail: {}", e))
    })?;

    log::debug!(
        "Thumbnail created: {}x{} -> {}x{}",
        img.width(),
        img.height(),
        thumb.width(),
        thumb.height()
    );

    Ok(buffer.into_inner())
}

/// Reads the pixel dimensions of an encoded image without a full decode
pub fn image_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

#[cfg(test)]
pub(crate) fn test_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([120, 80, 40]));
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Jpeg).unwrap();
    buffer.into_inner()
}
