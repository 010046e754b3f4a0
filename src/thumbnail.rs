//! JPEG + base64 encoding of favourite thumbnails.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageFormat, RgbImage};

use crate::error::{CycleMapError, Result};

/// Decoded thumbnail pixels.
pub type Thumbnail = RgbImage;

/// Fixed JPEG quality for stored thumbnails.
pub const THUMBNAIL_QUALITY: u8 = 90;

/// Compress `image` to JPEG and return it base64-encoded.
pub fn encode(image: &Thumbnail) -> Result<String> {
    if image.width() == 0 || image.height() == 0 {
        return Err(CycleMapError::EncodingFailure {
            message: format!("empty image {}x{}", image.width(), image.height()),
        });
    }

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, THUMBNAIL_QUALITY)
        .encode(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| CycleMapError::EncodingFailure {
            message: e.to_string(),
        })?;

    Ok(STANDARD.encode(jpeg))
}

/// Inverse of [`encode`]. Line breaks and other whitespace inside the
/// encoded value are ignored; older entries were wrapped at 76 columns.
pub fn decode(encoded: &str) -> Result<Thumbnail> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD.decode(compact)?;
    let image = image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg).map_err(|e| {
        CycleMapError::ThumbnailDecode {
            message: e.to_string(),
        }
    })?;
    Ok(image.to_rgb8())
}
