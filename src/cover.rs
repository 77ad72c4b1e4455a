//! Cover image validation and normalization.
//!
//! Kindle-class readers want an RGB JPEG or PNG within a sane dimension
//! envelope. The processor decodes the supplied bytes, normalizes the color
//! mode (alpha flattened against white, everything converted to 8-bit RGB),
//! enforces the dimension and size bounds, and re-encodes in the source
//! format. Bytes that are already 8-bit RGB pass through untouched, so a
//! well-prepared JPEG is never recompressed.

use std::io::Cursor;

use image::{ColorType, DynamicImage, ImageFormat, RgbImage};
use thiserror::Error;
use tracing::debug;

/// Maximum accepted encoded size for a cover image.
pub const MAX_COVER_BYTES: usize = 5 * 1024 * 1024;
/// Minimum accepted pixel dimensions (width, height).
pub const MIN_COVER_DIMENSIONS: (u32, u32) = (400, 600);
/// Maximum accepted pixel dimensions (width, height).
pub const MAX_COVER_DIMENSIONS: (u32, u32) = (3000, 4000);

/// Why a supplied cover image was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoverError {
    #[error("unsupported image format (JPEG and PNG are accepted)")]
    UnsupportedFormat,

    #[error(
        "image too small: {width}x{height} px (minimum {}x{})",
        MIN_COVER_DIMENSIONS.0,
        MIN_COVER_DIMENSIONS.1
    )]
    TooSmall { width: u32, height: u32 },

    #[error(
        "image too large: {width}x{height} px (maximum {}x{})",
        MAX_COVER_DIMENSIONS.0,
        MAX_COVER_DIMENSIONS.1
    )]
    TooLarge { width: u32, height: u32 },

    #[error("image file exceeds {} MB", MAX_COVER_BYTES / 1024 / 1024)]
    FileTooLarge { size: usize },
}

/// A packageable cover: normalized bytes plus the facts the assembler and
/// validator need.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverAsset {
    pub data: Vec<u8>,
    pub media_type: &'static str,
    pub width: u32,
    pub height: u32,
}

impl CoverAsset {
    /// Filename of the cover inside the package.
    pub fn filename(&self) -> &'static str {
        match self.media_type {
            "image/png" => "cover.png",
            _ => "cover.jpg",
        }
    }
}

/// Validate and normalize raw image bytes into a [`CoverAsset`].
///
/// Absence of a cover is handled by the caller (it is always valid and only
/// costs a validator warning); this function deals with bytes that were
/// actually supplied.
pub fn process_cover(bytes: &[u8]) -> Result<CoverAsset, CoverError> {
    if bytes.len() > MAX_COVER_BYTES {
        return Err(CoverError::FileTooLarge { size: bytes.len() });
    }

    let format = match image::guess_format(bytes) {
        Ok(f @ (ImageFormat::Jpeg | ImageFormat::Png)) => f,
        _ => return Err(CoverError::UnsupportedFormat),
    };

    let decoded = image::load_from_memory_with_format(bytes, format)
        .map_err(|_| CoverError::UnsupportedFormat)?;

    let (width, height) = (decoded.width(), decoded.height());
    if width < MIN_COVER_DIMENSIONS.0 || height < MIN_COVER_DIMENSIONS.1 {
        return Err(CoverError::TooSmall { width, height });
    }
    if width > MAX_COVER_DIMENSIONS.0 || height > MAX_COVER_DIMENSIONS.1 {
        return Err(CoverError::TooLarge { width, height });
    }

    let media_type = match format {
        ImageFormat::Png => "image/png",
        _ => "image/jpeg",
    };

    // Already 8-bit RGB: the supplied bytes are packageable as-is.
    if decoded.color() == ColorType::Rgb8 {
        return Ok(CoverAsset {
            data: bytes.to_vec(),
            media_type,
            width,
            height,
        });
    }

    debug!(?format, color = ?decoded.color(), "normalizing cover color mode");
    let rgb = flatten_to_rgb(&decoded);
    let data = encode(rgb, format).map_err(|_| CoverError::UnsupportedFormat)?;

    Ok(CoverAsset {
        data,
        media_type,
        width,
        height,
    })
}

/// Convert any decoded color mode to 8-bit RGB, compositing alpha against a
/// white background.
fn flatten_to_rgb(decoded: &DynamicImage) -> RgbImage {
    if !decoded.color().has_alpha() {
        return decoded.to_rgb8();
    }

    let rgba = decoded.to_rgba8();
    let mut rgb = RgbImage::new(rgba.width(), rgba.height());
    for (out, px) in rgb.pixels_mut().zip(rgba.pixels()) {
        let alpha = px.0[3] as u32;
        for i in 0..3 {
            let channel = px.0[i] as u32;
            out.0[i] = ((channel * alpha + 255 * (255 - alpha)) / 255) as u8;
        }
    }
    rgb
}

fn encode(rgb: RgbImage, format: ImageFormat) -> image::ImageResult<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    match format {
        ImageFormat::Png => DynamicImage::ImageRgb8(rgb).write_to(&mut buf, ImageFormat::Png)?,
        _ => {
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, 90);
            rgb.write_with_encoder(encoder)?;
        }
    }
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32, color: image::Rgba<u8>) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, color);
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30]));
        let mut buf = Cursor::new(Vec::new());
        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, 85);
        img.write_with_encoder(encoder).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_rgba_png_flattened_to_rgb() {
        let bytes = png_bytes(800, 1200, image::Rgba([255, 0, 0, 255]));
        let asset = process_cover(&bytes).unwrap();
        assert_eq!(asset.media_type, "image/png");
        assert_eq!((asset.width, asset.height), (800, 1200));

        let reloaded = image::load_from_memory(&asset.data).unwrap();
        assert_eq!(reloaded.color(), ColorType::Rgb8);
    }

    #[test]
    fn test_transparent_pixels_composite_to_white() {
        let bytes = png_bytes(800, 1200, image::Rgba([0, 0, 0, 0]));
        let asset = process_cover(&bytes).unwrap();
        let reloaded = image::load_from_memory(&asset.data).unwrap().to_rgb8();
        assert_eq!(reloaded.get_pixel(0, 0).0, [255, 255, 255]);
    }

    #[test]
    fn test_rgb_jpeg_passes_through_unchanged() {
        let bytes = jpeg_bytes(800, 1200);
        let asset = process_cover(&bytes).unwrap();
        assert_eq!(asset.media_type, "image/jpeg");
        assert_eq!(asset.data, bytes);
    }

    #[test]
    fn test_boundary_dimensions_accepted() {
        assert!(process_cover(&jpeg_bytes(400, 600)).is_ok());
        assert!(process_cover(&jpeg_bytes(3000, 4000)).is_ok());
    }

    #[test]
    fn test_one_pixel_outside_bounds_rejected() {
        assert_eq!(
            process_cover(&jpeg_bytes(399, 600)),
            Err(CoverError::TooSmall {
                width: 399,
                height: 600
            })
        );
        assert_eq!(
            process_cover(&jpeg_bytes(400, 599)),
            Err(CoverError::TooSmall {
                width: 400,
                height: 599
            })
        );
        assert_eq!(
            process_cover(&jpeg_bytes(3001, 4000)),
            Err(CoverError::TooLarge {
                width: 3001,
                height: 4000
            })
        );
        assert_eq!(
            process_cover(&jpeg_bytes(3000, 4001)),
            Err(CoverError::TooLarge {
                width: 3000,
                height: 4001
            })
        );
    }

    #[test]
    fn test_unsupported_format_rejected() {
        // A GIF header: valid image, disallowed format.
        let gif = b"GIF89a\x01\x00\x01\x00\x00\x00\x00;";
        assert_eq!(process_cover(gif), Err(CoverError::UnsupportedFormat));
        assert_eq!(
            process_cover(b"definitely not an image"),
            Err(CoverError::UnsupportedFormat)
        );
    }

    #[test]
    fn test_oversized_file_rejected() {
        let bytes = vec![0u8; MAX_COVER_BYTES + 1];
        assert_eq!(
            process_cover(&bytes),
            Err(CoverError::FileTooLarge {
                size: MAX_COVER_BYTES + 1
            })
        );
    }
}
