//! Best-effort photo normalization.
//!
//! Report photos come straight off a phone camera and can be many
//! megabytes each. Before a photo is attached to an item it is scaled
//! down to fit a pixel bound and re-encoded as JPEG. The contract is
//! deliberately infallible: anything that cannot be decoded or
//! re-encoded passes through unchanged, so one bad photo never blocks
//! adding an item.

use image::imageops::FilterType;

use crate::report::PhotoFile;

/// Default pixel bound for the longer photo dimension.
pub const DEFAULT_MAX_WIDTH: u32 = 1600;
/// Default pixel bound for the shorter photo dimension.
pub const DEFAULT_MAX_HEIGHT: u32 = 1600;
/// Default JPEG quality as a fraction in (0, 1].
pub const DEFAULT_QUALITY: f32 = 0.75;

/// Pixel bounds and encode quality for [`normalize`].
#[derive(Debug, Clone, Copy)]
pub struct NormalizeBounds {
    pub max_width: u32,
    pub max_height: u32,
    /// JPEG quality as a fraction in (0, 1].
    pub quality: f32,
}

impl Default for NormalizeBounds {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
            quality: DEFAULT_QUALITY,
        }
    }
}

/// Result of a normalization attempt.
///
/// `Passthrough` covers every case where the original bytes are kept:
/// non-image inputs, images already within bounds, and decode/encode
/// failures. Callers that need the file itself should not care which
/// case applied.
#[derive(Debug, Clone)]
pub enum NormalizedPhoto {
    /// The photo was scaled down and re-encoded as JPEG.
    Normalized(PhotoFile),
    /// The original file, untouched.
    Passthrough(PhotoFile),
}

impl NormalizedPhoto {
    /// The file to upload, whichever way normalization went.
    pub fn file(&self) -> &PhotoFile {
        match self {
            NormalizedPhoto::Normalized(file) | NormalizedPhoto::Passthrough(file) => file,
        }
    }

    /// Consume the wrapper, returning the file to upload.
    pub fn into_file(self) -> PhotoFile {
        match self {
            NormalizedPhoto::Normalized(file) | NormalizedPhoto::Passthrough(file) => file,
        }
    }

    /// Whether the photo was actually re-encoded.
    pub fn is_normalized(&self) -> bool {
        matches!(self, NormalizedPhoto::Normalized(_))
    }
}

/// Scale a photo down to fit `bounds` and re-encode it as JPEG.
///
/// Non-image content types pass through unchanged, as do images already
/// within bounds (no re-encoding cost paid unnecessarily). Scaling
/// preserves the aspect ratio and never upscales. Any decode or encode
/// error resolves to the original, unmodified file.
pub fn normalize(photo: PhotoFile, bounds: &NormalizeBounds) -> NormalizedPhoto {
    if !photo.content_type.starts_with("image/") {
        return NormalizedPhoto::Passthrough(photo);
    }

    match reencode(&photo, bounds) {
        Ok(Some(file)) => NormalizedPhoto::Normalized(file),
        // Within bounds, or undecodable: keep the original bytes.
        Ok(None) | Err(_) => NormalizedPhoto::Passthrough(photo),
    }
}

/// Decode, scale, and re-encode. `Ok(None)` means the image is already
/// within bounds and should be kept as-is.
fn reencode(
    photo: &PhotoFile,
    bounds: &NormalizeBounds,
) -> Result<Option<PhotoFile>, image::ImageError> {
    let decoded = image::load_from_memory(&photo.bytes)?;

    if decoded.width() <= bounds.max_width && decoded.height() <= bounds.max_height {
        return Ok(None);
    }

    // `resize` preserves aspect ratio and lands the larger dimension on
    // its bound. The within-bounds check above guarantees this is
    // always a downscale.
    let resized = decoded.resize(bounds.max_width, bounds.max_height, FilterType::Triangle);

    let quality = (bounds.quality.clamp(0.01, 1.0) * 100.0).round() as u8;
    let mut encoded = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut encoded, quality);
    resized.write_with_encoder(encoder)?;

    Ok(Some(PhotoFile {
        file_name: jpeg_file_name(&photo.file_name),
        content_type: "image/jpeg".to_string(),
        bytes: encoded,
    }))
}

/// Swap the file extension for `.jpg` to match the new encoding.
fn jpeg_file_name(original: &str) -> String {
    match original.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => format!("{stem}.jpg"),
        _ => format!("{original}.jpg"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Encode a solid-color PNG of the given dimensions.
    fn png_photo(name: &str, width: u32, height: u32) -> PhotoFile {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            width,
            height,
            image::Rgb([120, 30, 200]),
        ));
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .expect("in-memory PNG encode should succeed");
        PhotoFile {
            file_name: name.to_string(),
            content_type: "image/png".to_string(),
            bytes,
        }
    }

    fn bounds(max_width: u32, max_height: u32) -> NormalizeBounds {
        NormalizeBounds {
            max_width,
            max_height,
            quality: 0.75,
        }
    }

    #[test]
    fn non_image_passes_through_untouched() {
        let file = PhotoFile {
            file_name: "notes.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            bytes: vec![1, 2, 3, 4],
        };
        let result = normalize(file.clone(), &NormalizeBounds::default());
        assert!(!result.is_normalized());
        assert_eq!(result.file().bytes, file.bytes);
        assert_eq!(result.file().file_name, "notes.pdf");
    }

    #[test]
    fn image_within_bounds_is_identity() {
        let photo = png_photo("small.png", 800, 600);
        let original_bytes = photo.bytes.clone();
        let result = normalize(photo, &bounds(1600, 1600));
        assert!(!result.is_normalized());
        // Byte-for-byte passthrough, not a re-encode.
        assert_eq!(result.file().bytes, original_bytes);
        assert_eq!(result.file().content_type, "image/png");
    }

    #[test]
    fn oversize_image_scaled_to_bound_preserving_aspect() {
        let photo = png_photo("wide.png", 3200, 1600);
        let result = normalize(photo, &bounds(1600, 1600));
        assert!(result.is_normalized());

        let out = result.file();
        assert_eq!(out.content_type, "image/jpeg");
        assert_eq!(out.file_name, "wide.jpg");

        let decoded = image::load_from_memory(&out.bytes).expect("output should decode");
        assert_eq!(decoded.width(), 1600);
        assert_eq!(decoded.height(), 800);
    }

    #[test]
    fn tall_image_lands_height_on_bound() {
        let photo = png_photo("tall.png", 1000, 4000);
        let result = normalize(photo, &bounds(1600, 1600));
        let decoded = image::load_from_memory(&result.file().bytes).unwrap();
        assert_eq!(decoded.height(), 1600);
        assert_eq!(decoded.width(), 400);
    }

    #[test]
    fn never_upscales() {
        let photo = png_photo("tiny.png", 100, 50);
        let original_bytes = photo.bytes.clone();
        let result = normalize(photo, &bounds(1600, 1600));
        assert!(!result.is_normalized());
        assert_eq!(result.file().bytes, original_bytes);
    }

    #[test]
    fn undecodable_image_falls_back_to_original() {
        let file = PhotoFile {
            file_name: "broken.png".to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![0xde, 0xad, 0xbe, 0xef],
        };
        let result = normalize(file.clone(), &NormalizeBounds::default());
        assert!(!result.is_normalized());
        assert_eq!(result.file().bytes, file.bytes);
        assert_eq!(result.file().file_name, "broken.png");
    }

    #[test]
    fn jpeg_name_replaces_extension() {
        assert_eq!(jpeg_file_name("photo.png"), "photo.jpg");
        assert_eq!(jpeg_file_name("photo.HEIC"), "photo.jpg");
        assert_eq!(jpeg_file_name("photo"), "photo.jpg");
        assert_eq!(jpeg_file_name(".hidden"), ".hidden.jpg");
    }
}
