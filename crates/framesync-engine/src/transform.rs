//! Display transform pipeline
//!
//! Resize-to-fit plus JPEG re-encode at the configured quality. The
//! pipeline is behind the `imaging` cargo feature; builds without it run
//! in pass-through mode and the cache engine streams original bytes to
//! disk instead. [`available()`] is the single fork point.
//!
//! The transform is pure: identical source bytes and settings produce
//! identical output bytes, so re-caching an evicted photo reproduces the
//! payload exactly.

use anyhow::Result;

/// Output of one transform run
#[derive(Debug, Clone)]
pub struct TransformedImage {
    /// Encoded JPEG bytes
    pub bytes: Vec<u8>,
    /// Post-transform width
    pub width: u32,
    /// Post-transform height
    pub height: u32,
}

/// Whether the image-processing facility was compiled in
#[must_use]
pub const fn available() -> bool {
    cfg!(feature = "imaging")
}

/// Decodes, fits within the display bounds, and re-encodes as JPEG
///
/// The source is never upscaled: an image already inside the bounds is
/// re-encoded at its native size.
#[cfg(feature = "imaging")]
pub fn to_display_jpeg(
    source: &[u8],
    max_width: u32,
    max_height: u32,
    quality: u8,
) -> Result<TransformedImage> {
    use anyhow::Context;
    use image::imageops::FilterType;

    let decoded =
        image::load_from_memory(source).context("source bytes are not a decodable image")?;

    let (width, height) = (decoded.width(), decoded.height());
    let fitted = if width > max_width || height > max_height {
        decoded.resize(max_width, max_height, FilterType::Lanczos3)
    } else {
        decoded
    };

    // JPEG has no alpha channel; flatten before encoding.
    let rgb = fitted.to_rgb8();

    let mut bytes = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, quality);
    encoder
        .encode_image(&rgb)
        .context("jpeg encode failed")?;

    Ok(TransformedImage {
        bytes,
        width: rgb.width(),
        height: rgb.height(),
    })
}

/// Pass-through builds have no transform; callers gate on [`available()`]
#[cfg(not(feature = "imaging"))]
pub fn to_display_jpeg(
    _source: &[u8],
    _max_width: u32,
    _max_height: u32,
    _quality: u8,
) -> Result<TransformedImage> {
    anyhow::bail!("image processing facility is not compiled in")
}

#[cfg(all(test, feature = "imaging"))]
mod tests {
    use super::*;

    /// A solid-color PNG of the given dimensions
    fn png_fixture(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([180, 90, 30]));
        let mut bytes = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut bytes, image::ImageFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    #[test]
    fn oversized_image_is_fitted_preserving_aspect() {
        let source = png_fixture(400, 200);
        let out = to_display_jpeg(&source, 100, 100, 85).unwrap();
        assert_eq!((out.width, out.height), (100, 50));

        let decoded = image::load_from_memory(&out.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (100, 50));
    }

    #[test]
    fn small_image_is_never_upscaled() {
        let source = png_fixture(32, 24);
        let out = to_display_jpeg(&source, 1920, 1080, 85).unwrap();
        assert_eq!((out.width, out.height), (32, 24));
    }

    #[test]
    fn output_is_jpeg() {
        let source = png_fixture(64, 64);
        let out = to_display_jpeg(&source, 64, 64, 85).unwrap();
        // JPEG SOI marker
        assert_eq!(&out.bytes[..2], &[0xFF, 0xD8]);
        assert_eq!(image::guess_format(&out.bytes).unwrap(), image::ImageFormat::Jpeg);
    }

    #[test]
    fn identical_input_and_settings_reproduce_identical_bytes() {
        let source = png_fixture(320, 240);
        let first = to_display_jpeg(&source, 128, 128, 85).unwrap();
        let second = to_display_jpeg(&source, 128, 128, 85).unwrap();
        assert_eq!(first.bytes, second.bytes);
    }

    #[test]
    fn garbage_input_is_rejected() {
        let err = to_display_jpeg(b"definitely not an image", 100, 100, 85).unwrap_err();
        assert!(format!("{err:#}").contains("decodable"));
    }
}
