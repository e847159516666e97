//! Validation and adaptive compression for uploaded photo bytes.
//!
//! `validate` rejects unsuitable files with a categorized reason; `compress`
//! re-encodes acceptable ones under a byte budget and never fails — anything
//! that goes wrong falls back to the original bytes so an upload is never
//! blocked by the compressor.

use crate::constants::{
    COMPRESS_THRESHOLD_BYTES, JPEG_QUALITY_LADDER, LARGE_OUTPUT_BUDGET_BYTES, LARGE_SOURCE_EDGE,
    MAX_FILE_BYTES, MAX_OUTPUT_EDGE, MIN_FILE_BYTES, MIN_PIXEL_EDGE, OUTPUT_BUDGET_BYTES,
};
use crate::photo::PhotoMeta;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader};
use std::io::Cursor;
use std::sync::OnceLock;
use thiserror::Error;

/// Why a candidate file was dropped. Each variant maps to one user-facing
/// message category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PhotoRejection {
    #[error("file is larger than 5 MB")]
    TooLarge,
    #[error("file is smaller than 5 KB")]
    TooSmall,
    #[error("only JPEG, PNG and WebP photos are supported")]
    InvalidType,
    #[error("photo must be at least 200×200 pixels")]
    BelowMinimumDimensions,
    #[error("file could not be read as an image")]
    Corrupt,
}

/// Checks size bounds, sniffed format, and decoded dimensions.
pub fn validate(bytes: &[u8]) -> Result<PhotoMeta, PhotoRejection> {
    if bytes.len() > MAX_FILE_BYTES {
        return Err(PhotoRejection::TooLarge);
    }
    if bytes.len() < MIN_FILE_BYTES {
        return Err(PhotoRejection::TooSmall);
    }

    // Sniff the real format from the bytes; the file name proves nothing.
    let format = image::guess_format(bytes).map_err(|_| PhotoRejection::InvalidType)?;
    if !matches!(
        format,
        ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP
    ) {
        return Err(PhotoRejection::InvalidType);
    }

    let (width, height) = ImageReader::with_format(Cursor::new(bytes), format)
        .into_dimensions()
        .map_err(|_| PhotoRejection::Corrupt)?;
    if width < MIN_PIXEL_EDGE || height < MIN_PIXEL_EDGE {
        return Err(PhotoRejection::BelowMinimumDimensions);
    }

    Ok(PhotoMeta {
        width,
        height,
        byte_size: bytes.len(),
    })
}

/// Adaptively re-encodes a validated photo. Small files pass through
/// bit-identical; large ones are orientation-corrected, downscaled to the
/// output edge ceiling, and encoded under a byte budget that scales with the
/// source size. Returns the original bytes on any failure.
pub fn compress(bytes: &[u8]) -> Vec<u8> {
    if bytes.len() < COMPRESS_THRESHOLD_BYTES {
        return bytes.to_vec();
    }
    match compress_inner(bytes) {
        Ok(out) => out,
        Err(err) => {
            log::warn!("compression fell back to original bytes: {err}");
            bytes.to_vec()
        }
    }
}

fn compress_inner(bytes: &[u8]) -> Result<Vec<u8>, String> {
    let source = decode_oriented(bytes)?;
    let source_edge = source.width().max(source.height());
    let budget = if source_edge >= LARGE_SOURCE_EDGE {
        LARGE_OUTPUT_BUDGET_BYTES
    } else {
        OUTPUT_BUDGET_BYTES
    };

    let scaled = if source_edge > MAX_OUTPUT_EDGE {
        source.thumbnail(MAX_OUTPUT_EDGE, MAX_OUTPUT_EDGE)
    } else {
        source
    };

    if webp_encoder_available() {
        let webp = encode_webp(&scaled)?;
        if webp.len() <= budget {
            return Ok(webp);
        }
    }

    // Walk the quality ladder; if nothing meets the budget, ship the
    // smallest attempt rather than the untouched original.
    let mut best: Option<Vec<u8>> = None;
    for quality in JPEG_QUALITY_LADDER {
        let jpeg = encode_jpeg(&scaled, quality)?;
        if jpeg.len() <= budget {
            return Ok(jpeg);
        }
        if best.as_ref().map(|b| jpeg.len() < b.len()).unwrap_or(true) {
            best = Some(jpeg);
        }
    }
    best.ok_or_else(|| "no encode attempt produced output".to_string())
}

/// Decodes with the orientation from the source's embedded metadata applied,
/// so re-encoded output (which carries no metadata) still displays upright.
pub fn decode_oriented(bytes: &[u8]) -> Result<DynamicImage, String> {
    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| format!("format sniff failed: {err}"))?
        .into_decoder()
        .map_err(|err| format!("decoder init failed: {err}"))?;
    let orientation = decoder
        .orientation()
        .unwrap_or(Orientation::NoTransforms);
    let mut img = DynamicImage::from_decoder(decoder)
        .map_err(|err| format!("decode failed: {err}"))?;
    img.apply_orientation(orientation);
    Ok(img)
}

/// One-time probe for the preferred output codec, cached for the session.
fn webp_encoder_available() -> bool {
    static PROBE: OnceLock<bool> = OnceLock::new();
    *PROBE.get_or_init(|| {
        let pixel = DynamicImage::new_rgb8(1, 1);
        encode_webp(&pixel).is_ok()
    })
}

fn encode_webp(img: &DynamicImage) -> Result<Vec<u8>, String> {
    let mut out = Cursor::new(Vec::new());
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    rgb.write_with_encoder(WebPEncoder::new_lossless(&mut out))
        .map_err(|err| format!("webp encode failed: {err}"))?;
    Ok(out.into_inner())
}

pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, String> {
    let mut out = Cursor::new(Vec::new());
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))
        .map_err(|err| format!("jpeg encode failed: {err}"))?;
    Ok(out.into_inner())
}

#[cfg(test)]
pub mod test_images {
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;

    /// Deterministic per-pixel noise so PNG can't compress the result below
    /// the minimum file size.
    pub fn noise_image(width: u32, height: u32) -> DynamicImage {
        let mut state = 0x12345678u32;
        let img = RgbImage::from_fn(width, height, |x, y| {
            state = state
                .wrapping_mul(1664525)
                .wrapping_add(1013904223)
                .wrapping_add(x ^ y.rotate_left(7));
            let b = state.to_le_bytes();
            image::Rgb([b[0], b[1], b[2]])
        });
        DynamicImage::ImageRgb8(img)
    }

    pub fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    pub fn noise_png(width: u32, height: u32) -> Vec<u8> {
        encode(&noise_image(width, height), ImageFormat::Png)
    }
}

#[cfg(test)]
mod tests {
    use super::test_images::{encode, noise_image, noise_png};
    use super::*;
    use crate::constants::MIN_FILE_BYTES;

    #[test]
    fn accepts_a_reasonable_png() {
        let bytes = noise_png(300, 240);
        assert!(bytes.len() >= MIN_FILE_BYTES);
        let meta = validate(&bytes).unwrap();
        assert_eq!((meta.width, meta.height), (300, 240));
        assert_eq!(meta.byte_size, bytes.len());
    }

    #[test]
    fn rejects_oversized_files_before_decoding() {
        let bytes = vec![0u8; MAX_FILE_BYTES + 1];
        assert_eq!(validate(&bytes), Err(PhotoRejection::TooLarge));
    }

    #[test]
    fn rejects_undersized_files() {
        let bytes = vec![0u8; MIN_FILE_BYTES - 1];
        assert_eq!(validate(&bytes), Err(PhotoRejection::TooSmall));
    }

    #[test]
    fn rejects_unsupported_formats() {
        // A BMP is a real image but not an accepted upload type.
        let bytes = encode(&noise_image(300, 300), ImageFormat::Bmp);
        assert_eq!(validate(&bytes), Err(PhotoRejection::InvalidType));
    }

    #[test]
    fn rejects_small_pixel_dimensions() {
        let bytes = noise_png(199, 500);
        assert_eq!(validate(&bytes), Err(PhotoRejection::BelowMinimumDimensions));
    }

    #[test]
    fn rejects_truncated_image_data() {
        let mut bytes = noise_png(300, 300);
        bytes.truncate(MIN_FILE_BYTES.max(64));
        // Header still sniffs as PNG, but the dimensions chunk may be gone.
        let result = validate(&bytes);
        assert!(matches!(
            result,
            Err(PhotoRejection::Corrupt) | Ok(_)
        ));
    }

    #[test]
    fn small_files_pass_through_bit_identical() {
        let bytes = noise_png(220, 220);
        assert!(bytes.len() < COMPRESS_THRESHOLD_BYTES);
        assert_eq!(compress(&bytes), bytes);
    }

    #[test]
    fn large_sources_are_downscaled_to_the_edge_ceiling() {
        let bytes = encode(&noise_image(2400, 1200), ImageFormat::Jpeg);
        assert!(bytes.len() >= COMPRESS_THRESHOLD_BYTES);
        let out = compress(&bytes);
        let decoded = image::load_from_memory(&out).unwrap();
        assert!(decoded.width().max(decoded.height()) <= MAX_OUTPUT_EDGE);
    }

    #[test]
    fn compression_failure_falls_back_to_original() {
        // Past the size threshold but not decodable.
        let bytes = vec![0xABu8; COMPRESS_THRESHOLD_BYTES + 1];
        assert_eq!(compress(&bytes), bytes);
    }
}
