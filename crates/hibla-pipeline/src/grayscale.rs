//! Image decoding, grayscale conversion and contrast gain.
//!
//! The pipeline takes an already-decoded [`DynamicImage`]; [`decode`] is
//! offered for callers that only hold encoded bytes (PNG, JPEG, BMP,
//! WebP).

use image::{DynamicImage, GrayImage};

use crate::types::{PipelineError, RgbaImage};

/// Decode raw image bytes.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    Ok(image::load_from_memory(bytes)?)
}

/// Convert any decoded image to single-channel luminance.
///
/// Uses the `image` crate's weighted luminance, so green contributes
/// more than red, and red more than blue.
#[must_use = "returns the grayscale image"]
pub fn to_gray(image: &DynamicImage) -> GrayImage {
    image.to_luma8()
}

/// Convert any decoded image to RGBA for annotation.
#[must_use = "returns the RGBA image"]
pub fn to_rgba(image: &DynamicImage) -> RgbaImage {
    image.to_rgba8()
}

/// Multiply every gray level by `gain`, saturating at 0 and 255.
///
/// A gain of exactly `1.0` returns an identical copy.
#[must_use = "returns the adjusted image"]
#[allow(clippy::float_cmp)]
pub fn apply_contrast(image: &GrayImage, gain: f32) -> GrayImage {
    if gain == 1.0 {
        return image.clone();
    }

    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let scaled = (f32::from(image.get_pixel(x, y).0[0]) * gain).round();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let value = scaled.clamp(0.0, 255.0) as u8;
        image::Luma([value])
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Helper: encode a single 1x1 RGBA pixel as a PNG byte buffer.
    fn encode_rgba_pixel(r: u8, g: u8, b: u8) -> Vec<u8> {
        let img = image::RgbaImage::from_fn(1, 1, |_, _| image::Rgba([r, g, b, 255]));
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn empty_input_returns_error() {
        let result = decode(&[]);
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_returns_image_decode_error() {
        let result = decode(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn valid_png_decodes() {
        let image = decode(&encode_rgba_pixel(10, 20, 30)).unwrap();
        assert_eq!(image.width(), 1);
        assert_eq!(image.height(), 1);
        assert_eq!(to_rgba(&image).get_pixel(0, 0).0, [10, 20, 30, 255]);
    }

    #[test]
    fn luminance_weights_green_highest() {
        let gray_of = |r, g, b| {
            let image = decode(&encode_rgba_pixel(r, g, b)).unwrap();
            to_gray(&image).get_pixel(0, 0).0[0]
        };
        let (r_val, g_val, b_val) = (gray_of(255, 0, 0), gray_of(0, 255, 0), gray_of(0, 0, 255));
        assert!(
            g_val > r_val && r_val > b_val,
            "expected green > red > blue luminance, got R={r_val} G={g_val} B={b_val}",
        );
    }

    #[test]
    fn unit_gain_is_identity() {
        let img = GrayImage::from_fn(4, 4, |x, y| {
            image::Luma([u8::try_from(x * 40 + y).unwrap()])
        });
        assert_eq!(apply_contrast(&img, 1.0), img);
    }

    #[test]
    fn gain_saturates_at_white() {
        let img = GrayImage::from_fn(3, 1, |x, _| image::Luma([[10, 100, 200][x as usize]]));
        let out = apply_contrast(&img, 1.5);
        assert_eq!(out.get_pixel(0, 0).0[0], 15);
        assert_eq!(out.get_pixel(1, 0).0[0], 150);
        assert_eq!(out.get_pixel(2, 0).0[0], 255);
    }
}
