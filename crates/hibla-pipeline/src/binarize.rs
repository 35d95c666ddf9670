//! Global-threshold binarization.
//!
//! Produces a two-level mask where [`FOREGROUND`] marks thread pixels and
//! [`BACKGROUND`] everything else. The threshold is a fixed design
//! constant per invocation, never adapted to the image.

use image::GrayImage;

use crate::types::{BACKGROUND, FOREGROUND, Polarity};

/// Binarize `gray` at `threshold` using the requested thread polarity.
///
/// With [`Polarity::DarkThreads`] a pixel at or below the threshold is a
/// thread. [`Polarity::LightThreads`] is the exact complement.
/// [`Polarity::Auto`] binarizes as dark threads and flips when the pixel
/// at (1, 1) comes out as thread, since that means the background is the
/// dark side.
#[must_use = "returns the binary mask"]
pub fn binarize(gray: &GrayImage, threshold: u8, polarity: Polarity) -> GrayImage {
    match polarity {
        Polarity::DarkThreads => threshold_mask(gray, threshold, true),
        Polarity::LightThreads => threshold_mask(gray, threshold, false),
        Polarity::Auto => {
            let mask = threshold_mask(gray, threshold, true);
            if background_is_foreground(&mask) {
                log::debug!("binarize: dark background detected, flipping polarity");
                invert_mask(&mask)
            } else {
                mask
            }
        }
    }
}

/// Swap foreground and background.
#[must_use = "returns the inverted mask"]
pub fn invert_mask(mask: &GrayImage) -> GrayImage {
    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        image::Luma([!mask.get_pixel(x, y).0[0]])
    })
}

/// Number of foreground pixels in a mask.
#[must_use]
pub fn foreground_pixels(mask: &GrayImage) -> u64 {
    mask.pixels()
        .map(|p| u64::from(u8::from(p.0[0] == FOREGROUND)))
        .sum()
}

fn threshold_mask(gray: &GrayImage, threshold: u8, dark_threads: bool) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let dark = gray.get_pixel(x, y).0[0] <= threshold;
        if dark == dark_threads {
            image::Luma([FOREGROUND])
        } else {
            image::Luma([BACKGROUND])
        }
    })
}

/// Probe one pixel in from the corner so a single-pixel frame artefact
/// does not decide the polarity.
fn background_is_foreground(mask: &GrayImage) -> bool {
    if mask.width() == 0 || mask.height() == 0 {
        return false;
    }
    let x = 1.min(mask.width() - 1);
    let y = 1.min(mask.height() - 1);
    mask.get_pixel(x, y).0[0] == FOREGROUND
}
