//! Directional line isolation by morphological opening.
//!
//! Erodes the mask with a footprint that is long along the thread
//! direction and one pixel across it, then dilates with the same
//! footprint. Runs shorter than the footprint (noise, and the crossing
//! weave) vanish in the erosion; surviving lines are restored to roughly
//! their original thickness by the dilation.

use image::GrayImage;
use imageproc::morphology::{Mask, grayscale_dilate, grayscale_erode};

use crate::types::{Axis, FOREGROUND};

/// Build the structuring element for isolating threads along `axis`.
///
/// The anchor sits at the footprint's centre, rounded toward the origin.
#[must_use]
pub fn footprint(axis: Axis, length: u8) -> Mask {
    let (width, height) = axis.footprint(u32::from(length.max(1)));
    let shape = GrayImage::from_pixel(width, height, image::Luma([FOREGROUND]));
    let center = |extent: u32| u8::try_from((extent - 1) / 2).unwrap_or(u8::MAX);
    Mask::from_image(&shape, center(width), center(height))
}

/// Keep only structures at least `length` pixels long along `axis`.
#[must_use = "returns the isolated mask"]
pub fn isolate_lines(mask: &GrayImage, axis: Axis, length: u8) -> GrayImage {
    let element = footprint(axis, length);
    let eroded = grayscale_erode(mask, &element);
    grayscale_dilate(&eroded, &element)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BACKGROUND;

    /// 60x60 mask with one full-height vertical bar and one full-width
    /// horizontal bar, both 3 px thick, plus an isolated speck.
    fn cross_with_speck() -> GrayImage {
        GrayImage::from_fn(60, 60, |x, y| {
            let on = (20..23).contains(&x) || (40..43).contains(&y) || (x == 5 && y == 5);
            image::Luma([if on { FOREGROUND } else { BACKGROUND }])
        })
    }

    #[test]
    fn vertical_isolation_keeps_vertical_bar() {
        let isolated = isolate_lines(&cross_with_speck(), Axis::Vertical, 20);
        for y in 0..60 {
            for x in 20..23 {
                assert_eq!(isolated.get_pixel(x, y).0[0], FOREGROUND, "({x}, {y})");
            }
        }
        // The horizontal bar is gone away from the crossing.
        assert_eq!(isolated.get_pixel(50, 41).0[0], BACKGROUND);
        // So is the speck.
        assert_eq!(isolated.get_pixel(5, 5).0[0], BACKGROUND);
    }

    #[test]
    fn horizontal_isolation_keeps_horizontal_bar() {
        let isolated = isolate_lines(&cross_with_speck(), Axis::Horizontal, 20);
        for x in 0..60 {
            assert_eq!(isolated.get_pixel(x, 41).0[0], FOREGROUND, "x={x}");
        }
        assert_eq!(isolated.get_pixel(21, 10).0[0], BACKGROUND);
        assert_eq!(isolated.get_pixel(5, 5).0[0], BACKGROUND);
    }

    #[test]
    fn short_segments_are_removed() {
        // A vertical run of 10 px cannot contain a 1x20 footprint.
        let mask = GrayImage::from_fn(30, 40, |x, y| {
            image::Luma([if x == 15 && (10..20).contains(&y) {
                FOREGROUND
            } else {
                BACKGROUND
            }])
        });
        let isolated = isolate_lines(&mask, Axis::Vertical, 20);
        assert!(isolated.pixels().all(|p| p.0[0] == BACKGROUND));
    }

    #[test]
    fn output_stays_two_level() {
        let isolated = isolate_lines(&cross_with_speck(), Axis::Vertical, 7);
        assert!(
            isolated
                .pixels()
                .all(|p| p.0[0] == FOREGROUND || p.0[0] == BACKGROUND)
        );
    }

    #[test]
    fn dimensions_are_preserved() {
        let mask = GrayImage::new(17, 31);
        let isolated = isolate_lines(&mask, Axis::Horizontal, 20);
        assert_eq!(isolated.dimensions(), (17, 31));
    }
}
