//! Border cropping: remove a uniform dark margin around the swatch.
//!
//! Photos taken against a black backdrop (or padded by the capture UI)
//! carry a near-black frame that would otherwise be sampled as empty
//! fabric. The cropper thresholds the image just above black, traces the
//! outer contours of what remains, and crops to the rectangle bounding all
//! of them.
//!
//! Images whose first row is already mixed (part border, part swatch, or
//! no border at all) are returned unchanged.

use image::{DynamicImage, GrayImage};
use imageproc::contours::{BorderType, Contour};

use crate::types::{BACKGROUND, Dimensions, FOREGROUND, InvalidImage};

/// An axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl CropRect {
    /// Area in pixels.
    #[must_use]
    pub fn area(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Smallest rectangle containing both.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = (self.x + self.width).max(other.x + other.width);
        let bottom = (self.y + self.height).max(other.y + other.height);
        Self {
            x,
            y,
            width: right - x,
            height: bottom - y,
        }
    }
}

/// Outcome of [`crop_border`].
#[derive(Debug, Clone)]
pub struct Cropped {
    /// The cropped (or untouched) image.
    pub image: DynamicImage,
    /// The rectangle that was kept, `None` when cropping was skipped.
    pub rect: Option<CropRect>,
}

/// Crop the outer border from `image`.
///
/// Pixels brighter than `border_threshold` belong to the swatch; the rest
/// is border.
///
/// # Errors
///
/// Returns [`InvalidImage::ZeroArea`] for an empty image and
/// [`InvalidImage::NoForeground`] if nothing but border is found.
pub fn crop_border(image: &DynamicImage, border_threshold: u8) -> Result<Cropped, InvalidImage> {
    let dims = Dimensions::of(image);
    if dims.width == 0 || dims.height == 0 {
        return Err(InvalidImage::ZeroArea);
    }

    let mask = border_mask(&image.to_luma8(), border_threshold);

    if !first_row_is_uniform(&mask) {
        log::debug!("crop: first row is mixed, keeping {}x{}", dims.width, dims.height);
        return Ok(Cropped {
            image: image.clone(),
            rect: None,
        });
    }

    let rect = swatch_bounds(&mask).ok_or(InvalidImage::NoForeground)?;
    log::debug!(
        "crop: {}x{} -> {}x{} at ({}, {})",
        dims.width,
        dims.height,
        rect.width,
        rect.height,
        rect.x,
        rect.y
    );

    Ok(Cropped {
        image: image.crop_imm(rect.x, rect.y, rect.width, rect.height),
        rect: Some(rect),
    })
}

/// Split swatch from border: 255 above `border_threshold`, 0 otherwise.
#[must_use = "returns the border mask"]
pub fn border_mask(gray: &GrayImage, border_threshold: u8) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y).0[0] > border_threshold {
            image::Luma([FOREGROUND])
        } else {
            image::Luma([BACKGROUND])
        }
    })
}

/// Whether every pixel of the mask's top row has the same level.
fn first_row_is_uniform(mask: &GrayImage) -> bool {
    let first = mask.get_pixel(0, 0).0[0];
    (1..mask.width()).all(|x| mask.get_pixel(x, 0).0[0] == first)
}

/// Bounding rectangle of every top-level outer contour together.
///
/// Dark threads that run edge to edge split the swatch into several
/// regions in the border mask, so no single contour covers it. The mask
/// is traced with a one-pixel background margin so regions touching the
/// image edge still get an outer contour.
fn swatch_bounds(mask: &GrayImage) -> Option<CropRect> {
    let mut padded = GrayImage::new(mask.width() + 2, mask.height() + 2);
    image::imageops::replace(&mut padded, mask, 1, 1);
    let contours: Vec<Contour<u32>> = imageproc::contours::find_contours(&padded);

    let rect = contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter_map(bounding_rect)
        .reduce(CropRect::union)?;

    Some(CropRect {
        x: rect.x - 1,
        y: rect.y - 1,
        ..rect
    })
}

fn bounding_rect(contour: &Contour<u32>) -> Option<CropRect> {
    let min_x = contour.points.iter().map(|p| p.x).min()?;
    let max_x = contour.points.iter().map(|p| p.x).max()?;
    let min_y = contour.points.iter().map(|p| p.y).min()?;
    let max_y = contour.points.iter().map(|p| p.y).max()?;
    Some(CropRect {
        x: min_x,
        y: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// White swatch on a black frame: swatch spans `[x0, x1) x [y0, y1)`.
    fn framed(width: u32, height: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(image::RgbImage::from_fn(width, height, |x, y| {
            if (x0..x1).contains(&x) && (y0..y1).contains(&y) {
                image::Rgb([220, 210, 200])
            } else {
                image::Rgb([0, 0, 0])
            }
        }))
    }

    #[test]
    fn crops_to_swatch_inside_black_frame() {
        let image = framed(40, 30, 5, 4, 35, 24);
        let cropped = crop_border(&image, 1).unwrap();
        assert_eq!(
            cropped.rect,
            Some(CropRect {
                x: 5,
                y: 4,
                width: 30,
                height: 20
            })
        );
        assert_eq!(cropped.image.width(), 30);
        assert_eq!(cropped.image.height(), 20);
        assert_eq!(cropped.image.to_rgb8().get_pixel(0, 0).0, [220, 210, 200]);
    }

    #[test]
    fn mixed_first_row_is_byte_identical() {
        // Dark stripes run through the top row, so there is no solid border.
        let image = DynamicImage::ImageRgb8(image::RgbImage::from_fn(20, 20, |x, _| {
            if x % 5 == 0 {
                image::Rgb([0, 0, 0])
            } else {
                image::Rgb([255, 255, 255])
            }
        }));
        let cropped = crop_border(&image, 1).unwrap();
        assert!(cropped.rect.is_none());
        assert_eq!(cropped.image.as_bytes(), image.as_bytes());
        assert_eq!(cropped.image.color(), image.color());
    }

    #[test]
    fn all_black_has_no_foreground() {
        let image = DynamicImage::ImageLuma8(GrayImage::new(16, 16));
        assert_eq!(
            crop_border(&image, 1).unwrap_err(),
            InvalidImage::NoForeground
        );
    }

    #[test]
    fn zero_area_is_rejected() {
        let image = DynamicImage::ImageLuma8(GrayImage::new(0, 10));
        assert_eq!(crop_border(&image, 1).unwrap_err(), InvalidImage::ZeroArea);
    }

    #[test]
    fn all_white_keeps_full_frame() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(12, 9, image::Luma([255])));
        let cropped = crop_border(&image, 1).unwrap();
        assert_eq!(cropped.image.width(), 12);
        assert_eq!(cropped.image.height(), 9);
    }

    #[test]
    fn crop_covers_every_region() {
        let mut gray = GrayImage::new(50, 50);
        gray.put_pixel(2, 2, image::Luma([200]));
        for y in 10..40 {
            for x in 12..45 {
                gray.put_pixel(x, y, image::Luma([200]));
            }
        }
        let cropped = crop_border(&DynamicImage::ImageLuma8(gray), 1).unwrap();
        assert_eq!(
            cropped.rect,
            Some(CropRect {
                x: 2,
                y: 2,
                width: 43,
                height: 38
            })
        );
    }

    #[test]
    fn black_threads_do_not_split_the_swatch() {
        // Full-width black bands cut the swatch into five strips.
        let image = DynamicImage::ImageLuma8(GrayImage::from_fn(60, 70, |x, y| {
            let inside = (5..55).contains(&x) && (5..65).contains(&y);
            image::Luma([if inside && (y - 5) % 12 < 8 { 200 } else { 0 }])
        }));
        let cropped = crop_border(&image, 1).unwrap();
        assert_eq!(
            cropped.rect,
            Some(CropRect {
                x: 5,
                y: 5,
                width: 50,
                height: 56
            })
        );
    }

    #[test]
    fn swatch_touching_the_edge_keeps_full_frame() {
        // First row is all swatch; the only border is along the bottom.
        let image = DynamicImage::ImageLuma8(GrayImage::from_fn(30, 20, |_, y| {
            image::Luma([if y < 15 { 180 } else { 0 }])
        }));
        let cropped = crop_border(&image, 1).unwrap();
        assert_eq!(
            cropped.rect,
            Some(CropRect {
                x: 0,
                y: 0,
                width: 30,
                height: 15
            })
        );
    }

    #[test]
    fn union_spans_both_rects() {
        let a = CropRect {
            x: 2,
            y: 8,
            width: 3,
            height: 2,
        };
        let b = CropRect {
            x: 6,
            y: 1,
            width: 4,
            height: 4,
        };
        assert_eq!(
            a.union(b),
            CropRect {
                x: 2,
                y: 1,
                width: 8,
                height: 9
            }
        );
    }

    #[test]
    fn border_mask_is_two_level() {
        let gray = GrayImage::from_fn(4, 1, |x, _| image::Luma([[0, 1, 2, 255][x as usize]]));
        let mask = border_mask(&gray, 1);
        let levels: Vec<u8> = mask.pixels().map(|p| p.0[0]).collect();
        assert_eq!(levels, vec![0, 0, 255, 255]);
    }
}
