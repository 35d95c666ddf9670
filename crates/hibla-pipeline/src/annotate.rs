//! Annotation: mark detected crossings on a copy of the image.
//!
//! Output is diagnostic only; nothing downstream reads it.

use image::Rgba;
use imageproc::drawing::draw_line_segment_mut;

use crate::scan::AxisScan;
use crate::types::{Axis, RgbaImage};

/// Marker color for vertical-thread crossings.
pub const VERTICAL_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// Marker color for horizontal-thread crossings.
pub const HORIZONTAL_COLOR: Rgba<u8> = Rgba([255, 0, 255, 255]);

/// Marker color for `axis`.
#[must_use]
pub const fn marker_color(axis: Axis) -> Rgba<u8> {
    match axis {
        Axis::Vertical => VERTICAL_COLOR,
        Axis::Horizontal => HORIZONTAL_COLOR,
    }
}

/// Draw one marker per counted segment of `scan` onto a copy of `image`.
///
/// Each marker is `marker_length` pixels long, perpendicular to the sample
/// line (so parallel to the thread), centred on the segment's midpoint.
/// Markers that reach past the image edge are clipped.
#[must_use = "returns the annotated image"]
pub fn annotate(image: &RgbaImage, scan: &AxisScan, marker_length: u32) -> RgbaImage {
    let mut canvas = image.clone();
    if marker_length == 0 {
        return canvas;
    }

    let color = marker_color(scan.axis);
    #[allow(clippy::cast_precision_loss)]
    let half = marker_length as f32 / 2.0;

    for sample in &scan.samples {
        for segment in &sample.segments {
            let (x, y) = scan.axis.pixel_at(sample.position, segment.midpoint());
            #[allow(clippy::cast_precision_loss)]
            let (x, y) = (x as f32, y as f32);
            let (start, end) = match scan.axis {
                Axis::Vertical => ((x, y - half), (x, y + half)),
                Axis::Horizontal => ((x - half, y), (x + half, y)),
            };
            draw_line_segment_mut(&mut canvas, start, end, color);
        }
    }
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::{SampleScan, ScanStats};
    use crate::types::Segment;

    fn white(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]))
    }

    fn scan(axis: Axis, position: u32, segments: Vec<Segment>) -> AxisScan {
        AxisScan {
            axis,
            samples: vec![SampleScan { position, segments }],
            skipped: 0,
            stats: ScanStats::default(),
        }
    }

    #[test]
    fn vertical_marker_is_drawn_at_segment_midpoint() {
        let out = annotate(
            &white(40, 40),
            &scan(Axis::Vertical, 20, vec![Segment::new(8, 12)]),
            10,
        );
        assert_eq!(*out.get_pixel(10, 20), VERTICAL_COLOR);
        assert_eq!(*out.get_pixel(10, 16), VERTICAL_COLOR);
        assert_eq!(*out.get_pixel(10, 24), VERTICAL_COLOR);
        // Marker runs along the thread, not across it.
        assert_eq!(*out.get_pixel(14, 20), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn horizontal_marker_runs_along_the_row() {
        let out = annotate(
            &white(40, 40),
            &scan(Axis::Horizontal, 5, vec![Segment::new(30, 30)]),
            6,
        );
        assert_eq!(*out.get_pixel(5, 30), HORIZONTAL_COLOR);
        assert_eq!(*out.get_pixel(3, 30), HORIZONTAL_COLOR);
        assert_eq!(*out.get_pixel(7, 30), HORIZONTAL_COLOR);
        assert_eq!(*out.get_pixel(5, 26), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn input_image_is_untouched() {
        let image = white(20, 20);
        let before = image.clone();
        let _ = annotate(&image, &scan(Axis::Vertical, 10, vec![Segment::new(2, 4)]), 10);
        assert_eq!(image, before);
    }

    #[test]
    fn markers_near_edges_are_clipped() {
        let out = annotate(
            &white(10, 10),
            &scan(Axis::Vertical, 1, vec![Segment::new(0, 0)]),
            10,
        );
        assert_eq!(out.dimensions(), (10, 10));
        assert_eq!(*out.get_pixel(0, 0), VERTICAL_COLOR);
    }

    #[test]
    fn zero_length_draws_nothing() {
        let image = white(10, 10);
        let out = annotate(&image, &scan(Axis::Vertical, 5, vec![Segment::new(2, 6)]), 0);
        assert_eq!(out, image);
    }
}
