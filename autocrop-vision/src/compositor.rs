//! Annotation drawing. Every function takes the input buffer by reference and
//! returns a fresh copy with the drawing applied.

use image::{Rgba, RgbaImage};
use imageproc::drawing;
use imageproc::rect::Rect;

use crate::geometry::{BoundingBox, Point};

pub const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);
pub const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// Outline style for the detection preview box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub color: Rgba<u8>,
    pub width: u32,
}

impl Default for Stroke {
    fn default() -> Self {
        Self {
            color: GREEN,
            width: 5,
        }
    }
}

/// Filled circle used for contour points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marker {
    pub color: Rgba<u8>,
    pub radius: u32,
}

impl Default for Marker {
    fn default() -> Self {
        Self {
            color: RED,
            radius: 3,
        }
    }
}

/// Draw an unfilled rectangle along the edges of `bounds`.
///
/// The stroke is centered on the box edges, so half of it falls outside the
/// box; anything past the image border is clipped. An empty box draws
/// nothing.
pub fn draw_bounding_box(image: &RgbaImage, bounds: &BoundingBox, stroke: Stroke) -> RgbaImage {
    let mut out = image.clone();
    if bounds.is_empty() {
        return out;
    }
    let half = (stroke.width / 2) as i32;

    for i in 0..stroke.width as i32 {
        let inset = i - half;
        let width = bounds.width() as i32 - 2 * inset;
        let height = bounds.height() as i32 - 2 * inset;
        if width <= 0 || height <= 0 {
            continue;
        }
        let rect = Rect::at(bounds.left + inset, bounds.top + inset)
            .of_size(width as u32, height as u32);
        drawing::draw_hollow_rect_mut(&mut out, rect, stroke.color);
    }
    out
}

/// Draw a filled marker at every point inside the image. Points outside the
/// buffer are skipped; partial contours at crop edges are expected.
pub fn draw_points(image: &RgbaImage, points: &[Point], marker: Marker) -> RgbaImage {
    let mut out = image.clone();
    let (width, height) = (image.width() as f32, image.height() as f32);

    let mut skipped = 0;
    for p in points {
        if !(p.x >= 0.0 && p.y >= 0.0 && p.x < width && p.y < height) {
            skipped += 1;
            continue;
        }
        drawing::draw_filled_circle_mut(
            &mut out,
            (p.x.round() as i32, p.y.round() as i32),
            marker.radius as i32,
            marker.color,
        );
    }
    if skipped > 0 {
        log::debug!("skipped {} marker(s) outside {}x{}", skipped, width, height);
    }
    out
}

/// Ring positions used by [`draw_simulated_eye_markers`]: eight points per
/// eye on an ellipse, eyes placed 15% of the width either side of center and
/// 10% of the height above it.
pub fn simulated_eye_points(width: u32, height: u32) -> Vec<Point> {
    let (w, h) = (width as f32, height as f32);
    let (center_x, center_y) = (w / 2.0, h / 2.0);
    let eye_y = center_y - h * 0.1;

    let mut points = Vec::with_capacity(16);
    for eye_x in [center_x - w * 0.15, center_x + w * 0.15] {
        for i in 0..8 {
            let angle = i as f32 * std::f32::consts::TAU / 8.0;
            points.push(Point::new(
                eye_x + w * 0.08 * angle.cos(),
                eye_y + h * 0.05 * angle.sin(),
            ));
        }
    }
    points
}

/// Decorative placeholder for images where no face was ever found.
///
/// Draws two rings of markers where eyes would roughly sit in a framed
/// portrait so the fallback output looks like the contour output. The
/// markers are cosmetic and do not come from any detection.
pub fn draw_simulated_eye_markers(image: &RgbaImage, marker: Marker) -> RgbaImage {
    draw_points(image, &simulated_eye_points(image.width(), image.height()), marker)
}

/// Synthetic cartoon face used to check that a detector answers at all.
pub fn draw_probe_face() -> RgbaImage {
    let black = Rgba([0, 0, 0, 255]);
    let white = Rgba([255, 255, 255, 255]);

    let mut img = RgbaImage::from_pixel(100, 100, white);
    drawing::draw_filled_circle_mut(&mut img, (50, 50), 40, black);
    drawing::draw_filled_circle_mut(&mut img, (35, 40), 10, white);
    drawing::draw_filled_circle_mut(&mut img, (65, 40), 10, white);
    drawing::draw_filled_rect_mut(&mut img, Rect::at(35, 68).of_size(31, 5), white);
    img
}
