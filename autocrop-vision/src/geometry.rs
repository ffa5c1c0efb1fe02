use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Fraction of the face box added on every side before drawing or cropping.
pub const DEFAULT_PADDING: f32 = 0.2;

/// Share of width and height kept by the no-face fallback crop.
pub const DEFAULT_KEEP: f32 = 0.7;

/// Vertical placement of the fallback crop: the top third of the slack goes
/// above the crop, so the window sits higher than a centered one.
pub const TOP_THIRD_BIAS: f32 = 1.0 / 3.0;

/// Axis-aligned integer rectangle in pixel coordinates, right/bottom exclusive.
///
/// Detectors may report coordinates outside the image (a face cut by the
/// frame edge), so the fields are signed. [`BoundingBox::clamp_to`] brings a
/// box into `[0,width]×[0,height]` and is applied by every operation that
/// produces a box for drawing or cropping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl BoundingBox {
    /// Build a box from two corners, swapping coordinates if needed so that
    /// `left <= right` and `top <= bottom`.
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left: left.min(right),
            top: top.min(bottom),
            right: left.max(right),
            bottom: top.max(bottom),
        }
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top).max(0) as u32
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn contains(&self, other: &BoundingBox) -> bool {
        self.left <= other.left
            && self.top <= other.top
            && self.right >= other.right
            && self.bottom >= other.bottom
    }

    /// Clamp every coordinate into `[0,width]×[0,height]` without inverting.
    pub fn clamp_to(&self, width: u32, height: u32) -> BoundingBox {
        let max_x = i32::try_from(width).unwrap_or(i32::MAX);
        let max_y = i32::try_from(height).unwrap_or(i32::MAX);

        let left = self.left.clamp(0, max_x);
        let top = self.top.clamp(0, max_y);
        BoundingBox {
            left,
            top,
            right: self.right.clamp(0, max_x).max(left),
            bottom: self.bottom.clamp(0, max_y).max(top),
        }
    }
}

/// A 2D point in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Grow `bounds` by `fraction` of its own width/height on each side and clamp
/// the result to the image.
///
/// The per-side padding is truncated to whole pixels. A side that already
/// touches (or crosses) the image edge saturates at `0`, `image_width` or
/// `image_height`. Negative or NaN fractions are treated as zero.
pub fn pad(bounds: BoundingBox, image_width: u32, image_height: u32, fraction: f32) -> BoundingBox {
    let fraction = fraction.max(0.0);
    let pad_x = (bounds.width() as f32 * fraction) as i32;
    let pad_y = (bounds.height() as f32 * fraction) as i32;

    BoundingBox {
        left: bounds.left.saturating_sub(pad_x),
        top: bounds.top.saturating_sub(pad_y),
        right: bounds.right.saturating_add(pad_x),
        bottom: bounds.bottom.saturating_add(pad_y),
    }
    .clamp_to(image_width, image_height)
}

/// Shift every point by `(-offset_x, -offset_y)`.
///
/// Used to move contour points from original-image space into the local
/// space of a crop whose top-left corner is `(offset_x, offset_y)`.
pub fn translate(points: &[Point], offset_x: f32, offset_y: f32) -> Vec<Point> {
    points
        .iter()
        .map(|p| Point::new(p.x - offset_x, p.y - offset_y))
        .collect()
}

/// Window used when no face was found: `keep` of each dimension, centered
/// horizontally, with `vertical_bias` of the vertical slack above it.
///
/// Each side keeps at least one pixel of a non-empty image.
pub fn center_crop(width: u32, height: u32, keep: f32, vertical_bias: f32) -> BoundingBox {
    let keep = if keep.is_finite() { keep.clamp(0.0, 1.0) } else { 1.0 };
    let crop_width = ((width as f32 * keep) as u32).max(1).min(width);
    let crop_height = ((height as f32 * keep) as u32).max(1).min(height);

    let left = width.saturating_sub(crop_width) / 2;
    let slack = height.saturating_sub(crop_height);
    let top = (slack as f64 * vertical_bias.clamp(0.0, 1.0) as f64).floor() as u32;

    BoundingBox {
        left: left as i32,
        top: top as i32,
        right: (left + crop_width) as i32,
        bottom: (top + crop_height) as i32,
    }
    .clamp_to(width, height)
}

/// Copy the region under `bounds` (clamped to the image) into a new buffer.
pub fn crop(image: &RgbaImage, bounds: &BoundingBox) -> RgbaImage {
    let region = bounds.clamp_to(image.width(), image.height());
    image::imageops::crop_imm(
        image,
        region.left as u32,
        region.top as u32,
        region.width(),
        region.height(),
    )
    .to_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn pad_adds_twenty_percent_each_side() {
        let padded = pad(BoundingBox::new(100, 100, 200, 200), 400, 400, DEFAULT_PADDING);
        assert_eq!(padded, BoundingBox::new(80, 80, 220, 220));
        assert_eq!(padded.width(), 140);
    }

    #[test]
    fn pad_saturates_at_corners() {
        let padded = pad(BoundingBox::new(0, 0, 50, 50), 60, 60, DEFAULT_PADDING);
        assert_eq!(padded, BoundingBox::new(0, 0, 60, 60));
    }

    #[test]
    fn pad_handles_box_outside_image() {
        let padded = pad(BoundingBox::new(-30, 500, -10, 520), 400, 400, DEFAULT_PADDING);
        assert!(padded.left <= padded.right);
        assert!(padded.top <= padded.bottom);
        assert!(padded.is_empty());
    }

    #[test]
    fn new_normalizes_corner_order() {
        let b = BoundingBox::new(20, 30, 10, 5);
        assert_eq!(b, BoundingBox { left: 10, top: 5, right: 20, bottom: 30 });
    }

    #[test]
    fn center_crop_biases_toward_top_third() {
        let b = center_crop(400, 1000, DEFAULT_KEEP, TOP_THIRD_BIAS);
        let crop_height = (1000.0_f32 * 0.7) as u32;
        assert_eq!(b.height(), crop_height);
        assert_eq!(b.top as u32, (1000 - crop_height) / 3);
        assert_ne!(b.top as u32, (1000 - crop_height) / 2);
        assert_eq!(b.left, (400 - 280) / 2);
    }

    #[test]
    fn center_crop_keeps_a_pixel_of_thin_images() {
        let b = center_crop(1, 1, DEFAULT_KEEP, TOP_THIRD_BIAS);
        assert_eq!(b, BoundingBox::new(0, 0, 1, 1));

        let b = center_crop(300, 1, DEFAULT_KEEP, TOP_THIRD_BIAS);
        assert_eq!(b.height(), 1);
        assert!(!b.is_empty());

        assert!(center_crop(0, 10, DEFAULT_KEEP, TOP_THIRD_BIAS).is_empty());
    }

    #[test]
    fn crop_extracts_region() {
        let mut img = RgbaImage::new(10, 10);
        img.put_pixel(3, 4, image::Rgba([1, 2, 3, 255]));
        let out = crop(&img, &BoundingBox::new(3, 4, 8, 10));
        assert_eq!(out.dimensions(), (5, 6));
        assert_eq!(out.get_pixel(0, 0).0, [1, 2, 3, 255]);
    }

    fn edge_box() -> impl Strategy<Value = (BoundingBox, u32, u32)> {
        (20u32..800, 20u32..800).prop_flat_map(|(w, h)| {
            (0..w, 0..h).prop_flat_map(move |(l, t)| {
                (l + 1..=w, t + 1..=h).prop_map(move |(r, b)| {
                    (BoundingBox::new(l as i32, t as i32, r as i32, b as i32), w, h)
                })
            })
        })
    }

    proptest! {
        #[test]
        fn pad_contains_original_and_stays_in_image(
            (bounds, w, h) in edge_box(),
            fraction in 0.0f32..1.0,
        ) {
            let padded = pad(bounds, w, h, fraction);
            prop_assert!(padded.contains(&bounds));
            prop_assert!(BoundingBox::new(0, 0, w as i32, h as i32).contains(&padded));
        }

        #[test]
        fn pad_never_inverts(
            w in 1u32..500,
            h in 1u32..500,
            size in 1i32..200,
            corner in 0usize..8,
            fraction in 0.0f32..2.0,
        ) {
            // Boxes pinned to each edge and each corner, possibly overhanging.
            let (wi, hi) = (w as i32, h as i32);
            let (l, t) = match corner {
                0 => (0, 0),
                1 => (wi - size, 0),
                2 => (0, hi - size),
                3 => (wi - size, hi - size),
                4 => (wi / 2, 0),
                5 => (wi / 2, hi - size),
                6 => (0, hi / 2),
                _ => (wi - size, hi / 2),
            };
            let padded = pad(BoundingBox::new(l, t, l + size, t + size), w, h, fraction);
            prop_assert!(padded.left <= padded.right);
            prop_assert!(padded.top <= padded.bottom);
            prop_assert!(padded.left >= 0 && padded.right <= wi);
            prop_assert!(padded.top >= 0 && padded.bottom <= hi);
        }

        #[test]
        fn translate_then_restore_is_identity(
            points in proptest::collection::vec((-2000.0f32..2000.0, -2000.0f32..2000.0), 0..32),
            ox in -500.0f32..500.0,
            oy in -500.0f32..500.0,
        ) {
            let points: Vec<Point> = points.into_iter().map(|(x, y)| Point::new(x, y)).collect();
            let restored = translate(&translate(&points, ox, oy), -ox, -oy);
            prop_assert_eq!(restored.len(), points.len());
            for (a, b) in restored.iter().zip(&points) {
                prop_assert!((a.x - b.x).abs() < 1e-2);
                prop_assert!((a.y - b.y).abs() < 1e-2);
            }
        }

        #[test]
        fn center_crop_top_is_a_third_of_slack(w in 1u32..4000, h in 1u32..4000) {
            let b = center_crop(w, h, DEFAULT_KEEP, TOP_THIRD_BIAS);
            let crop_height = (h as f32 * DEFAULT_KEEP) as u32;
            prop_assert_eq!(b.top as u32, (h - crop_height) / 3);
            prop_assert_eq!(b.height(), crop_height);
        }
    }
}
