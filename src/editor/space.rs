//! Image-space ↔ display-space mapping under pan and zoom.

use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Uniform scale plus translation from image pixels to viewport pixels.
///
/// `display = image * scale + offset`. The scale is kept strictly positive
/// so the transform is always invertible.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoordinateSpace {
    /// Translation in display pixels.
    pub offset: Vec2,
    scale: f64,
    /// Lower zoom limit.
    pub min_scale: f64,
    /// Upper zoom limit.
    pub max_scale: f64,
}

impl Default for CoordinateSpace {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            scale: 1.0,
            min_scale: 0.01,
            max_scale: 100.0,
        }
    }
}

impl CoordinateSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a space with an explicit scale and offset.
    ///
    /// A non-positive or non-finite `scale` falls back to `1.0`.
    pub fn with_transform(scale: f64, offset: Vec2) -> Self {
        let scale = if scale.is_finite() && scale > 0.0 {
            scale
        } else {
            1.0
        };
        Self {
            offset,
            scale,
            ..Self::default()
        }
    }

    #[inline]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Affine transform from image space to display space.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.offset) * Affine::scale(self.scale)
    }

    #[inline]
    pub fn to_display(&self, image_point: Point) -> Point {
        Point::new(
            image_point.x * self.scale + self.offset.x,
            image_point.y * self.scale + self.offset.y,
        )
    }

    #[inline]
    pub fn to_image(&self, display_point: Point) -> Point {
        Point::new(
            (display_point.x - self.offset.x) / self.scale,
            (display_point.y - self.offset.y) / self.scale,
        )
    }

    /// Projects an image-space rectangle to display space.
    pub fn rect_to_display(&self, rect: Rect) -> Rect {
        Rect::from_points(
            self.to_display(rect.origin()),
            self.to_display(Point::new(rect.x1, rect.y1)),
        )
    }

    /// Pans by a delta in display pixels.
    pub fn pan(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    /// Rescales by `factor` keeping `anchor` fixed on screen.
    ///
    /// Non-positive or non-finite factors are ignored; the resulting scale is
    /// clamped to `[min_scale, max_scale]`.
    pub fn zoom_at(&mut self, anchor: Point, factor: f64) {
        if !(factor.is_finite() && factor > 0.0) {
            log::debug!("ignoring zoom factor {factor}");
            return;
        }

        let new_scale = (self.scale * factor).clamp(self.min_scale, self.max_scale);
        if (new_scale - self.scale).abs() < f64::EPSILON {
            return;
        }

        let image_anchor = self.to_image(anchor);
        self.scale = new_scale;
        let moved = self.to_display(image_anchor);
        self.offset += Vec2::new(anchor.x - moved.x, anchor.y - moved.y);
    }

    /// Fits an image into the viewport keeping its aspect ratio, centred.
    pub fn fit(&mut self, image: Size, viewport: Size) {
        let degenerate = |size: Size| size.width <= 0.0 || size.height <= 0.0;
        if degenerate(image) || degenerate(viewport) {
            *self = Self {
                min_scale: self.min_scale,
                max_scale: self.max_scale,
                ..Self::default()
            };
            return;
        }

        let scale = (viewport.width / image.width)
            .min(viewport.height / image.height)
            .clamp(self.min_scale, self.max_scale);
        self.scale = scale;
        self.offset = Vec2::new(
            (viewport.width - image.width * scale) / 2.0,
            (viewport.height - image.height * scale) / 2.0,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_by_default() {
        let space = CoordinateSpace::new();
        let p = Point::new(12.0, 34.0);
        assert_eq!(space.to_display(p), p);
        assert_eq!(space.to_image(p), p);
    }

    #[test]
    fn roundtrip_with_pan_and_zoom() {
        let space = CoordinateSpace::with_transform(1.5, Vec2::new(30.0, -20.0));
        let original = Point::new(123.0, 456.0);
        let back = space.to_image(space.to_display(original));
        assert!((back.x - original.x).abs() < 1e-10);
        assert!((back.y - original.y).abs() < 1e-10);

        let affine = space.transform() * original;
        let direct = space.to_display(original);
        assert!((affine.x - direct.x).abs() < 1e-10);
        assert!((affine.y - direct.y).abs() < 1e-10);
    }

    #[test]
    fn zoom_keeps_anchor_fixed() {
        let mut space = CoordinateSpace::with_transform(2.0, Vec2::new(10.0, 5.0));
        let anchor = Point::new(200.0, 150.0);
        let under_anchor = space.to_image(anchor);

        space.zoom_at(anchor, 1.7);

        assert!((space.scale() - 3.4).abs() < 1e-12);
        let after = space.to_display(under_anchor);
        assert!((after.x - anchor.x).abs() < 1e-9);
        assert!((after.y - anchor.y).abs() < 1e-9);
    }

    #[test]
    fn non_positive_zoom_is_ignored() {
        let mut space = CoordinateSpace::new();
        space.zoom_at(Point::ZERO, 0.0);
        space.zoom_at(Point::ZERO, -2.0);
        space.zoom_at(Point::ZERO, f64::NAN);
        assert_eq!(space.scale(), 1.0);
    }

    #[test]
    fn fit_centres_image() {
        let mut space = CoordinateSpace::new();
        space.fit(Size::new(1000.0, 500.0), Size::new(500.0, 500.0));
        assert!((space.scale() - 0.5).abs() < 1e-12);
        assert!((space.offset.x - 0.0).abs() < 1e-12);
        assert!((space.offset.y - 125.0).abs() < 1e-12);
    }
}
