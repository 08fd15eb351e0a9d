//! Axis-aligned bounding boxes in XYXY form.

use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use super::{Normalized, Pixel};

/// An axis-aligned bounding box stored as `(x1, y1, x2, y2)`.
///
/// The constructor does not reorder corners; decoders build boxes straight
/// from file values and then decide with [`is_degenerate`](Self::is_degenerate)
/// whether to keep them.
#[derive(Clone, Copy, PartialEq)]
pub struct BBoxXYXY<TSpace> {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    _space: PhantomData<TSpace>,
}

impl<TSpace> BBoxXYXY<TSpace> {
    /// Creates a box from explicit corner coordinates.
    #[inline]
    pub fn from_xyxy(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            _space: PhantomData,
        }
    }

    /// Creates a box from a top-left corner plus width and height.
    #[inline]
    pub fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::from_xyxy(x, y, x + width, y + height)
    }

    /// Creates a box from its centre point plus width and height (YOLO layout).
    #[inline]
    pub fn from_cxcywh(cx: f64, cy: f64, width: f64, height: f64) -> Self {
        let half_w = width / 2.0;
        let half_h = height / 2.0;
        Self::from_xyxy(cx - half_w, cy - half_h, cx + half_w, cy + half_h)
    }

    /// Returns `(cx, cy, width, height)`.
    #[inline]
    pub fn to_cxcywh(&self) -> (f64, f64, f64, f64) {
        (
            (self.x1 + self.x2) / 2.0,
            (self.y1 + self.y2) / 2.0,
            self.width(),
            self.height(),
        )
    }

    /// Width of the box; negative when the corners are inverted.
    #[inline]
    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    /// Height of the box; negative when the corners are inverted.
    #[inline]
    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    /// Area clamped at zero for inverted boxes.
    #[inline]
    pub fn area(&self) -> f64 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// Returns true if all coordinates are finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x1.is_finite() && self.y1.is_finite() && self.x2.is_finite() && self.y2.is_finite()
    }

    /// Returns true when `x2 <= x1` or `y2 <= y1` (or any value is not finite).
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        !self.is_finite() || self.x2 <= self.x1 || self.y2 <= self.y1
    }

    /// Area of the overlap with `other`, zero when disjoint.
    pub fn intersection_area(&self, other: &Self) -> f64 {
        let iw = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let ih = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        iw * ih
    }

    /// Intersection over union.
    ///
    /// Returns `0.0` for disjoint boxes and whenever the union is empty, so a
    /// degenerate input never produces NaN.
    pub fn iou(&self, other: &Self) -> f64 {
        let inter = self.intersection_area(other);
        if inter <= 0.0 {
            return 0.0;
        }
        let union = self.area() + other.area() - inter;
        if union > 0.0 {
            inter / union
        } else {
            0.0
        }
    }
}

impl BBoxXYXY<Pixel> {
    /// Converts pixel coordinates to fractions of the image size.
    pub fn to_normalized(&self, image_width: f64, image_height: f64) -> BBoxXYXY<Normalized> {
        BBoxXYXY::from_xyxy(
            self.x1 / image_width,
            self.y1 / image_height,
            self.x2 / image_width,
            self.y2 / image_height,
        )
    }

    /// Builds a pixel box from an image-space rectangle.
    pub fn from_rect(rect: kurbo::Rect) -> Self {
        Self::from_xyxy(rect.x0, rect.y0, rect.x1, rect.y1)
    }

    /// Returns the box as an image-space rectangle.
    pub fn to_rect(&self) -> kurbo::Rect {
        kurbo::Rect::new(self.x1, self.y1, self.x2, self.y2)
    }
}

impl BBoxXYXY<Normalized> {
    /// Converts normalized coordinates back to pixels.
    pub fn to_pixel(&self, image_width: f64, image_height: f64) -> BBoxXYXY<Pixel> {
        BBoxXYXY::from_xyxy(
            self.x1 * image_width,
            self.y1 * image_height,
            self.x2 * image_width,
            self.y2 * image_height,
        )
    }

    /// Clamps every coordinate into `[0, 1]`.
    pub fn clamp_unit(&self) -> Self {
        Self::from_xyxy(
            self.x1.clamp(0.0, 1.0),
            self.y1.clamp(0.0, 1.0),
            self.x2.clamp(0.0, 1.0),
            self.y2.clamp(0.0, 1.0),
        )
    }
}

impl<TSpace> std::fmt::Debug for BBoxXYXY<TSpace> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BBoxXYXY")
            .field("x1", &self.x1)
            .field("y1", &self.y1)
            .field("x2", &self.x2)
            .field("y2", &self.y2)
            .finish()
    }
}

impl<TSpace> Default for BBoxXYXY<TSpace> {
    fn default() -> Self {
        Self::from_xyxy(0.0, 0.0, 0.0, 0.0)
    }
}

// Custom serde implementation to avoid TSpace: Serialize/Deserialize bounds
impl<TSpace> Serialize for BBoxXYXY<TSpace> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("BBoxXYXY", 4)?;
        state.serialize_field("x1", &self.x1)?;
        state.serialize_field("y1", &self.y1)?;
        state.serialize_field("x2", &self.x2)?;
        state.serialize_field("y2", &self.y2)?;
        state.end()
    }
}

impl<'de, TSpace> Deserialize<'de> for BBoxXYXY<TSpace> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct BBoxData {
            x1: f64,
            y1: f64,
            x2: f64,
            y2: f64,
        }
        let data = BBoxData::deserialize(deserializer)?;
        Ok(BBoxXYXY::from_xyxy(data.x1, data.y1, data.x2, data.y2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cxcywh_roundtrip() {
        let bbox: BBoxXYXY<Normalized> = BBoxXYXY::from_cxcywh(0.5, 0.25, 0.2, 0.1);
        assert!((bbox.x1 - 0.4).abs() < 1e-12);
        assert!((bbox.y1 - 0.2).abs() < 1e-12);
        let (cx, cy, w, h) = bbox.to_cxcywh();
        assert!((cx - 0.5).abs() < 1e-12);
        assert!((cy - 0.25).abs() < 1e-12);
        assert!((w - 0.2).abs() < 1e-12);
        assert!((h - 0.1).abs() < 1e-12);
    }

    #[test]
    fn iou_identity_and_disjoint() {
        let a: BBoxXYXY<Normalized> = BBoxXYXY::from_xyxy(0.1, 0.1, 0.4, 0.5);
        let b: BBoxXYXY<Normalized> = BBoxXYXY::from_xyxy(0.6, 0.6, 0.9, 0.9);
        assert_eq!(a.iou(&a), 1.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn iou_of_degenerate_box_is_zero() {
        let a: BBoxXYXY<Normalized> = BBoxXYXY::from_xyxy(0.2, 0.2, 0.2, 0.6);
        assert_eq!(a.iou(&a), 0.0);
    }

    #[test]
    fn iou_matches_hand_computed_overlap() {
        let a: BBoxXYXY<Normalized> = BBoxXYXY::from_xyxy(0.0, 0.0, 0.5, 0.5);
        let b: BBoxXYXY<Normalized> = BBoxXYXY::from_xyxy(0.01, 0.01, 0.49, 0.49);
        let expected = (0.48 * 0.48) / (0.25);
        assert!((a.iou(&b) - expected).abs() < 1e-12);
        assert!(a.iou(&b) > 0.9);
    }

    #[test]
    fn degenerate_detection() {
        let ok: BBoxXYXY<Pixel> = BBoxXYXY::from_xyxy(1.0, 1.0, 2.0, 2.0);
        let flat: BBoxXYXY<Pixel> = BBoxXYXY::from_xyxy(1.0, 1.0, 1.0, 2.0);
        let nan: BBoxXYXY<Pixel> = BBoxXYXY::from_xyxy(f64::NAN, 1.0, 2.0, 2.0);
        assert!(!ok.is_degenerate());
        assert!(flat.is_degenerate());
        assert!(nan.is_degenerate());
    }

    #[test]
    fn clamp_unit_limits_all_edges() {
        let bbox: BBoxXYXY<Normalized> = BBoxXYXY::from_xyxy(-0.2, 0.1, 1.4, 0.9);
        let clamped = bbox.clamp_unit();
        assert_eq!(clamped.x1, 0.0);
        assert_eq!(clamped.x2, 1.0);
        assert_eq!(clamped.y1, 0.1);
    }

    #[test]
    fn pixel_normalized_conversion() {
        let px: BBoxXYXY<Pixel> = BBoxXYXY::from_xyxy(100.0, 100.0, 300.0, 250.0);
        let norm = px.to_normalized(1000.0, 800.0);
        assert!((norm.x1 - 0.1).abs() < 1e-12);
        assert!((norm.y2 - 0.3125).abs() < 1e-12);
        let back = norm.to_pixel(1000.0, 800.0);
        assert!((back.x2 - 300.0).abs() < 1e-9);
    }
}
