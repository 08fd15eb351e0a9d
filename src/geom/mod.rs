//! Typed geometry shared by the codec and the reconciliation engine.
//!
//! Boxes carry a zero-sized marker for the coordinate space they live in,
//! so pixel and normalized values cannot be mixed by accident. The editor
//! works on [`kurbo::Rect`] in image space and converts at the codec seam.
//!
//! # Example
//!
//! ```
//! use boxlab::geom::{BBoxXYXY, Normalized};
//!
//! let a = BBoxXYXY::<Normalized>::from_xyxy(0.0, 0.0, 0.5, 0.5);
//! let b = BBoxXYXY::<Normalized>::from_xyxy(0.25, 0.0, 0.75, 0.5);
//! assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-12);
//! ```

mod bbox;

pub use bbox::BBoxXYXY;

/// Image-space pixels, origin at the top-left corner. Values need not be integral.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Pixel {}

/// Fractions of the image width and height.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Normalized {}
