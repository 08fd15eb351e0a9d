#![allow(dead_code)]

use boxlab::model::{ImageSize, NormalizedBox};
use kurbo::{Point, Rect};
use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

/// YOLO stores six decimals of a normalized value.
pub fn eps_yolo(image: ImageSize) -> f64 {
    image.width.max(image.height) as f64 * 1e-6
}

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

pub fn arb_image_size() -> impl Strategy<Value = ImageSize> {
    (16u32..2048, 16u32..2048).prop_map(|(w, h)| ImageSize::new(w, h))
}

/// Any point, including well outside a typical image.
pub fn arb_point() -> impl Strategy<Value = Point> {
    (-500.0f64..2500.0, -500.0f64..2500.0).prop_map(|(x, y)| Point::new(x, y))
}

/// Unordered corners, possibly inverted or off-image.
pub fn arb_raw_rect() -> impl Strategy<Value = Rect> {
    (arb_point(), arb_point()).prop_map(|(a, b)| Rect::new(a.x, a.y, b.x, b.y))
}

/// A box strictly inside `image`, at least two pixels on each side.
pub fn arb_rect_inside(image: ImageSize) -> impl Strategy<Value = Rect> {
    let w = image.width as f64;
    let h = image.height as f64;
    (0.0..w - 2.0, 0.0..h - 2.0)
        .prop_flat_map(move |(x0, y0)| (Just(x0), Just(y0), x0 + 2.0..=w, y0 + 2.0..=h))
        .prop_map(|(x0, y0, x1, y1)| Rect::new(x0, y0, x1, y1))
}

pub fn arb_normalized_box() -> impl Strategy<Value = NormalizedBox> {
    (0.0f64..0.95, 0.0f64..0.95, 0.01f64..0.5, 0.01f64..0.5, 0i32..5).prop_filter_map(
        "degenerate box",
        |(x, y, w, h, class)| {
            NormalizedBox::new(x, y, (x + w).min(1.0), (y + h).min(1.0), class)
        },
    )
}

pub fn arb_box_set(max: usize) -> impl Strategy<Value = Vec<NormalizedBox>> {
    prop::collection::vec(arb_normalized_box(), 0..=max)
}
