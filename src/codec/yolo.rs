//! YOLO text labels: `<class> <cx> <cy> <w> <h>` per line, normalized.

use std::fmt::Write as _;

use crate::geom::{BBoxXYXY, Pixel};
use crate::model::{ImageSize, LabeledBox, NormalizedBox};

pub const LABEL_EXTENSION: &str = "txt";

/// One parsed YOLO row, before clamping.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct YoloRow {
    pub class: i32,
    pub cx: f64,
    pub cy: f64,
    pub w: f64,
    pub h: f64,
}

impl YoloRow {
    /// Canonical box for this row, or `None` if it clamps to nothing.
    pub fn to_normalized(&self) -> Option<NormalizedBox> {
        NormalizedBox::from_bbox(
            BBoxXYXY::from_cxcywh(self.cx, self.cy, self.w, self.h),
            self.class,
        )
    }
}

/// Encodes labeled boxes as YOLO lines with six decimals.
///
/// Unlabeled boxes are skipped and every box is clipped to the image first.
pub fn encode(boxes: &[LabeledBox], image: ImageSize) -> String {
    let mut out = String::new();
    if image.is_empty() {
        return out;
    }

    let bounds = image.bounds();
    for labeled in boxes.iter().filter(|b| b.class.is_labeled()) {
        let clipped = labeled.rect.intersect(bounds);
        let (cx, cy, w, h) = BBoxXYXY::<Pixel>::from_rect(clipped)
            .to_normalized(image.width as f64, image.height as f64)
            .to_cxcywh();

        writeln!(out, "{} {:.6} {:.6} {:.6} {:.6}", labeled.class, cx, cy, w, h)
            .expect("write to string");
    }
    out
}

/// Parses a single YOLO line. Blank lines give `Ok(None)`.
///
/// Extra trailing tokens (confidence scores, for instance) are ignored.
pub fn parse_line(line: &str) -> Result<Option<YoloRow>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let tokens: Vec<&str> = trimmed.split_whitespace().take(5).collect();
    if tokens.len() < 5 {
        return Err(format!("expected 5 tokens, found {}", tokens.len()));
    }

    let class = tokens[0]
        .parse::<i32>()
        .map_err(|_| format!("invalid class '{}'; expected integer", tokens[0]))?;

    Ok(Some(YoloRow {
        class,
        cx: parse_f64_token(tokens[1], "x_center")?,
        cy: parse_f64_token(tokens[2], "y_center")?,
        w: parse_f64_token(tokens[3], "width")?,
        h: parse_f64_token(tokens[4], "height")?,
    }))
}

fn parse_f64_token(raw: &str, field_name: &str) -> Result<f64, String> {
    raw.parse::<f64>()
        .map_err(|_| format!("invalid {field_name} '{raw}'; expected floating-point number"))
}
