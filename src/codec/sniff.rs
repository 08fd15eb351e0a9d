//! Layout detection and decoding for label files of unknown provenance.
//!
//! Other annotation tools write boxes as YOLO rows, as bare corner or
//! corner+size rows in unit or pixel coordinates, or as VOC XML. A single
//! sample line is enough to pick one of these; every row of the file is then
//! decoded with that choice.

use std::fmt;

use serde::Serialize;

use super::yolo;
use crate::model::{ImageSize, NormalizedBox};

/// Detected label layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SniffedFormat {
    /// `class cx cy w h`, normalized.
    Yolo,
    /// `x1 y1 x2 y2` in `[0, 1]`, class leading or trailing.
    XyxyNorm,
    /// `x1 y1 x2 y2` in pixels.
    XyxyPix,
    /// `x y w h` (top-left plus size) in `[0, 1]`.
    XywhNorm,
    /// `x y w h` in pixels.
    XywhPix,
    VocXml,
    #[default]
    Unknown,
}

impl SniffedFormat {
    /// True for the pixel variants, which need the image size to normalize.
    pub fn needs_image_size(self) -> bool {
        matches!(self, SniffedFormat::XyxyPix | SniffedFormat::XywhPix)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SniffedFormat::Yolo => "YOLO",
            SniffedFormat::XyxyNorm => "XYXY_NORM",
            SniffedFormat::XyxyPix => "XYXY_PIX",
            SniffedFormat::XywhNorm => "XYWH_NORM",
            SniffedFormat::XywhPix => "XYWH_PIX",
            SniffedFormat::VocXml => "VOC_XML",
            SniffedFormat::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for SniffedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies one non-empty sample line.
///
/// Five or more tokens with an integer first token is YOLO. Otherwise, with
/// at least four numeric tokens, the first four are read as corners when the
/// third and fourth exceed the first and second, else as corner plus size;
/// the unit/pixel split depends on all four lying in `[0, 1]`.
pub fn sniff_line(line: &str) -> SniffedFormat {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return SniffedFormat::Unknown;
    }
    if trimmed.starts_with('<') {
        return SniffedFormat::VocXml;
    }

    let tokens: Vec<&str> = trimmed.split_whitespace().collect();
    if tokens.len() >= 5 && is_int(tokens[0]) {
        return SniffedFormat::Yolo;
    }

    let numeric = tokens.iter().filter(|token| token.parse::<f64>().is_ok()).count();
    if numeric < 4 {
        return SniffedFormat::Unknown;
    }

    let [a, b, c, d] = [0, 1, 2, 3].map(|i| lenient_f64(tokens.get(i).copied()));
    let unit = [a, b, c, d].iter().all(|v| (0.0..=1.0).contains(v));
    match (c > a && d > b, unit) {
        (true, true) => SniffedFormat::XyxyNorm,
        (true, false) => SniffedFormat::XyxyPix,
        (false, true) => SniffedFormat::XywhNorm,
        (false, false) => SniffedFormat::XywhPix,
    }
}

/// Decodes one line as `format`.
///
/// `Ok(None)` means the line was blank or its box clamped to nothing;
/// `Err` means the line is malformed or unusable (pixel units without a
/// known image size) and should be skipped.
pub fn decode_line(
    line: &str,
    format: SniffedFormat,
    image: Option<ImageSize>,
) -> Result<Option<NormalizedBox>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    match format {
        SniffedFormat::Yolo => Ok(yolo::parse_line(trimmed)?.and_then(|row| row.to_normalized())),
        SniffedFormat::XyxyNorm
        | SniffedFormat::XyxyPix
        | SniffedFormat::XywhNorm
        | SniffedFormat::XywhPix => decode_xy_line(trimmed, format, image),
        SniffedFormat::VocXml | SniffedFormat::Unknown => {
            Err(format!("{format} rows cannot be decoded line by line"))
        }
    }
}

/// Decodes every line of `text`, skipping malformed ones.
pub fn decode_text(
    text: &str,
    format: SniffedFormat,
    image: Option<ImageSize>,
) -> Vec<NormalizedBox> {
    let mut boxes = Vec::new();
    for (index, line) in text.lines().enumerate() {
        match decode_line(line, format, image) {
            Ok(Some(decoded)) => boxes.push(decoded),
            Ok(None) => {}
            Err(message) => log::debug!("skipping line {}: {message}", index + 1),
        }
    }
    boxes
}

/// Fuzz-only entrypoint: sniff the first non-blank line, then decode everything.
#[cfg(feature = "fuzzing")]
pub fn fuzz_sniff_and_decode(input: &str) {
    let first = input.lines().find(|line| !line.trim().is_empty()).unwrap_or("");
    let format = sniff_line(first);
    let _ = decode_text(input, format, None);
    let _ = decode_text(input, format, Some(ImageSize::new(640, 480)));
}

fn decode_xy_line(
    line: &str,
    format: SniffedFormat,
    image: Option<ImageSize>,
) -> Result<Option<NormalizedBox>, String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 4 {
        return Err(format!("expected at least 4 tokens, found {}", tokens.len()));
    }

    let (class, coords) = if tokens.len() >= 5 && is_int(tokens[0]) {
        (tokens[0].parse::<i32>().unwrap_or(0), &tokens[1..5])
    } else {
        let class = tokens
            .get(4)
            .and_then(|raw| raw.parse::<i32>().ok())
            .unwrap_or(0);
        (class, &tokens[0..4])
    };

    let mut values = [0.0_f64; 4];
    for (slot, raw) in values.iter_mut().zip(coords) {
        *slot = raw
            .parse::<f64>()
            .map_err(|_| format!("invalid coordinate '{raw}'"))?;
    }
    let [mut p, mut q, mut r, mut s] = values;

    if format.needs_image_size() {
        let image = image
            .filter(|size| !size.is_empty())
            .ok_or_else(|| "pixel coordinates need the image size".to_string())?;
        let (w, h) = (image.width as f64, image.height as f64);
        p /= w;
        q /= h;
        r /= w;
        s /= h;
    }

    let is_xyxy = matches!(format, SniffedFormat::XyxyNorm | SniffedFormat::XyxyPix);
    let (x1, y1, x2, y2) = if is_xyxy {
        (p, q, r, s)
    } else {
        (p, q, p + r, q + s)
    };

    Ok(NormalizedBox::new(x1, y1, x2, y2, class))
}

fn is_int(token: &str) -> bool {
    token.parse::<i32>().is_ok()
}

fn lenient_f64(token: Option<&str>) -> f64 {
    token.and_then(|raw| raw.parse::<f64>().ok()).unwrap_or(0.0)
}
