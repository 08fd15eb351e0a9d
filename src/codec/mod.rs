//! On-disk label formats.
//!
//! Encoding covers the two save formats of the editor ([`LabelFormat`]).
//! Decoding is broader: [`decode_label_file`] accepts YOLO, bare XYXY/XYWH
//! rows in normalized or pixel units, and VOC XML, sniffing the layout from
//! the file itself, and always yields canonical [`NormalizedBox`] values.

pub mod sniff;
pub mod voc;
pub mod yolo;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BoxlabError;
use crate::model::{ClassList, ImageSize, LabeledBox, NormalizedBox};

pub use sniff::{decode_line, decode_text, sniff_line, SniffedFormat};

/// Format the editor saves in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelFormat {
    #[default]
    Yolo,
    Voc,
}

impl LabelFormat {
    /// File extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            LabelFormat::Yolo => yolo::LABEL_EXTENSION,
            LabelFormat::Voc => voc::LABEL_EXTENSION,
        }
    }

    /// Directory used under the image directory when no save directory is set.
    pub fn default_subdir(self) -> &'static str {
        match self {
            LabelFormat::Yolo => "labels_yolo/train",
            LabelFormat::Voc => "labels_voc/train",
        }
    }

    /// Serializes boxes into the file body for this format.
    pub fn encode(self, boxes: &[LabeledBox], image: ImageSize, classes: &ClassList) -> String {
        match self {
            LabelFormat::Yolo => yolo::encode(boxes, image),
            LabelFormat::Voc => voc::encode(boxes, image, classes),
        }
    }
}

impl fmt::Display for LabelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelFormat::Yolo => f.write_str("yolo"),
            LabelFormat::Voc => f.write_str("voc"),
        }
    }
}

impl FromStr for LabelFormat {
    type Err = BoxlabError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "yolo" | "txt" => Ok(LabelFormat::Yolo),
            "voc" | "pascalvoc" | "pascal-voc" | "xml" => Ok(LabelFormat::Voc),
            other => Err(BoxlabError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// `{dir}/{stem}.{txt|xml}`.
pub fn label_path(dir: &Path, stem: &str, format: LabelFormat) -> PathBuf {
    dir.join(format!("{stem}.{}", format.extension()))
}

/// Writes the full box list of one image, creating `dir` if needed.
pub fn write_labels(
    dir: &Path,
    stem: &str,
    format: LabelFormat,
    boxes: &[LabeledBox],
    image: ImageSize,
    classes: &ClassList,
) -> Result<PathBuf, BoxlabError> {
    fs::create_dir_all(dir).map_err(|source| BoxlabError::SaveDirCreate {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = label_path(dir, stem, format);
    let body = format.encode(boxes, image, classes);
    fs::write(&path, body).map_err(|source| BoxlabError::LabelWrite {
        path: path.clone(),
        source,
    })?;

    Ok(path)
}

/// Boxes decoded from one label file.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DecodedLabels {
    pub format: SniffedFormat,
    pub boxes: Vec<NormalizedBox>,
}

/// Detects the layout of a label file.
///
/// `.xml` files are VOC; anything else is classified from its first
/// non-empty line. An empty text file is [`SniffedFormat::Unknown`].
pub fn sniff_file(path: &Path) -> Result<SniffedFormat, BoxlabError> {
    if voc::has_xml_extension(path) {
        return Ok(SniffedFormat::VocXml);
    }

    let text = fs::read_to_string(path).map_err(BoxlabError::Io)?;
    Ok(text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(sniff_line)
        .unwrap_or(SniffedFormat::Unknown))
}

/// Decodes a label file of unknown provenance.
///
/// Never fails: a file that cannot be read, or whose layout cannot be
/// detected, yields an empty set and a warning. `image` is needed only for
/// pixel-unit layouts; without it those rows are dropped.
pub fn decode_label_file(path: &Path, image: Option<ImageSize>) -> DecodedLabels {
    match sniff_file(path) {
        Ok(format) => decode_label_file_as(path, format, image),
        Err(err) => {
            log::warn!("treating {} as empty: {err}", path.display());
            DecodedLabels::default()
        }
    }
}

/// Decodes `path` as an already-sniffed `format`.
pub fn decode_label_file_as(
    path: &Path,
    format: SniffedFormat,
    image: Option<ImageSize>,
) -> DecodedLabels {
    let empty = DecodedLabels {
        format,
        boxes: Vec::new(),
    };

    match format {
        SniffedFormat::Unknown => {
            let blank = fs::read_to_string(path)
                .map(|text| text.trim().is_empty())
                .unwrap_or(false);
            if blank {
                log::debug!("{} has no labels", path.display());
            } else {
                log::warn!("unrecognized label layout in {}; treating as empty", path.display());
            }
            empty
        }
        SniffedFormat::VocXml => match voc::read(path) {
            Ok(document) => DecodedLabels {
                format,
                boxes: document.normalized(),
            },
            Err(err) => {
                log::warn!("treating {} as empty: {err}", path.display());
                empty
            }
        },
        _ => {
            if format.needs_image_size() && image.is_none() {
                log::warn!(
                    "{} uses pixel coordinates but no image size is known; all rows dropped",
                    path.display()
                );
                return empty;
            }
            match fs::read_to_string(path) {
                Ok(text) => DecodedLabels {
                    format,
                    boxes: decode_text(&text, format, image),
                },
                Err(err) => {
                    log::warn!("treating {} as empty: {err}", path.display());
                    empty
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Rect;

    #[test]
    fn label_format_parses_aliases() {
        assert_eq!("YOLO".parse::<LabelFormat>().unwrap(), LabelFormat::Yolo);
        assert_eq!("PascalVOC".parse::<LabelFormat>().unwrap(), LabelFormat::Voc);
        assert!(matches!(
            "coco".parse::<LabelFormat>(),
            Err(BoxlabError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn write_labels_creates_directory() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let dir = temp.path().join("labels_yolo").join("train");
        let boxes = [LabeledBox::new(Rect::new(100.0, 100.0, 300.0, 250.0), 0)];

        let path = write_labels(
            &dir,
            "frame_001",
            LabelFormat::Yolo,
            &boxes,
            ImageSize::new(1000, 800),
            &ClassList::default(),
        )
        .expect("write labels");

        assert_eq!(path, dir.join("frame_001.txt"));
        let body = fs::read_to_string(&path).expect("read back");
        assert_eq!(body, "0 0.200000 0.218750 0.200000 0.187500\n");
    }

    #[test]
    fn unreadable_file_decodes_to_empty() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let decoded = decode_label_file(&temp.path().join("missing.txt"), None);
        assert!(decoded.boxes.is_empty());
    }

    #[test]
    fn pixel_rows_without_size_are_dropped() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let path = temp.path().join("a.txt");
        fs::write(&path, "10 20 110 220\n").expect("write labels");

        let decoded = decode_label_file(&path, None);
        assert_eq!(decoded.format, SniffedFormat::XyxyPix);
        assert!(decoded.boxes.is_empty());

        let decoded = decode_label_file(&path, Some(ImageSize::new(200, 400)));
        assert_eq!(decoded.boxes.len(), 1);
        assert!((decoded.boxes[0].bbox().x2 - 0.55).abs() < 1e-12);
    }
}
