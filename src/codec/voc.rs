//! Pascal VOC XML labels, one document per image.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::Node;

use crate::error::BoxlabError;
use crate::model::{ClassIndex, ClassList, ImageSize, LabeledBox, NormalizedBox};

pub const LABEL_EXTENSION: &str = "xml";

/// Image depth written to every document.
const DEPTH: u32 = 3;

/// Encodes labeled boxes as a VOC `<annotation>` document.
///
/// Bounds are clipped to the image and truncated to whole pixels. Classes
/// missing from `classes` are written as `cls{N}`.
pub fn encode(boxes: &[LabeledBox], image: ImageSize, classes: &ClassList) -> String {
    let mut xml = String::new();
    let bounds = image.bounds();

    writeln!(xml, "<?xml version=\"1.0\" encoding=\"utf-8\"?>").expect("write to string");
    writeln!(xml, "<annotation>").expect("write to string");
    writeln!(xml, "  <size>").expect("write to string");
    writeln!(xml, "    <width>{}</width>", image.width).expect("write to string");
    writeln!(xml, "    <height>{}</height>", image.height).expect("write to string");
    writeln!(xml, "    <depth>{DEPTH}</depth>").expect("write to string");
    writeln!(xml, "  </size>").expect("write to string");

    for labeled in boxes.iter().filter(|b| b.class.is_labeled()) {
        let rect = labeled.rect.intersect(bounds);
        let name = classes.display_name(labeled.class);

        writeln!(xml, "  <object>").expect("write to string");
        writeln!(xml, "    <name>{}</name>", xml_escape(&name)).expect("write to string");
        writeln!(xml, "    <bndbox>").expect("write to string");
        writeln!(xml, "      <xmin>{}</xmin>", rect.x0.trunc() as i64).expect("write to string");
        writeln!(xml, "      <ymin>{}</ymin>", rect.y0.trunc() as i64).expect("write to string");
        writeln!(xml, "      <xmax>{}</xmax>", rect.x1.trunc() as i64).expect("write to string");
        writeln!(xml, "      <ymax>{}</ymax>", rect.y1.trunc() as i64).expect("write to string");
        writeln!(xml, "    </bndbox>").expect("write to string");
        writeln!(xml, "  </object>").expect("write to string");
    }

    writeln!(xml, "</annotation>").expect("write to string");
    xml
}

/// A parsed VOC document.
#[derive(Clone, Debug, PartialEq)]
pub struct VocDocument {
    pub size: ImageSize,
    pub objects: Vec<VocObject>,
}

/// One `<object>` with its pixel bounds.
#[derive(Clone, Debug, PartialEq)]
pub struct VocObject {
    pub name: Option<String>,
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl VocDocument {
    /// Objects in unit coordinates.
    ///
    /// Names are not resolved: tools disagree on vocabularies, so every box
    /// gets class 0. Degenerate objects are dropped.
    pub fn normalized(&self) -> Vec<NormalizedBox> {
        let w = self.size.width as f64;
        let h = self.size.height as f64;
        self.objects
            .iter()
            .filter_map(|object| {
                NormalizedBox::new(
                    object.xmin / w,
                    object.ymin / h,
                    object.xmax / w,
                    object.ymax / h,
                    ClassIndex::new(0),
                )
            })
            .collect()
    }
}

pub fn read(path: &Path) -> Result<VocDocument, BoxlabError> {
    let xml = fs::read_to_string(path).map_err(BoxlabError::Io)?;
    parse_str(&xml, path)
}

/// Parses a VOC document. `path` is used for error messages only.
///
/// The image size is required and must be non-zero. Objects whose bounds
/// are missing or not numeric are skipped; pixel values are truncated to
/// whole pixels.
pub fn parse_str(xml: &str, path: &Path) -> Result<VocDocument, BoxlabError> {
    let document =
        roxmltree::Document::parse(xml).map_err(|source| BoxlabError::VocXmlParse {
            path: path.to_path_buf(),
            message: source.to_string(),
        })?;

    let annotation = document.root_element();
    if annotation.tag_name().name() != "annotation" {
        return Err(BoxlabError::VocXmlParse {
            path: path.to_path_buf(),
            message: "missing <annotation> root element".to_string(),
        });
    }

    let size = child_element(annotation, "size").ok_or_else(|| BoxlabError::VocXmlParse {
        path: path.to_path_buf(),
        message: "missing <size> in <annotation>".to_string(),
    })?;
    let width = parse_required_u32(size, "width", path)?;
    let height = parse_required_u32(size, "height", path)?;
    if width == 0 || height == 0 {
        return Err(BoxlabError::VocXmlParse {
            path: path.to_path_buf(),
            message: format!("image size {width}x{height} is empty"),
        });
    }

    let mut objects = Vec::new();
    for (index, object) in annotation
        .children()
        .filter(|node| node.is_element() && node.tag_name().name() == "object")
        .enumerate()
    {
        match parse_object(object) {
            Some(parsed) => objects.push(parsed),
            None => log::debug!(
                "{}: skipping <object> #{index} without usable <bndbox>",
                path.display()
            ),
        }
    }

    Ok(VocDocument {
        size: ImageSize::new(width, height),
        objects,
    })
}

/// Fuzz-only entrypoint for VOC parsing.
#[cfg(feature = "fuzzing")]
pub fn fuzz_parse_bytes(bytes: &[u8]) -> Result<(), BoxlabError> {
    let xml = std::str::from_utf8(bytes).map_err(|source| BoxlabError::VocXmlParse {
        path: PathBuf::from("<fuzz>"),
        message: format!("input is not valid UTF-8: {source}"),
    })?;
    parse_str(xml, Path::new("<fuzz>")).map(|_| ())
}

fn parse_object(object: Node<'_, '_>) -> Option<VocObject> {
    let bndbox = child_element(object, "bndbox")?;
    let bound = |tag: &str| -> Option<f64> {
        optional_child_text(bndbox, tag)?
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .map(f64::trunc)
    };

    Some(VocObject {
        name: optional_child_text(object, "name"),
        xmin: bound("xmin")?,
        ymin: bound("ymin")?,
        xmax: bound("xmax")?,
        ymax: bound("ymax")?,
    })
}

fn parse_required_u32(node: Node<'_, '_>, tag: &str, path: &Path) -> Result<u32, BoxlabError> {
    let raw = optional_child_text(node, tag).ok_or_else(|| BoxlabError::VocXmlParse {
        path: PathBuf::from(path),
        message: format!("missing <{tag}> in <size>"),
    })?;
    raw.parse::<u32>().map_err(|_| BoxlabError::VocXmlParse {
        path: path.to_path_buf(),
        message: format!("invalid <{tag}> value '{raw}' in <size>; expected u32"),
    })
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == tag)
}

fn optional_child_text(node: Node<'_, '_>, tag: &str) -> Option<String> {
    child_element(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned)
}

fn xml_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

pub(crate) fn has_xml_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(LABEL_EXTENSION))
        .unwrap_or(false)
}
