//! Core annotation model.
//!
//! The editor works with [`LabeledBox`] values in image space; reconciliation
//! works with immutable [`NormalizedBox`] values produced by the decoders.
//! Class names live in a [`ClassList`] owned by whoever drives the session.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;

use kurbo::Rect;
use serde::{Deserialize, Serialize};

use crate::error::BoxlabError;
use crate::geom::{BBoxXYXY, Normalized};

/// Index into a [`ClassList`], or [`ClassIndex::UNLABELED`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassIndex(pub i32);

impl ClassIndex {
    /// Marks a box that is excluded from export.
    pub const UNLABELED: ClassIndex = ClassIndex(-1);

    /// Creates a new ClassIndex.
    #[inline]
    pub fn new(index: i32) -> Self {
        Self(index)
    }

    /// Returns the underlying value.
    #[inline]
    pub fn as_i32(&self) -> i32 {
        self.0
    }

    /// Returns true for any non-negative index.
    #[inline]
    pub fn is_labeled(&self) -> bool {
        self.0 >= 0
    }

    /// Returns the index as `usize` when it is labeled.
    #[inline]
    pub fn as_usize(&self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }
}

impl fmt::Debug for ClassIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassIndex({})", self.0)
    }
}

impl fmt::Display for ClassIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for ClassIndex {
    fn from(index: i32) -> Self {
        Self(index)
    }
}

/// One annotation box of the image being edited.
///
/// `rect` is in image space. Boxes held by a
/// [`BoxStore`](crate::editor::BoxStore) are always canonical: ordered
/// corners, inside the image and at least the configured minimum size.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabeledBox {
    pub rect: Rect,
    pub class: ClassIndex,
}

impl LabeledBox {
    pub fn new(rect: Rect, class: impl Into<ClassIndex>) -> Self {
        Self {
            rect,
            class: class.into(),
        }
    }
}

/// Pixel dimensions of an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Reads the dimensions from an image file header.
    pub fn from_file(path: &Path) -> Result<Self, BoxlabError> {
        let size = imagesize::size(path).map_err(|source| BoxlabError::ImageDimensionRead {
            path: path.to_path_buf(),
            source,
        })?;

        let width: u32 = size.width.try_into().map_err(|_| {
            BoxlabError::InvalidInput(format!(
                "image width {} of '{}' does not fit in u32",
                size.width,
                path.display()
            ))
        })?;
        let height: u32 = size.height.try_into().map_err(|_| {
            BoxlabError::InvalidInput(format!(
                "image height {} of '{}' does not fit in u32",
                size.height,
                path.display()
            ))
        })?;

        Ok(Self { width, height })
    }

    /// True when either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// The image rectangle `(0, 0)-(width, height)` in image space.
    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width as f64, self.height as f64)
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl std::str::FromStr for ImageSize {
    type Err = String;

    /// Parses `WIDTHxHEIGHT`, e.g. `1280x720`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (w, h) = raw
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{raw}'"))?;
        let width = w
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("invalid width '{w}'"))?;
        let height = h
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("invalid height '{h}'"))?;
        Ok(Self { width, height })
    }
}

/// Canonical reconciliation box: clamped to `[0, 1]` and non-degenerate.
///
/// Only constructible through [`NormalizedBox::new`], which enforces the
/// invariant, and never mutated afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct NormalizedBox {
    bbox: BBoxXYXY<Normalized>,
    class: ClassIndex,
}

impl NormalizedBox {
    /// Clamps the candidate into the unit square and rejects it if degenerate.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64, class: impl Into<ClassIndex>) -> Option<Self> {
        let bbox = BBoxXYXY::<Normalized>::from_xyxy(x1, y1, x2, y2).clamp_unit();
        if bbox.is_degenerate() {
            return None;
        }
        Some(Self {
            bbox,
            class: class.into(),
        })
    }

    pub fn from_bbox(bbox: BBoxXYXY<Normalized>, class: impl Into<ClassIndex>) -> Option<Self> {
        Self::new(bbox.x1, bbox.y1, bbox.x2, bbox.y2, class)
    }

    #[inline]
    pub fn bbox(&self) -> &BBoxXYXY<Normalized> {
        &self.bbox
    }

    #[inline]
    pub fn class(&self) -> ClassIndex {
        self.class
    }

    #[inline]
    pub fn iou(&self, other: &NormalizedBox) -> f64 {
        self.bbox.iou(&other.bbox)
    }
}

/// Ordered, index-addressable class names.
///
/// The name-to-index map is private and rebuilt every time the names change.
#[derive(Clone, Debug, Default)]
pub struct ClassList {
    names: Vec<String>,
    index_by_name: HashMap<String, usize>,
}

impl ClassList {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = Self::default();
        list.set_names(names.into_iter().map(Into::into).collect());
        list
    }

    /// Replaces all names and recomputes the lookup map.
    ///
    /// On duplicate names the first occurrence wins.
    pub fn set_names(&mut self, names: Vec<String>) {
        let mut index_by_name = HashMap::with_capacity(names.len());
        for (index, name) in names.iter().enumerate() {
            index_by_name.entry(name.clone()).or_insert(index);
        }
        self.names = names;
        self.index_by_name = index_by_name;
    }

    /// Loads names from `data.yaml`/`*.yml` or a plain one-name-per-line file.
    pub fn load(path: &Path) -> Result<Self, BoxlabError> {
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
            .unwrap_or(false);

        if is_yaml {
            Self::from_data_yaml(path)
        } else {
            Self::from_classes_txt(path)
        }
    }

    /// One name per line; blank lines and `#` comments are skipped.
    pub fn from_classes_txt(path: &Path) -> Result<Self, BoxlabError> {
        let data = fs::read_to_string(path).map_err(BoxlabError::Io)?;
        let names: Vec<String> = data
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(ToOwned::to_owned)
            .collect();

        if names.is_empty() {
            return Err(BoxlabError::ClassListInvalid {
                path: path.to_path_buf(),
                message: "no class names found".to_string(),
            });
        }

        Ok(Self::new(names))
    }

    /// Reads the `names:` entry of a YOLO `data.yaml`.
    pub fn from_data_yaml(path: &Path) -> Result<Self, BoxlabError> {
        #[derive(Deserialize)]
        struct DataYaml {
            names: DataYamlNames,
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum DataYamlNames {
            Sequence(Vec<String>),
            Mapping(BTreeMap<usize, String>),
        }

        let data = fs::read_to_string(path).map_err(BoxlabError::Io)?;
        let parsed: DataYaml =
            serde_yaml::from_str(&data).map_err(|source| BoxlabError::ClassYamlParse {
                path: path.to_path_buf(),
                source,
            })?;

        let names = match parsed.names {
            DataYamlNames::Sequence(names) => names,
            DataYamlNames::Mapping(mapping) => {
                let len = mapping.keys().max().map(|max| max + 1).unwrap_or(0);
                let mut names: Vec<String> = (0..len).map(|i| format!("class_{i}")).collect();
                for (index, name) in mapping {
                    if !name.trim().is_empty() {
                        names[index] = name;
                    }
                }
                names
            }
        };

        Ok(Self::new(names))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn name(&self, class: ClassIndex) -> Option<&str> {
        class
            .as_usize()
            .and_then(|index| self.names.get(index))
            .map(String::as_str)
    }

    /// Name for export; out-of-range indices get a `cls{N}` placeholder.
    pub fn display_name(&self, class: ClassIndex) -> String {
        self.name(class)
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| format!("cls{}", class.as_i32()))
    }

    pub fn index_of(&self, name: &str) -> Option<ClassIndex> {
        self.index_by_name
            .get(name)
            .and_then(|&index| i32::try_from(index).ok())
            .map(ClassIndex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_index_labels() {
        assert!(!ClassIndex::UNLABELED.is_labeled());
        assert_eq!(ClassIndex::UNLABELED.as_usize(), None);
        assert_eq!(ClassIndex::new(3).as_usize(), Some(3));
    }

    #[test]
    fn normalized_box_clamps_and_rejects_degenerate() {
        let clamped = NormalizedBox::new(-0.1, 0.2, 1.3, 0.8, 2).expect("valid after clamp");
        assert_eq!(clamped.bbox().x1, 0.0);
        assert_eq!(clamped.bbox().x2, 1.0);
        assert_eq!(clamped.class(), ClassIndex(2));

        assert!(NormalizedBox::new(1.2, 0.2, 1.5, 0.8, 0).is_none());
        assert!(NormalizedBox::new(0.5, 0.5, 0.4, 0.8, 0).is_none());
    }

    #[test]
    fn class_list_lookup_is_rebuilt() {
        let mut list = ClassList::new(["person", "car"]);
        assert_eq!(list.index_of("car"), Some(ClassIndex(1)));
        assert_eq!(list.display_name(ClassIndex(7)), "cls7");

        list.set_names(vec!["car".to_string()]);
        assert_eq!(list.index_of("car"), Some(ClassIndex(0)));
        assert_eq!(list.index_of("person"), None);
    }

    #[test]
    fn classes_txt_skips_comments_and_blanks() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let path = temp.path().join("classes.txt");
        fs::write(&path, "# header\nperson\n\n  dog  \n").expect("write classes");

        let list = ClassList::load(&path).expect("load classes");
        assert_eq!(list.names(), &["person".to_string(), "dog".to_string()]);
    }

    #[test]
    fn empty_classes_txt_is_rejected() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let path = temp.path().join("classes.txt");
        fs::write(&path, "# only a comment\n").expect("write classes");

        let err = ClassList::load(&path).unwrap_err();
        assert!(matches!(err, BoxlabError::ClassListInvalid { .. }));
    }

    #[test]
    fn data_yaml_mapping_fills_gaps() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let path = temp.path().join("data.yaml");
        fs::write(&path, "names:\n  0: person\n  2: bicycle\n").expect("write yaml");

        let list = ClassList::load(&path).expect("load yaml");
        assert_eq!(list.names(), &["person", "class_1", "bicycle"]);
    }

    #[test]
    fn image_size_parses_from_str() {
        let size: ImageSize = "1000x800".parse().expect("parse size");
        assert_eq!(size, ImageSize::new(1000, 800));
        assert!("1000".parse::<ImageSize>().is_err());
    }
}
