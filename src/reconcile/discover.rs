//! Locating the second annotator's label directory next to ours.
//!
//! Datasets are laid out as `<root>/labels_<name>/train`. A second tool's
//! output usually lives in a sibling such as `labels_yolo_li/train`.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::codec::{voc, yolo};

/// Sibling name fragments tried first, in order.
pub const PREFERRED_SIBLING_KEYS: [&str; 4] = ["_li", "_labelimg", "-li", "-labelimg"];

const LABELS_PREFIX: &str = "labels_";
const TRAIN_DIR: &str = "train";

/// Whether `dir` directly contains at least one `.txt` or `.xml` file.
pub fn has_label_files(dir: &Path) -> bool {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .any(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| {
                    ext.eq_ignore_ascii_case(yolo::LABEL_EXTENSION)
                        || ext.eq_ignore_ascii_case(voc::LABEL_EXTENSION)
                })
        })
}

/// Finds the `train` directory of a sibling `labels_*` directory.
///
/// `ours` must be `<root>/labels_<name>/train`. Siblings whose names
/// contain one of [`PREFERRED_SIBLING_KEYS`] are tried first and the first
/// one holding label files wins. Otherwise any sibling with label files is
/// taken, and failing that the first preferred sibling even if it is empty.
pub fn find_sibling_labels_dir(ours: &Path) -> Option<PathBuf> {
    if !ours.is_dir() || !name_eq(ours, TRAIN_DIR) {
        return None;
    }
    let labels_dir = ours.parent()?;
    let our_base = lowercase_name(labels_dir)?;
    let root = labels_dir.parent()?;

    let siblings: Vec<(String, PathBuf)> = WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_dir())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_lowercase();
            let train = entry.path().join(TRAIN_DIR);
            (name.starts_with(LABELS_PREFIX) && name != our_base && train.is_dir())
                .then_some((name, train))
        })
        .collect();

    let mut best_guess: Option<&PathBuf> = None;
    for key in PREFERRED_SIBLING_KEYS {
        for (name, train) in &siblings {
            if !name.contains(key) {
                continue;
            }
            if has_label_files(train) {
                log::debug!("sibling labels: {} (key '{key}')", train.display());
                return Some(train.clone());
            }
            best_guess.get_or_insert(train);
        }
    }

    if let Some((_, train)) = siblings.iter().find(|(_, train)| has_label_files(train)) {
        log::debug!("sibling labels: {}", train.display());
        return Some(train.clone());
    }

    best_guess.cloned()
}

/// Works out which directory is ours and which is the other annotator's.
///
/// When `dir` sits under a `labels_*_li` or `labels_*_labelimg` directory it
/// is taken as the other side and ours is the same name without that
/// suffix. Otherwise `dir` is ours and the other side is discovered with
/// [`find_sibling_labels_dir`]. Returns `(ours, other)`.
pub fn resolve_pair(dir: &Path) -> Option<(PathBuf, PathBuf)> {
    let labels_dir = dir.parent()?;
    let parent_name = labels_dir.file_name()?.to_string_lossy().into_owned();

    if let Some(ours_name) = strip_second_tool_suffix(&parent_name) {
        let root = labels_dir.parent()?;
        let leaf = dir.file_name()?;
        let ours = root.join(ours_name).join(leaf);
        return Some((ours, dir.to_path_buf()));
    }

    find_sibling_labels_dir(dir).map(|other| (dir.to_path_buf(), other))
}

/// `labels_yolo_li` → `labels_yolo`; `None` if the name carries no marker.
fn strip_second_tool_suffix(name: &str) -> Option<String> {
    let lower = name.to_ascii_lowercase();
    ["_li_labelimg", "_labelimg", "_li"]
        .iter()
        .find_map(|marker| {
            lower.find(marker).map(|at| {
                let mut stripped = name[..at].to_string();
                stripped.push_str(&name[at + marker.len()..]);
                stripped
            })
        })
        .filter(|stripped| !stripped.is_empty())
}

fn name_eq(path: &Path, expected: &str) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.eq_ignore_ascii_case(expected))
}

fn lowercase_name(path: &Path) -> Option<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
}
