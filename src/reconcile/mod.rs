//! Agreement between two annotation sets of the same image.
//!
//! Matching is greedy and one-to-one: each reference box in turn takes the
//! still-unmatched candidate with the highest IoU, and keeps it if that IoU
//! reaches the threshold. This is not a globally optimal assignment; dense
//! scenes can score lower than a Hungarian matching would.

mod discover;
mod report;

pub use discover::{
    find_sibling_labels_dir, has_label_files, resolve_pair, PREFERRED_SIBLING_KEYS,
};
pub use report::{BatchReport, FileRow, PairReport};

use std::collections::{BTreeMap, BTreeSet};
use std::ops::AddAssign;
use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

use crate::codec::{self, voc, yolo, SniffedFormat};
use crate::editor::IMAGE_EXTENSIONS;
use crate::error::BoxlabError;
use crate::model::{ClassIndex, ImageSize, NormalizedBox};

pub const DEFAULT_IOU_THRESHOLD: f64 = 0.90;

/// Reconciliation options.
#[derive(Clone, Debug)]
pub struct ReconcileOptions {
    pub iou_threshold: f64,
    /// Keep per-match records in reports.
    pub detail: bool,
    /// Where to find `{stem}.{ext}` images for pixel-unit label files.
    pub images_dir: Option<PathBuf>,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            detail: false,
            images_dir: None,
        }
    }
}

/// Agreement counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Metrics {
    /// Matched with the same class.
    pub tp: usize,
    /// Matched with a different class.
    pub class_mismatch: usize,
    /// Only in A.
    pub fp: usize,
    /// Only in B.
    #[serde(rename = "fn")]
    pub fn_: usize,
}

impl Metrics {
    pub fn total(&self) -> usize {
        self.tp + self.class_mismatch + self.fp + self.fn_
    }

    /// `tp / total`, or `1.0` when there is nothing to compare.
    pub fn similarity(&self) -> f64 {
        match self.total() {
            0 => 1.0,
            total => self.tp as f64 / total as f64,
        }
    }
}

impl AddAssign for Metrics {
    fn add_assign(&mut self, other: Self) {
        self.tp += other.tp;
        self.class_mismatch += other.class_mismatch;
        self.fp += other.fp;
        self.fn_ += other.fn_;
    }
}

/// How one box (or pair of boxes) was classified.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchStatus {
    Match,
    ClassMismatch,
    OnlyA,
    OnlyB,
}

impl MatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Match => "match",
            MatchStatus::ClassMismatch => "class-mismatch",
            MatchStatus::OnlyA => "only-a",
            MatchStatus::OnlyB => "only-b",
        }
    }
}

/// One matching decision.
///
/// For [`MatchStatus::OnlyA`] the IoU is the best rejected candidate's,
/// when there was one.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MatchRecord {
    pub status: MatchStatus,
    pub a_index: Option<usize>,
    pub b_index: Option<usize>,
    pub class_a: Option<ClassIndex>,
    pub class_b: Option<ClassIndex>,
    pub iou: Option<f64>,
}

/// Result of matching two box sets.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Reconciliation {
    pub metrics: Metrics,
    /// A boxes in order, then leftover B boxes in order.
    pub records: Vec<MatchRecord>,
}

impl Reconciliation {
    /// IoU of every matched pair, with or without class agreement.
    pub fn matched_ious(&self) -> impl Iterator<Item = f64> + '_ {
        self.records
            .iter()
            .filter(|record| {
                matches!(
                    record.status,
                    MatchStatus::Match | MatchStatus::ClassMismatch
                )
            })
            .filter_map(|record| record.iou)
    }
}

/// Standard intersection over union; `0.0` for disjoint or degenerate boxes.
pub fn iou(a: &NormalizedBox, b: &NormalizedBox) -> f64 {
    a.iou(b)
}

/// Greedy one-to-one matching of `a` against `b`.
///
/// Ties go to the earliest candidate in `b`.
pub fn reconcile(a: &[NormalizedBox], b: &[NormalizedBox], iou_threshold: f64) -> Reconciliation {
    let mut used_b = vec![false; b.len()];
    let mut metrics = Metrics::default();
    let mut records = Vec::with_capacity(a.len() + b.len());

    for (a_index, box_a) in a.iter().enumerate() {
        let mut best: Option<usize> = None;
        let mut best_iou = -1.0;

        for (b_index, box_b) in b.iter().enumerate() {
            if used_b[b_index] {
                continue;
            }
            let candidate = iou(box_a, box_b);
            if candidate > best_iou {
                best_iou = candidate;
                best = Some(b_index);
            }
        }

        match best {
            Some(b_index) if best_iou >= iou_threshold => {
                used_b[b_index] = true;
                let class_b = b[b_index].class();
                let status = if box_a.class() == class_b {
                    metrics.tp += 1;
                    MatchStatus::Match
                } else {
                    metrics.class_mismatch += 1;
                    MatchStatus::ClassMismatch
                };
                records.push(MatchRecord {
                    status,
                    a_index: Some(a_index),
                    b_index: Some(b_index),
                    class_a: Some(box_a.class()),
                    class_b: Some(class_b),
                    iou: Some(best_iou),
                });
            }
            _ => {
                metrics.fp += 1;
                records.push(MatchRecord {
                    status: MatchStatus::OnlyA,
                    a_index: Some(a_index),
                    b_index: None,
                    class_a: Some(box_a.class()),
                    class_b: None,
                    iou: best.map(|_| best_iou),
                });
            }
        }
    }

    for (b_index, box_b) in b.iter().enumerate() {
        if used_b[b_index] {
            continue;
        }
        metrics.fn_ += 1;
        records.push(MatchRecord {
            status: MatchStatus::OnlyB,
            a_index: None,
            b_index: Some(b_index),
            class_a: None,
            class_b: Some(box_b.class()),
            iou: None,
        });
    }

    Reconciliation { metrics, records }
}

/// Decodes and reconciles two label files.
///
/// `image` is used for pixel-unit files; without it the image is looked up
/// in `opts.images_dir` by the stem of `path_a`.
pub fn reconcile_files(
    path_a: &Path,
    path_b: &Path,
    image: Option<ImageSize>,
    opts: &ReconcileOptions,
) -> PairReport {
    let stem = file_stem(path_a);
    let (format_a, boxes_a) = decode_side(Some(path_a), &stem, image, opts);
    let (format_b, boxes_b) = decode_side(Some(path_b), &stem, image, opts);
    let result = reconcile(&boxes_a, &boxes_b, opts.iou_threshold);

    PairReport {
        file_a: path_a.to_path_buf(),
        file_b: path_b.to_path_buf(),
        format_a: format_a.unwrap_or_default(),
        format_b: format_b.unwrap_or_default(),
        count_a: boxes_a.len(),
        count_b: boxes_b.len(),
        iou_threshold: opts.iou_threshold,
        metrics: result.metrics,
        similarity: result.metrics.similarity(),
        mean_iou: mean(result.matched_ious()),
        records: if opts.detail {
            result.records
        } else {
            Vec::new()
        },
    }
}

/// Reconciles every label stem found in either directory.
///
/// `{stem}.txt` is preferred over `{stem}.xml` on each side. Stems whose
/// both sides decode to nothing are left out of the report.
pub fn reconcile_dirs(
    dir_a: &Path,
    dir_b: &Path,
    opts: &ReconcileOptions,
) -> Result<BatchReport, BoxlabError> {
    let labels_a = label_files_by_stem(dir_a)?;
    let labels_b = label_files_by_stem(dir_b)?;
    let stems: BTreeSet<&String> = labels_a.keys().chain(labels_b.keys()).collect();

    let mut report = BatchReport::new(dir_a, dir_b, opts);
    for stem in stems {
        let path_a = labels_a.get(stem).map(PathBuf::as_path);
        let path_b = labels_b.get(stem).map(PathBuf::as_path);

        let (format_a, boxes_a) = decode_side(path_a, stem, None, opts);
        let (format_b, boxes_b) = decode_side(path_b, stem, None, opts);
        if boxes_a.is_empty() && boxes_b.is_empty() {
            log::debug!("{stem}: both sides empty, skipped");
            continue;
        }

        let result = reconcile(&boxes_a, &boxes_b, opts.iou_threshold);
        log::debug!(
            "{stem}: tp={} mismatch={} fp={} fn={}",
            result.metrics.tp,
            result.metrics.class_mismatch,
            result.metrics.fp,
            result.metrics.fn_
        );

        report.push(FileRow {
            stem: stem.clone(),
            file_a: path_a.map(Path::to_path_buf),
            file_b: path_b.map(Path::to_path_buf),
            format_a,
            format_b,
            count_a: boxes_a.len(),
            count_b: boxes_b.len(),
            metrics: result.metrics,
            similarity: result.metrics.similarity(),
            records: result.records,
        });
    }

    log::info!(
        "reconciled {} file(s): tp={} mismatch={} fp={} fn={} similarity={:.3}",
        report.files.len(),
        report.summary.tp,
        report.summary.class_mismatch,
        report.summary.fp,
        report.summary.fn_,
        report.similarity
    );
    Ok(report)
}

/// Label files directly inside `dir`, keyed by stem; `.txt` wins over `.xml`.
fn label_files_by_stem(dir: &Path) -> Result<BTreeMap<String, PathBuf>, BoxlabError> {
    if !dir.is_dir() {
        return Err(BoxlabError::InvalidInput(format!(
            "labels directory '{}' does not exist",
            dir.display()
        )));
    }

    let mut files: BTreeMap<String, PathBuf> = BTreeMap::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|source| {
            BoxlabError::InvalidInput(format!("failed to list '{}': {source}", dir.display()))
        })?;
        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }

        let is_txt = has_extension(path, yolo::LABEL_EXTENSION);
        if !is_txt && !has_extension(path, voc::LABEL_EXTENSION) {
            continue;
        }

        let stem = file_stem(path);
        let keep_existing = files
            .get(&stem)
            .is_some_and(|existing| has_extension(existing, yolo::LABEL_EXTENSION) || !is_txt);
        if !keep_existing {
            files.insert(stem, path.to_path_buf());
        }
    }
    Ok(files)
}

/// Decodes one side of a comparison. A missing file is an empty set.
fn decode_side(
    path: Option<&Path>,
    stem: &str,
    image: Option<ImageSize>,
    opts: &ReconcileOptions,
) -> (Option<SniffedFormat>, Vec<NormalizedBox>) {
    let Some(path) = path else {
        return (None, Vec::new());
    };

    let format = match codec::sniff_file(path) {
        Ok(format) => format,
        Err(err) => {
            log::warn!("treating {} as empty: {err}", path.display());
            return (Some(SniffedFormat::Unknown), Vec::new());
        }
    };

    let image = if format.needs_image_size() {
        image.or_else(|| {
            opts.images_dir
                .as_deref()
                .and_then(|dir| find_image_size(dir, stem))
        })
    } else {
        None
    };

    let decoded = codec::decode_label_file_as(path, format, image);
    (Some(decoded.format), decoded.boxes)
}

/// Size of `{dir}/{stem}.{ext}` for the first supported extension present.
pub fn find_image_size(dir: &Path, stem: &str) -> Option<ImageSize> {
    IMAGE_EXTENSIONS.iter().find_map(|ext| {
        let candidate = dir.join(format!("{stem}.{ext}"));
        if !candidate.is_file() {
            return None;
        }
        ImageSize::from_file(&candidate)
            .inspect_err(|err| log::debug!("{err}"))
            .ok()
    })
}

pub(crate) fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
