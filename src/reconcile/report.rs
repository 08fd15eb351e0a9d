//! Reconciliation report types, text formatting and CSV export.

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::{mean, MatchRecord, MatchStatus, Metrics, ReconcileOptions};
use crate::codec::SniffedFormat;
use crate::error::BoxlabError;
use crate::model::ClassIndex;

/// Comparison of two label files.
#[derive(Clone, Debug, Serialize)]
pub struct PairReport {
    pub file_a: PathBuf,
    pub file_b: PathBuf,
    pub format_a: SniffedFormat,
    pub format_b: SniffedFormat,
    pub count_a: usize,
    pub count_b: usize,
    pub iou_threshold: f64,
    pub metrics: Metrics,
    pub similarity: f64,
    /// Mean IoU of matched pairs.
    pub mean_iou: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<MatchRecord>,
}

/// One image stem of a directory comparison.
#[derive(Clone, Debug, Serialize)]
pub struct FileRow {
    pub stem: String,
    pub file_a: Option<PathBuf>,
    pub file_b: Option<PathBuf>,
    pub format_a: Option<SniffedFormat>,
    pub format_b: Option<SniffedFormat>,
    pub count_a: usize,
    pub count_b: usize,
    pub metrics: Metrics,
    pub similarity: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<MatchRecord>,
}

/// Comparison of two label directories.
#[derive(Clone, Debug, Serialize)]
pub struct BatchReport {
    pub dir_a: PathBuf,
    pub dir_b: PathBuf,
    pub iou_threshold: f64,
    pub files: Vec<FileRow>,
    pub summary: Metrics,
    pub similarity: f64,
    /// Mean IoU over every matched pair of every file.
    pub mean_iou: Option<f64>,
    #[serde(skip)]
    detail: bool,
    #[serde(skip)]
    matched_ious: Vec<f64>,
}

impl BatchReport {
    pub(crate) fn new(dir_a: &Path, dir_b: &Path, opts: &ReconcileOptions) -> Self {
        Self {
            dir_a: dir_a.to_path_buf(),
            dir_b: dir_b.to_path_buf(),
            iou_threshold: opts.iou_threshold,
            files: Vec::new(),
            summary: Metrics::default(),
            similarity: 1.0,
            mean_iou: None,
            detail: opts.detail,
            matched_ious: Vec::new(),
        }
    }

    /// Adds a row and refreshes the aggregates.
    pub(crate) fn push(&mut self, row: FileRow) {
        self.summary += row.metrics;
        self.similarity = self.summary.similarity();
        self.matched_ious.extend(
            row.records
                .iter()
                .filter(|record| {
                    matches!(
                        record.status,
                        MatchStatus::Match | MatchStatus::ClassMismatch
                    )
                })
                .filter_map(|record| record.iou),
        );
        self.mean_iou = mean(self.matched_ious.iter().copied());
        self.files.push(row);
    }

    /// Drops per-match records unless detail was requested.
    ///
    /// Call after [`write_csv`](Self::write_csv), which needs them.
    pub fn finish(mut self) -> Self {
        if !self.detail {
            for row in &mut self.files {
                row.records.clear();
            }
        }
        self
    }

    /// Writes one CSV row per match decision:
    /// `image_stem,status,class_a,class_b,iou`.
    pub fn write_csv(&self, path: &Path) -> Result<(), BoxlabError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(BoxlabError::Io)?;
        }
        let file = File::create(path).map_err(BoxlabError::Io)?;
        self.write_csv_to(BufWriter::new(file))
            .map_err(|source| BoxlabError::CsvWrite {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Like [`write_csv`](Self::write_csv), into any writer.
    pub fn write_csv_to<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        #[derive(Serialize)]
        struct CsvRow<'a> {
            image_stem: &'a str,
            status: &'static str,
            class_a: Option<i32>,
            class_b: Option<i32>,
            iou: Option<String>,
        }

        let mut csv_writer = csv::Writer::from_writer(writer);
        for row in &self.files {
            for record in &row.records {
                csv_writer.serialize(CsvRow {
                    image_stem: &row.stem,
                    status: record.status.as_str(),
                    class_a: record.class_a.map(|c| c.as_i32()),
                    class_b: record.class_b.map(|c| c.as_i32()),
                    iou: record.iou.map(|iou| format!("{iou:.6}")),
                })?;
            }
        }
        csv_writer.flush()?;
        Ok(())
    }
}

impl fmt::Display for PairReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "A: {} ({}, {} box(es))",
            self.file_a.display(),
            self.format_a,
            self.count_a
        )?;
        writeln!(
            f,
            "B: {} ({}, {} box(es))",
            self.file_b.display(),
            self.format_b,
            self.count_b
        )?;
        write_metrics(f, &self.metrics, self.iou_threshold, self.mean_iou)?;
        write_records(f, &self.records)
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "A: {}", self.dir_a.display())?;
        writeln!(f, "B: {}", self.dir_b.display())?;
        writeln!(f)?;

        if self.files.is_empty() {
            writeln!(f, "  (no label files with boxes)")?;
        }
        for row in &self.files {
            writeln!(
                f,
                "[{}] A:{} B:{}  TP={} ClassMismatch={} FP={} FN={}  similarity={:.3}",
                row.stem,
                row.count_a,
                row.count_b,
                row.metrics.tp,
                row.metrics.class_mismatch,
                row.metrics.fp,
                row.metrics.fn_,
                row.similarity
            )?;
            if self.detail {
                write_records(f, &row.records)?;
            }
        }

        writeln!(f)?;
        writeln!(f, "Files:          {}", self.files.len())?;
        write_metrics(f, &self.summary, self.iou_threshold, self.mean_iou)
    }
}

fn write_metrics(
    f: &mut fmt::Formatter<'_>,
    metrics: &Metrics,
    iou_threshold: f64,
    mean_iou: Option<f64>,
) -> fmt::Result {
    let similarity = metrics.similarity();
    writeln!(f, "TP:             {}", metrics.tp)?;
    writeln!(f, "ClassMismatch:  {}", metrics.class_mismatch)?;
    writeln!(f, "FP (only A):    {}", metrics.fp)?;
    writeln!(f, "FN (only B):    {}", metrics.fn_)?;
    writeln!(f, "IoU threshold:  {iou_threshold:.2}")?;
    match mean_iou {
        Some(mean) => writeln!(f, "Mean IoU:       {mean:.4}")?,
        None => writeln!(f, "Mean IoU:       -")?,
    }
    writeln!(
        f,
        "Similarity:     {similarity:.3} ({}%)",
        (similarity * 100.0).round()
    )
}

fn write_records(f: &mut fmt::Formatter<'_>, records: &[MatchRecord]) -> fmt::Result {
    for record in records {
        let class = |c: Option<ClassIndex>| {
            c.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string())
        };
        let iou = record
            .iou
            .map(|iou| format!("{iou:.4}"))
            .unwrap_or_else(|| "-".to_string());
        writeln!(
            f,
            "  - {:<14} a={} b={} iou={}",
            record.status.as_str(),
            class(record.class_a),
            class(record.class_b),
            iou
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NormalizedBox;
    use crate::reconcile::reconcile;

    fn row(stem: &str) -> FileRow {
        let a = [NormalizedBox::new(0.0, 0.0, 0.5, 0.5, 1).expect("valid")];
        let b = [
            NormalizedBox::new(0.0, 0.0, 0.5, 0.5, 1).expect("valid"),
            NormalizedBox::new(0.6, 0.6, 0.9, 0.9, 0).expect("valid"),
        ];
        let result = reconcile(&a, &b, 0.9);
        FileRow {
            stem: stem.to_string(),
            file_a: None,
            file_b: None,
            format_a: Some(SniffedFormat::Yolo),
            format_b: Some(SniffedFormat::Yolo),
            count_a: a.len(),
            count_b: b.len(),
            metrics: result.metrics,
            similarity: result.metrics.similarity(),
            records: result.records,
        }
    }

    #[test]
    fn push_aggregates_summary_and_mean_iou() {
        let mut report = BatchReport::new(
            Path::new("a"),
            Path::new("b"),
            &ReconcileOptions::default(),
        );
        report.push(row("one"));
        report.push(row("two"));

        assert_eq!(report.summary.tp, 2);
        assert_eq!(report.summary.fn_, 2);
        assert!((report.similarity - 0.5).abs() < 1e-12);
        assert_eq!(report.mean_iou, Some(1.0));

        let text = report.to_string();
        assert!(text.contains("[one] A:1 B:2"));
        assert!(text.contains("Similarity:     0.500 (50%)"));
    }

    #[test]
    fn csv_has_one_row_per_decision() {
        let mut report = BatchReport::new(
            Path::new("a"),
            Path::new("b"),
            &ReconcileOptions::default(),
        );
        report.push(row("img"));

        let mut out = Vec::new();
        report.write_csv_to(&mut out).expect("write csv");
        let text = String::from_utf8(out).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "image_stem,status,class_a,class_b,iou");
        assert_eq!(lines[1], "img,match,1,1,1.000000");
        assert_eq!(lines[2], "img,only-b,,0,");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn finish_strips_records_without_detail() {
        let mut report = BatchReport::new(
            Path::new("a"),
            Path::new("b"),
            &ReconcileOptions::default(),
        );
        report.push(row("img"));
        let report = report.finish();
        assert!(report.files[0].records.is_empty());
        assert_eq!(report.mean_iou, Some(1.0));
    }
}
