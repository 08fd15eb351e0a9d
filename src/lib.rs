//! Boxlab: bounding-box annotation editing and label reconciliation.
//!
//! The crate has two halves. The [`editor`] is a UI-agnostic engine for
//! drawing, moving, resizing and deleting boxes on an image under pan and
//! zoom; hosts feed it pointer and key events and render what it reports.
//! [`reconcile`] compares two annotation sets of the same images, such as
//! the output of two labelling tools, and scores their agreement.
//!
//! # Modules
//!
//! - [`geom`]: Space-tagged box geometry
//! - [`model`]: Boxes, class lists and image sizes
//! - [`editor`]: Coordinate mapping, box store, hit testing and the edit state machine
//! - [`codec`]: YOLO and Pascal VOC label files, plus format sniffing
//! - [`reconcile`]: IoU matching and agreement reports
//! - [`error`]: Error types for boxlab operations

pub mod codec;
pub mod editor;
pub mod error;
pub mod geom;
pub mod model;
pub mod reconcile;

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use clap::{Parser, Subcommand};
use kurbo::Size;
use serde::{Deserialize, Serialize};

use codec::LabelFormat;
use editor::{EditorConfig, InputEvent, Session};
use model::{ImageSize, LabeledBox};
use reconcile::{ReconcileOptions, DEFAULT_IOU_THRESHOLD};

pub use error::BoxlabError;

/// The boxlab CLI application.
#[derive(Parser)]
#[command(name = "boxlab")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Compare two label files for the same image.
    Compare(CompareArgs),
    /// Compare two label directories file by file.
    CompareDir(CompareDirArgs),
    /// Report the detected format of a label file.
    Sniff(SniffArgs),
    /// Replay a scripted editing session on an image and save the result.
    Replay(ReplayArgs),
}

/// Arguments for the compare subcommand.
#[derive(clap::Args)]
struct CompareArgs {
    /// Our label file.
    file_a: PathBuf,

    /// The other label file.
    file_b: PathBuf,

    /// Minimum IoU for two boxes to count as the same object.
    #[arg(long, env = "BOXLAB_IOU_THRESHOLD", default_value_t = DEFAULT_IOU_THRESHOLD)]
    iou: f64,

    /// Image size as WIDTHxHEIGHT, needed for pixel-unit files.
    #[arg(long)]
    image_size: Option<ImageSize>,

    /// Directory holding `{stem}.{ext}` images for pixel-unit files.
    #[arg(long, env = "BOXLAB_IMAGES_DIR")]
    images: Option<PathBuf>,

    /// List every match decision.
    #[arg(long)]
    detail: bool,

    /// Output format for the report ('text' or 'json').
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    output: String,
}

/// Arguments for the compare-dir subcommand.
#[derive(clap::Args)]
struct CompareDirArgs {
    /// Our labels directory, usually `<root>/labels_<name>/train`.
    dir_a: PathBuf,

    /// The other labels directory. Found among the siblings of DIR_A when
    /// omitted.
    dir_b: Option<PathBuf>,

    /// Minimum IoU for two boxes to count as the same object.
    #[arg(long, env = "BOXLAB_IOU_THRESHOLD", default_value_t = DEFAULT_IOU_THRESHOLD)]
    iou: f64,

    /// Directory holding `{stem}.{ext}` images for pixel-unit files.
    #[arg(long, env = "BOXLAB_IMAGES_DIR")]
    images: Option<PathBuf>,

    /// Also write every match decision to this CSV file.
    #[arg(long)]
    csv: Option<PathBuf>,

    /// List every match decision in the report.
    #[arg(long)]
    detail: bool,

    /// Output format for the report ('text' or 'json').
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    output: String,
}

/// Arguments for the sniff subcommand.
#[derive(clap::Args)]
struct SniffArgs {
    /// Label file to inspect.
    file: PathBuf,

    /// Image size as WIDTHxHEIGHT, used to count boxes in pixel-unit files.
    #[arg(long)]
    image_size: Option<ImageSize>,
}

/// Arguments for the replay subcommand.
#[derive(clap::Args)]
struct ReplayArgs {
    /// Image to annotate.
    image: PathBuf,

    /// JSON event script.
    script: PathBuf,

    /// Class names (`classes.txt` or a YOLO `data.yaml`).
    #[arg(long)]
    classes: Option<PathBuf>,

    /// Label format to save ('yolo' or 'voc').
    #[arg(long, default_value = "yolo")]
    format: LabelFormat,

    /// Where to save labels; defaults to `labels_<format>/train` next to the image.
    #[arg(long)]
    save_dir: Option<PathBuf>,

    /// Skip the save at the end of the script.
    #[arg(long)]
    no_save: bool,

    /// Output format for the summary ('text' or 'json').
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    output: String,
}

/// A scripted editing session, as read by `boxlab replay`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EventScript {
    #[serde(default)]
    config: EditorConfig,
    /// Viewport the image is fitted into before the events are played.
    #[serde(default)]
    viewport: Option<Size>,
    #[serde(default)]
    active_class: Option<i32>,
    #[serde(default)]
    active_class_name: Option<String>,
    events: Vec<InputEvent>,
}

#[derive(Serialize)]
struct ReplaySummary<'a> {
    image: &'a Path,
    events: usize,
    notifications: usize,
    saved_to: Option<PathBuf>,
    boxes: &'a [LabeledBox],
}

/// Run the boxlab CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), BoxlabError> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Compare(args)) => run_compare(args),
        Some(Commands::CompareDir(args)) => run_compare_dir(args),
        Some(Commands::Sniff(args)) => run_sniff(args),
        Some(Commands::Replay(args)) => run_replay(args),
        None => {
            println!("boxlab {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Bounding-box annotation editing and label reconciliation.");
            println!();
            println!("Run 'boxlab --help' for usage information.");
            Ok(())
        }
    }
}

/// A threshold of zero or less falls back to the default; above one is an error.
fn check_iou_threshold(iou: f64) -> Result<f64, BoxlabError> {
    if iou <= 0.0 {
        log::warn!("IoU threshold {iou} is not positive; using {DEFAULT_IOU_THRESHOLD}");
        return Ok(DEFAULT_IOU_THRESHOLD);
    }
    if iou <= 1.0 {
        Ok(iou)
    } else {
        Err(BoxlabError::InvalidInput(format!(
            "IoU threshold must be within (0, 1], got {iou}"
        )))
    }
}

/// Execute the compare subcommand.
fn run_compare(args: CompareArgs) -> Result<(), BoxlabError> {
    for path in [&args.file_a, &args.file_b] {
        if !path.is_file() {
            return Err(BoxlabError::InvalidInput(format!(
                "label file '{}' does not exist",
                path.display()
            )));
        }
    }

    let opts = ReconcileOptions {
        iou_threshold: check_iou_threshold(args.iou)?,
        detail: args.detail,
        images_dir: args.images,
    };
    let report = reconcile::reconcile_files(&args.file_a, &args.file_b, args.image_size, &opts);

    match args.output.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print!("{report}"),
    }
    Ok(())
}

/// Execute the compare-dir subcommand.
fn run_compare_dir(args: CompareDirArgs) -> Result<(), BoxlabError> {
    let (dir_a, dir_b) = match args.dir_b {
        Some(dir_b) => (args.dir_a, dir_b),
        None => reconcile::resolve_pair(&args.dir_a).ok_or_else(|| {
            BoxlabError::InvalidInput(format!(
                "no sibling labels directory found for '{}'; pass DIR_B explicitly",
                args.dir_a.display()
            ))
        })?,
    };
    log::info!("comparing {} with {}", dir_a.display(), dir_b.display());

    let opts = ReconcileOptions {
        iou_threshold: check_iou_threshold(args.iou)?,
        detail: args.detail,
        images_dir: args.images,
    };
    let report = reconcile::reconcile_dirs(&dir_a, &dir_b, &opts)?;

    if let Some(csv_path) = &args.csv {
        report.write_csv(csv_path)?;
        log::info!("wrote match decisions to {}", csv_path.display());
    }
    let report = report.finish();

    match args.output.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print!("{report}"),
    }
    Ok(())
}

/// Execute the sniff subcommand.
fn run_sniff(args: SniffArgs) -> Result<(), BoxlabError> {
    let format = codec::sniff_file(&args.file)?;
    let decoded = codec::decode_label_file_as(&args.file, format, args.image_size);
    println!("{format}");
    if format.needs_image_size() && args.image_size.is_none() {
        println!("boxes: ? (pass --image-size for pixel-unit files)");
    } else {
        println!("boxes: {}", decoded.boxes.len());
    }
    Ok(())
}

/// Execute the replay subcommand.
fn run_replay(args: ReplayArgs) -> Result<(), BoxlabError> {
    let script = read_event_script(&args.script)?;

    let mut session = Session::new(script.config);
    if let Some(classes) = &args.classes {
        session.load_classes(classes)?;
    }
    session.set_format(args.format);
    session.set_save_dir(args.save_dir);
    session.set_viewport(script.viewport);

    let notifications = Rc::new(Cell::new(0usize));
    let counter = Rc::clone(&notifications);
    session.subscribe(move |change| {
        log::debug!("{}: {} box(es)", change.stem, change.boxes.len());
        counter.set(counter.get() + 1);
    });

    session.open_files([args.image.clone()])?;
    if let Some(name) = &script.active_class_name {
        session.set_active_class_by_name(name);
    } else if let Some(index) = script.active_class {
        session.set_active_class(index);
    }

    for event in &script.events {
        session.handle(event)?;
    }

    let saved_to = if args.no_save {
        None
    } else {
        Some(session.save_current()?)
    };

    let image = session.current_image().unwrap_or(&args.image);
    let summary = ReplaySummary {
        image,
        events: script.events.len(),
        notifications: notifications.get(),
        saved_to,
        boxes: session.boxes(),
    };

    match args.output.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
        _ => {
            println!("Image:          {}", summary.image.display());
            println!("Events:         {}", summary.events);
            println!("Boxes:          {}", summary.boxes.len());
            for labeled in summary.boxes {
                let r = labeled.rect;
                println!(
                    "  - {} [{:.1}, {:.1}, {:.1}, {:.1}]",
                    session.classes().display_name(labeled.class),
                    r.x0,
                    r.y0,
                    r.x1,
                    r.y1
                );
            }
            if let Some(path) = &summary.saved_to {
                println!("Saved:          {}", path.display());
            }
        }
    }
    Ok(())
}

fn read_event_script(path: &Path) -> Result<EventScript, BoxlabError> {
    let text = std::fs::read_to_string(path).map_err(BoxlabError::Io)?;
    serde_json::from_str(&text).map_err(|source| BoxlabError::EventScriptParse {
        path: path.to_path_buf(),
        source,
    })
}
