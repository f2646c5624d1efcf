//! Boxreview: mine a detector's potential false negatives and review them.
//!
//! The crate has two halves that meet at the project directory:
//!
//! - [`mining`] runs a detector over `images/`, flags the images whose best
//!   detection stays below a confidence threshold, and writes their raw
//!   detections as starting points for review.
//! - [`store`], [`session`] and [`persist`] hold one image's boxes in memory
//!   while a reviewer edits them, and save them through three encodings at
//!   once: normalized-line files, descriptive YAML documents, and a
//!   project-wide audit log.
//!
//! # Modules
//!
//! - [`ir`]: Geometry, box model, label vocabulary, and the persisted formats
//! - [`store`]: The per-image box store and its load reports
//! - [`session`]: Per-image review context (selection, index translation)
//! - [`persist`]: The three-format save transaction
//! - [`mining`]: The false-negative mining pipeline and detector boundary
//! - [`queue`]: Flagged images and whether each has been reviewed
//! - [`config`]: Project layout and `project.yaml`
//! - [`error`]: Error types for boxreview operations

pub mod config;
pub mod error;
pub mod fsutil;
pub mod ir;
pub mod mining;
pub mod persist;
pub mod queue;
pub mod session;
pub mod store;

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::warn;

pub use error::ReviewError;

use config::{ProjectConfig, ProjectLayout};
use ir::io_audit::{AuditLog, AuditRecord};
use ir::io_metadata::read_metadata;
use ir::{BoxId, LabelVocabulary, PixelRect, ReviewBox};
use mining::{MiningOptions, PrecomputedDetector};
use queue::ReviewQueue;
use session::ReviewSession;
use store::LoadReport;

/// The boxreview CLI application.
#[derive(Parser)]
#[command(name = "boxreview")]
#[command(version, author, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Log progress at info level (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Flag images whose detections all fall below a confidence threshold.
    Mine(MineArgs),
    /// Show the boxes an image would open with.
    Show(ShowArgs),
    /// Edit an image's boxes and save them.
    Edit(EditArgs),
    /// Print the audit log.
    Audit(AuditArgs),
    /// List flagged images and whether each has been reviewed.
    Queue(QueueArgs),
}

/// Arguments for the mine subcommand.
#[derive(clap::Args)]
struct MineArgs {
    /// Project root directory.
    #[arg(long)]
    project: PathBuf,

    /// Precomputed detector output (JSON).
    #[arg(long)]
    detections: PathBuf,

    /// Flag images whose maximum confidence is strictly below this value.
    #[arg(long)]
    threshold: Option<f64>,

    /// Minimum confidence for a detection to be considered at all.
    #[arg(long = "candidate-cutoff")]
    candidate_cutoff: Option<f64>,

    /// Output format for the report ('text' or 'json').
    #[arg(long, default_value = "text")]
    output: String,
}

/// Arguments for the show subcommand.
#[derive(clap::Args)]
struct ShowArgs {
    /// Project root directory.
    #[arg(long)]
    project: PathBuf,

    /// Image path (relative to the project root or to images/).
    image: PathBuf,

    /// Seed from 'lines' (labels, then predictions) or 'descriptive'.
    #[arg(long, default_value = "lines")]
    from: String,

    /// Output format ('text' or 'json').
    #[arg(long, default_value = "text")]
    output: String,
}

/// Arguments for the edit subcommand.
#[derive(clap::Args)]
struct EditArgs {
    /// Project root directory.
    #[arg(long)]
    project: PathBuf,

    /// Image path (relative to the project root or to images/).
    image: PathBuf,

    /// Add a box: "LEFT,TOP,WIDTH,HEIGHT=LABEL" in pixels.
    #[arg(long = "add", value_name = "RECT=LABEL")]
    add: Vec<String>,

    /// Change a box label: "ID=LABEL" (ID may be "Box 3" or just "3").
    #[arg(long = "relabel", value_name = "ID=LABEL")]
    relabel: Vec<String>,

    /// Remove a box by id.
    #[arg(long = "remove", value_name = "ID")]
    remove: Vec<String>,

    /// Output format ('text' or 'json').
    #[arg(long, default_value = "text")]
    output: String,
}

/// Arguments for the audit subcommand.
#[derive(clap::Args)]
struct AuditArgs {
    /// Project root directory.
    #[arg(long)]
    project: PathBuf,

    /// Only show this image (path relative to the project root).
    image: Option<String>,

    /// Output format ('text' or 'json').
    #[arg(long, default_value = "text")]
    output: String,
}

/// Arguments for the queue subcommand.
#[derive(clap::Args)]
struct QueueArgs {
    /// Project root directory.
    #[arg(long)]
    project: PathBuf,

    /// Only list images that have not been saved yet.
    #[arg(long)]
    pending: bool,

    /// Output format ('text' or 'json').
    #[arg(long, default_value = "text")]
    output: String,
}

/// Run the boxreview CLI with already-parsed arguments.
///
/// This is the main entry point for the CLI, called from `main.rs` after it
/// has installed logging.
pub fn run(cli: Cli) -> Result<(), ReviewError> {
    match cli.command {
        Some(Commands::Mine(args)) => run_mine(args),
        Some(Commands::Show(args)) => run_show(args),
        Some(Commands::Edit(args)) => run_edit(args),
        Some(Commands::Audit(args)) => run_audit(args),
        Some(Commands::Queue(args)) => run_queue(args),
        None => {
            println!("boxreview {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Mine detector false negatives and review their annotations.");
            println!();
            println!("Run 'boxreview --help' for usage information.");
            Ok(())
        }
    }
}

/// Execute the mine subcommand.
fn run_mine(args: MineArgs) -> Result<(), ReviewError> {
    let output = OutputFormat::parse(&args.output)?;
    let layout = ProjectLayout::new(&args.project);
    let config = ProjectConfig::load(&layout)?;
    let options = MiningOptions::resolve(&config, args.threshold, args.candidate_cutoff)?;
    let mut detector = PrecomputedDetector::from_path(&args.detections)?;

    let cancel = interrupt_flag();
    let report = mining::mine(&layout, &mut detector, &options, &cancel)?;
    output.print(&report)
}

/// A cancel flag raised by Ctrl-C.
///
/// Only one handler can be installed per process; if that fails the run
/// still proceeds, just without interruption.
fn interrupt_flag() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&flag);
    if let Err(err) = ctrlc::set_handler(move || handler_flag.store(true, Ordering::Relaxed)) {
        warn!(error = %err, "cannot install Ctrl-C handler; mining cannot be interrupted");
    }
    flag
}

/// Execute the show subcommand.
fn run_show(args: ShowArgs) -> Result<(), ReviewError> {
    let output = OutputFormat::parse(&args.output)?;
    let layout = ProjectLayout::new(&args.project);
    let config = ProjectConfig::load(&layout)?;
    let mut vocab = config.vocabulary();

    let session = match args.from.as_str() {
        "lines" => {
            let metadata = read_metadata(&layout.metadata_path())?;
            ReviewSession::open(&layout, &args.image, &metadata, &mut vocab)?
        }
        "descriptive" => ReviewSession::open_descriptive(&layout, &args.image, &vocab)?,
        other => {
            return Err(ReviewError::UnsupportedFormat(format!(
                "'{}' (supported: lines, descriptive)",
                other
            )));
        }
    };

    output.print(&SessionView::new(&session, &vocab))
}

/// Execute the edit subcommand.
fn run_edit(args: EditArgs) -> Result<(), ReviewError> {
    let output = OutputFormat::parse(&args.output)?;
    let layout = ProjectLayout::new(&args.project);
    let config = ProjectConfig::load(&layout)?;
    let mut vocab = config.vocabulary();
    let known_labels = vocab.len();
    let metadata = read_metadata(&layout.metadata_path())?;

    let mut session = ReviewSession::open(&layout, &args.image, &metadata, &mut vocab)?
        .with_policy(config.unknown_label_policy);

    // Parse everything before touching the store.
    let relabels = args
        .relabel
        .iter()
        .map(|raw| parse_relabel(raw))
        .collect::<Result<Vec<_>, _>>()?;
    let removals = args.remove.iter().map(|raw| parse_box_id(raw)).collect::<Vec<_>>();
    let additions = args
        .add
        .iter()
        .map(|raw| parse_addition(raw))
        .collect::<Result<Vec<_>, _>>()?;

    for (id, label) in &relabels {
        session.store_mut().update_label(id, label, &mut vocab)?;
    }
    for id in &removals {
        session.remove(id)?;
    }
    for (rect, label) in additions {
        session.store_mut().add_human_box(rect, &label, &mut vocab)?;
    }

    let summary = session.save(&layout, &vocab)?;
    if vocab.len() > known_labels {
        // Saved class indices refer to the grown vocabulary.
        let mut config = config;
        config.labels = Some(vocab.labels().to_vec());
        config.write(&layout)?;
    }
    output.print(&summary)
}

/// Execute the audit subcommand.
fn run_audit(args: AuditArgs) -> Result<(), ReviewError> {
    let output = OutputFormat::parse(&args.output)?;
    let layout = ProjectLayout::new(&args.project);
    let log = AuditLog::load(&layout.audit_path())?;

    match args.image {
        Some(image) => {
            let record = log
                .images
                .get(&image)
                .ok_or_else(|| ReviewError::InvalidArgument {
                    message: format!("no audit entry for '{image}'"),
                })?;
            output.print(&RecordView {
                image: &image,
                record,
            })
        }
        None => output.print(&LogView(&log)),
    }
}

/// Execute the queue subcommand.
fn run_queue(args: QueueArgs) -> Result<(), ReviewError> {
    let output = OutputFormat::parse(&args.output)?;
    let layout = ProjectLayout::new(&args.project);
    let mut queue = ReviewQueue::load(&layout)?;
    if args.pending {
        queue.entries.retain(|entry| !entry.reviewed);
    }
    output.print(&queue)
}

/// How a command prints its result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(raw: &str) -> Result<Self, ReviewError> {
        match raw {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(ReviewError::UnsupportedFormat(format!(
                "'{}' (supported output: text, json)",
                other
            ))),
        }
    }

    fn print<T: Serialize + fmt::Display>(self, value: &T) -> Result<(), ReviewError> {
        match self {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(value)
                    .map_err(|source| ReviewError::ReportWrite { source })?;
                println!("{json}");
            }
            OutputFormat::Text => print!("{value}"),
        }
        Ok(())
    }
}

/// Accepts "Box 3" or the shorthand "3".
fn parse_box_id(raw: &str) -> BoxId {
    let raw = raw.trim();
    match raw.parse::<u64>() {
        Ok(n) => BoxId::sequential(n),
        Err(_) => BoxId::from(raw),
    }
}

fn parse_relabel(raw: &str) -> Result<(BoxId, String), ReviewError> {
    let (id, label) = split_assignment(raw, "ID=LABEL")?;
    Ok((parse_box_id(id), label.to_string()))
}

fn parse_addition(raw: &str) -> Result<(PixelRect, String), ReviewError> {
    let (rect, label) = split_assignment(raw, "LEFT,TOP,WIDTH,HEIGHT=LABEL")?;
    let values = rect
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| ReviewError::InvalidArgument {
            message: format!("invalid box '{rect}': {err}"),
        })?;

    match values.as_slice() {
        [left, top, width, height] => Ok((
            PixelRect::new(*left, *top, *width, *height),
            label.to_string(),
        )),
        _ => Err(ReviewError::InvalidArgument {
            message: format!("invalid box '{rect}': expected 4 comma-separated numbers"),
        }),
    }
}

fn split_assignment<'a>(raw: &'a str, shape: &str) -> Result<(&'a str, &'a str), ReviewError> {
    match raw.split_once('=') {
        Some((lhs, rhs)) if !lhs.trim().is_empty() && !rhs.trim().is_empty() => {
            Ok((lhs.trim(), rhs.trim()))
        }
        _ => Err(ReviewError::InvalidArgument {
            message: format!("expected {shape}, got '{raw}'"),
        }),
    }
}

/// A session's image and boxes, as printed by `show`.
#[derive(Serialize)]
struct SessionView<'a> {
    image: &'a str,
    width: u32,
    height: u32,
    load: &'a LoadReport,
    boxes: Vec<BoxView<'a>>,
}

#[derive(Serialize)]
struct BoxView<'a> {
    #[serde(flatten)]
    review_box: &'a ReviewBox,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<String>,
}

impl<'a> SessionView<'a> {
    fn new(session: &'a ReviewSession, vocab: &LabelVocabulary) -> Self {
        let image = session.image();
        Self {
            image: &image.path,
            width: image.width,
            height: image.height,
            load: session.load_report(),
            boxes: session
                .store()
                .boxes()
                .iter()
                .map(|b| BoxView {
                    review_box: b,
                    color: vocab.color_of(&b.label),
                })
                .collect(),
        }
    }
}

impl fmt::Display for SessionView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({}x{})", self.image, self.width, self.height)?;
        write!(f, "{}", self.load)?;
        if !self.boxes.is_empty() {
            writeln!(f)?;
        }
        for view in &self.boxes {
            let b = view.review_box;
            write!(
                f,
                "  {:<8} {:<12} {:<12} left={:.1} top={:.1} width={:.1} height={:.1}",
                b.id.as_str(),
                b.label,
                b.origin.name(),
                b.rect.left,
                b.rect.top,
                b.rect.width,
                b.rect.height
            )?;
            if let Some(confidence) = b.confidence {
                write!(f, " confidence={confidence:.3}")?;
            }
            match &view.color {
                Some(color) => writeln!(f, " {color}")?,
                None => writeln!(f, " (orphaned label)")?,
            }
        }
        Ok(())
    }
}

/// One image's audit record, as printed by `audit IMAGE`.
#[derive(Serialize)]
struct RecordView<'a> {
    image: &'a str,
    #[serde(flatten)]
    record: &'a AuditRecord,
}

impl fmt::Display for RecordView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let latest = &self.record.latest;
        writeln!(
            f,
            "{}: {} save(s), last at {}",
            self.image,
            self.record.history.len(),
            latest.timestamp.to_rfc3339()
        )?;
        for snapshot in &latest.boxes {
            writeln!(
                f,
                "  {:<8} {:<12} {}",
                snapshot.id.as_str(),
                snapshot.label,
                snapshot.origin.name()
            )?;
        }
        for snapshot in &latest.removed {
            writeln!(
                f,
                "  {:<8} {:<12} {} (removed)",
                snapshot.id.as_str(),
                snapshot.label,
                snapshot.origin.name()
            )?;
        }
        Ok(())
    }
}

/// The whole audit log, as printed by `audit`.
#[derive(Serialize)]
#[serde(transparent)]
struct LogView<'a>(&'a AuditLog);

impl fmt::Display for LogView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let log = self.0;
        writeln!(
            f,
            "Audit log: {} image(s), {} save(s)",
            log.images.len(),
            log.total_saves()
        )?;
        for (image, record) in &log.images {
            writeln!(
                f,
                "  {}: {} box(es), {} removed, {} save(s), last at {}",
                image,
                record.latest.boxes.len(),
                record.latest.removed.len(),
                record.history.len(),
                record.latest.timestamp.to_rfc3339()
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_box_id_accepts_shorthand() {
        assert_eq!(parse_box_id("3").as_str(), "Box 3");
        assert_eq!(parse_box_id("Box 7").as_str(), "Box 7");
    }

    #[test]
    fn parse_addition_reads_pixel_rect() {
        let (rect, label) = parse_addition("10, 10, 20, 10=Vehicle").expect("parse");
        assert_eq!(rect, PixelRect::new(10.0, 10.0, 20.0, 10.0));
        assert_eq!(label, "Vehicle");

        assert!(parse_addition("10,10,20=Vehicle").is_err());
        assert!(parse_addition("10,10,20,10").is_err());
        assert!(parse_addition("a,b,c,d=Vehicle").is_err());
    }

    #[test]
    fn parse_relabel_splits_on_equals() {
        let (id, label) = parse_relabel("Box 2=Human").expect("parse");
        assert_eq!(id.as_str(), "Box 2");
        assert_eq!(label, "Human");
        assert!(parse_relabel("Box 2=").is_err());
    }

    #[test]
    fn interrupt_flag_starts_clear_even_when_a_handler_exists() {
        let first = interrupt_flag();
        let second = interrupt_flag();
        assert!(!first.load(Ordering::Relaxed));
        assert!(!second.load(Ordering::Relaxed));
    }

    #[test]
    fn output_format_rejects_unknown_values() {
        assert_eq!(OutputFormat::parse("json").unwrap(), OutputFormat::Json);
        assert!(matches!(
            OutputFormat::parse("yaml"),
            Err(ReviewError::UnsupportedFormat(_))
        ));
    }
}
