//! The save transaction shared by every entry point.
//!
//! A save renders all three encodings in memory first, so a store that
//! cannot be encoded (an orphaned label, a corrupt audit log) fails before
//! anything touches disk. The files are then replaced one at a time, each
//! atomically, in a fixed order:
//!
//! 1. normalized-line file (`labels/<name>.txt`)
//! 2. descriptive document (`labels/<name>.yaml`)
//! 3. audit log (`audit.json`)
//!
//! A failure during step 2 or 3 is reported as
//! [`ReviewError::PartialSave`] naming the files already replaced, so the
//! caller knows to retry the whole save.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::ProjectLayout;
use crate::error::ReviewError;
use crate::fsutil::write_atomic;
use crate::ir::io_audit::{AuditEntry, AuditLog};
use crate::ir::io_descriptive::{build_descriptive, to_yaml_string};
use crate::ir::io_lines::render_store;
use crate::ir::LabelVocabulary;
use crate::store::BoxStore;

/// One of the three persisted encodings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormatKind {
    NormalizedLines,
    Descriptive,
    AuditLog,
}

impl FormatKind {
    /// Write order of a save.
    pub const SAVE_ORDER: [FormatKind; 3] = [
        FormatKind::NormalizedLines,
        FormatKind::Descriptive,
        FormatKind::AuditLog,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FormatKind::NormalizedLines => "normalized-line",
            FormatKind::Descriptive => "descriptive",
            FormatKind::AuditLog => "audit-log",
        }
    }

    /// Comma-separated names, `none` for an empty list.
    pub fn join(kinds: &[FormatKind]) -> String {
        if kinds.is_empty() {
            return "none".to_string();
        }
        kinds
            .iter()
            .map(FormatKind::name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a successful save wrote.
#[derive(Clone, Debug, Serialize)]
pub struct SaveSummary {
    pub image: String,
    pub box_count: usize,
    pub removed_count: usize,
    /// Saves recorded for this image, including this one.
    pub save_count: usize,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for SaveSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Saved {} box(es) for {} ({} removed, save #{})",
            self.box_count, self.image, self.removed_count, self.save_count
        )
    }
}

/// Persists a store through all three encodings.
///
/// `image` is the image path relative to the project root; it keys both the
/// per-image files and the audit log entry.
pub fn save_store(
    layout: &ProjectLayout,
    image: &str,
    store: &BoxStore,
    vocab: &LabelVocabulary,
    timestamp: DateTime<Utc>,
) -> Result<SaveSummary, ReviewError> {
    let lines_path = layout.lines_path(image)?;
    let descriptive_path = layout.descriptive_path(image)?;
    let audit_path = layout.audit_path();

    // Render everything up front.
    let lines = render_store(store, vocab)?;
    let doc = build_descriptive(image, store, timestamp)?;
    let yaml = to_yaml_string(&doc).map_err(|source| ReviewError::DescriptiveWrite {
        path: descriptive_path.clone(),
        source,
    })?;
    let mut audit = AuditLog::load(&audit_path)?;
    audit.record(AuditEntry::capture(image, store, timestamp)?);
    let audit_json = audit
        .to_json_string()
        .map_err(|source| ReviewError::AuditWrite {
            path: audit_path.clone(),
            source,
        })?;

    let writes = [
        (FormatKind::NormalizedLines, &lines_path, lines.as_bytes()),
        (FormatKind::Descriptive, &descriptive_path, yaml.as_bytes()),
        (FormatKind::AuditLog, &audit_path, audit_json.as_bytes()),
    ];

    let mut completed = Vec::with_capacity(writes.len());
    for (kind, path, contents) in writes {
        if let Err(err) = write_atomic(path, contents) {
            warn!(
                image,
                failed = %kind,
                completed = %FormatKind::join(&completed),
                error = %err,
                "save interrupted"
            );
            return Err(ReviewError::PartialSave {
                image: image.to_string(),
                completed,
                failed: kind,
                source: Box::new(err),
            });
        }
        completed.push(kind);
    }

    let summary = SaveSummary {
        image: image.to_string(),
        box_count: store.len(),
        removed_count: store.removed().len(),
        save_count: audit.save_count(image),
        timestamp,
    };
    info!(
        image,
        boxes = summary.box_count,
        removed = summary.removed_count,
        save = summary.save_count,
        "saved annotations"
    );
    Ok(summary)
}
