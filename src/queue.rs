//! The review queue.
//!
//! The images a reviewer still has to look at are the flagged records of the
//! last mining run. An image counts as reviewed once the audit log holds at
//! least one save for it.

use std::fmt;

use serde::Serialize;

use crate::config::ProjectLayout;
use crate::error::ReviewError;
use crate::ir::io_audit::AuditLog;
use crate::ir::io_metadata::read_metadata;
use crate::ir::ImageRecord;

/// One flagged image.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QueueEntry {
    /// Image path relative to the project root.
    pub image: String,
    pub max_confidence: f64,
    pub detections: usize,
    pub reviewed: bool,
    pub save_count: usize,
}

/// Flagged images in mining order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ReviewQueue {
    pub entries: Vec<QueueEntry>,
}

impl ReviewQueue {
    /// Builds the queue from mining records and the audit log.
    pub fn build(records: &[ImageRecord], audit: &AuditLog) -> Self {
        let entries = records
            .iter()
            .filter(|record| record.flagged)
            .map(|record| {
                let save_count = audit.save_count(&record.image_path);
                QueueEntry {
                    image: record.image_path.clone(),
                    max_confidence: record.max_confidence(),
                    detections: record.detections.len(),
                    reviewed: save_count > 0,
                    save_count,
                }
            })
            .collect();
        Self { entries }
    }

    /// Reads the project's metadata document and audit log.
    pub fn load(layout: &ProjectLayout) -> Result<Self, ReviewError> {
        let records = read_metadata(&layout.metadata_path())?;
        let audit = AuditLog::load(&layout.audit_path())?;
        Ok(Self::build(&records, &audit))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries with no recorded save, in queue order.
    pub fn pending(&self) -> impl Iterator<Item = &QueueEntry> {
        self.entries.iter().filter(|entry| !entry.reviewed)
    }

    pub fn pending_count(&self) -> usize {
        self.pending().count()
    }

    pub fn reviewed_count(&self) -> usize {
        self.len() - self.pending_count()
    }
}

impl fmt::Display for ReviewQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Review queue: {} pending, {} reviewed",
            self.pending_count(),
            self.reviewed_count()
        )?;
        for entry in &self.entries {
            let status = if entry.reviewed {
                format!("reviewed ({} save(s))", entry.save_count)
            } else {
                "pending".to_string()
            };
            writeln!(
                f,
                "  {:<32} max={:.3} detections={:<3} {}",
                entry.image, entry.max_confidence, entry.detections, status
            )?;
        }
        Ok(())
    }
}
