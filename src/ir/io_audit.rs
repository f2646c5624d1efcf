//! The project-wide audit log.
//!
//! A single JSON document keyed by image path. Each image keeps its latest
//! [`AuditEntry`] (last write wins, per image) plus a history of
//! [`SaveStamp`]s that gains exactly one stamp per save and never shrinks.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bbox::{NormalizedRect, PixelRect};
use super::ids::BoxId;
use super::model::{Origin, ReviewBox};
use crate::error::ReviewError;
use crate::store::BoxStore;

/// A fully resolved copy of a box at save time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoxSnapshot {
    pub id: BoxId,
    pub label: String,
    pub origin: Origin,
    pub pixel: PixelRect,
    pub normalized: NormalizedRect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl BoxSnapshot {
    fn capture(store: &BoxStore, b: &ReviewBox) -> Result<Self, ReviewError> {
        Ok(Self {
            id: b.id.clone(),
            label: b.label.clone(),
            origin: b.origin,
            pixel: b.rect,
            normalized: store.normalized(b)?,
            confidence: b.confidence,
        })
    }
}

/// The state of one image as of its latest save.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub image_path: String,
    pub boxes: Vec<BoxSnapshot>,
    /// Boxes removed during the session, including rejected predictions.
    #[serde(default)]
    pub removed: Vec<BoxSnapshot>,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    /// Captures a store's live and removed boxes.
    pub fn capture(
        image_path: &str,
        store: &BoxStore,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, ReviewError> {
        let boxes = store
            .boxes()
            .iter()
            .map(|b| BoxSnapshot::capture(store, b))
            .collect::<Result<Vec<_>, _>>()?;
        let removed = store
            .removed()
            .iter()
            .map(|b| BoxSnapshot::capture(store, b))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            image_path: image_path.to_string(),
            boxes,
            removed,
            timestamp,
        })
    }
}

/// One save event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SaveStamp {
    pub timestamp: DateTime<Utc>,
    pub box_count: usize,
    pub removed_count: usize,
}

/// Everything the log knows about one image.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub latest: AuditEntry,
    pub history: Vec<SaveStamp>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    #[serde(default)]
    pub images: BTreeMap<String, AuditRecord>,
}

impl AuditLog {
    /// Loads the log, treating a missing file as an empty log.
    pub fn load(path: &Path) -> Result<Self, ReviewError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let file = File::open(path).map_err(ReviewError::Io)?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| ReviewError::AuditParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The log as pretty-printed JSON, the on-disk encoding.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Replaces the image's latest entry and appends one save stamp.
    pub fn record(&mut self, entry: AuditEntry) {
        let stamp = SaveStamp {
            timestamp: entry.timestamp,
            box_count: entry.boxes.len(),
            removed_count: entry.removed.len(),
        };

        match self.images.get_mut(&entry.image_path) {
            Some(record) => {
                record.latest = entry;
                record.history.push(stamp);
            }
            None => {
                self.images.insert(
                    entry.image_path.clone(),
                    AuditRecord {
                        latest: entry,
                        history: vec![stamp],
                    },
                );
            }
        }
    }

    pub fn entry(&self, image_path: &str) -> Option<&AuditEntry> {
        self.images.get(image_path).map(|record| &record.latest)
    }

    pub fn save_count(&self, image_path: &str) -> usize {
        self.images
            .get(image_path)
            .map(|record| record.history.len())
            .unwrap_or(0)
    }

    pub fn total_saves(&self) -> usize {
        self.images.values().map(|record| record.history.len()).sum()
    }
}
