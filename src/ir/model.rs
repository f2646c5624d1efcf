//! Core annotation model.
//!
//! A [`ReviewBox`] is one bounding box on the image under review. The mining
//! pipeline describes its output with [`ImageRecord`]s holding raw detector
//! [`Detection`]s, which seed a store on first review.

use serde::{Deserialize, Serialize};

use super::bbox::{BBoxXYXY, PixelRect};
use super::ids::BoxId;

/// Where a box came from. Fixed at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Origin {
    /// Proposed by the detector during mining.
    Predicted,
    /// Drawn (or confirmed and persisted) by a reviewer.
    HumanDrawn,
}

impl Origin {
    pub fn name(&self) -> &'static str {
        match self {
            Origin::Predicted => "predicted",
            Origin::HumanDrawn => "human-drawn",
        }
    }
}

/// One bounding-box annotation in an image's box store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReviewBox {
    pub id: BoxId,

    /// Label name. May be orphaned if the vocabulary no longer holds it.
    pub label: String,

    /// Canonical geometry, in pixels of the reviewed image.
    pub rect: PixelRect,

    pub origin: Origin,

    /// Detector confidence; only ever set for [`Origin::Predicted`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl ReviewBox {
    /// Creates a reviewer-drawn box.
    pub fn human(id: BoxId, label: impl Into<String>, rect: PixelRect) -> Self {
        Self {
            id,
            label: label.into(),
            rect,
            origin: Origin::HumanDrawn,
            confidence: None,
        }
    }

    /// Creates a detector-proposed box.
    pub fn predicted(
        id: BoxId,
        label: impl Into<String>,
        rect: PixelRect,
        confidence: f64,
    ) -> Self {
        Self {
            id,
            label: label.into(),
            rect,
            origin: Origin::Predicted,
            confidence: Some(confidence),
        }
    }

    /// Creates a detector-proposed box whose confidence was not kept.
    pub fn predicted_unscored(id: BoxId, label: impl Into<String>, rect: PixelRect) -> Self {
        Self {
            id,
            label: label.into(),
            rect,
            origin: Origin::Predicted,
            confidence: None,
        }
    }
}

/// A single raw detection as recorded by the mining pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Absolute pixel corners `[x1, y1, x2, y2]`.
    pub bbox: BBoxXYXY,
    pub confidence: f64,
    /// Class name from the detector's class map.
    pub label: String,
    /// The detector's own class index.
    #[serde(default)]
    pub class_index: usize,
}

/// One scored image from a mining run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Path relative to the project root.
    pub image_path: String,
    pub detections: Vec<Detection>,
    /// True when no detection reached the confidence threshold.
    pub flagged: bool,
}

impl ImageRecord {
    /// Highest detection confidence, `0.0` for an empty detection list.
    pub fn max_confidence(&self) -> f64 {
        max_confidence(self.detections.iter().map(|d| d.confidence))
    }
}

/// Maximum of a confidence sequence, treating an empty sequence as `0.0`.
pub fn max_confidence(confidences: impl IntoIterator<Item = f64>) -> f64 {
    confidences.into_iter().fold(0.0, f64::max)
}
