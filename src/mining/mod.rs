//! False-negative mining.
//!
//! [`mine`] runs a [`Detector`] over every image directly in a project's
//! `images/` directory and flags the images whose best detection stays
//! strictly below the confidence threshold. An image with no detections is
//! always flagged.
//!
//! For each flagged image the raw detections are written to
//! `predictions/<name>.txt` (normalized-line format, detector class indices)
//! as soon as the image completes, alongside `predictions/classes.txt`. The
//! run's [`ImageRecord`]s go to `potential_false_negatives.yaml` at the end,
//! including when the run is cancelled.
//!
//! Images are processed in relative-path order, so a run over the same
//! inputs is deterministic.

mod detector;
mod report;

pub use detector::{Detector, DetectorError, DetectorOutput, PrecomputedDetector, RawDetection};
pub use report::{MiningIssue, MiningIssueCode, MiningReport, MiningSeverity};

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::config::{check_unit, ProjectConfig, ProjectLayout};
use crate::error::ReviewError;
use crate::fsutil::{
    collect_top_level_files, read_image_dimensions, rel_string, write_atomic, IMAGE_EXTENSIONS,
};
use crate::ir::io_lines::{render_classes, render_detections};
use crate::ir::io_metadata::write_metadata;
use crate::ir::{max_confidence, Detection, ImageRecord};

/// Thresholds for one run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MiningOptions {
    /// An image is flagged when its maximum confidence is strictly below this.
    pub confidence_threshold: f64,
    /// Passed to the detector; detections below it are never returned.
    pub candidate_cutoff: f64,
}

impl MiningOptions {
    pub fn new(confidence_threshold: f64) -> Self {
        Self {
            confidence_threshold,
            candidate_cutoff: 0.0,
        }
    }

    pub fn with_candidate_cutoff(mut self, candidate_cutoff: f64) -> Self {
        self.candidate_cutoff = candidate_cutoff;
        self
    }

    /// Combines CLI overrides with `project.yaml`.
    ///
    /// The threshold must come from one of the two; the cutoff defaults to 0.
    pub fn resolve(
        config: &ProjectConfig,
        threshold: Option<f64>,
        candidate_cutoff: Option<f64>,
    ) -> Result<Self, ReviewError> {
        let confidence_threshold = threshold
            .or(config.confidence_threshold)
            .ok_or_else(|| ReviewError::InvalidConfig {
                message: "no confidence threshold: pass --threshold or set confidence_threshold in project.yaml".to_string(),
            })?;
        let options = Self::new(confidence_threshold)
            .with_candidate_cutoff(candidate_cutoff.or(config.candidate_cutoff).unwrap_or(0.0));
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), ReviewError> {
        check_unit("confidence_threshold", Some(self.confidence_threshold))?;
        check_unit("candidate_cutoff", Some(self.candidate_cutoff))
    }
}

/// Strict comparison: a detection exactly at the threshold clears it.
pub fn is_flagged(max_confidence: f64, confidence_threshold: f64) -> bool {
    max_confidence < confidence_threshold
}

/// Mines a project for potential false negatives.
///
/// Fails only if the images directory cannot be read or the metadata
/// document cannot be written. An image whose prediction files cannot be
/// written is skipped with a warning. Setting `cancel` stops the run before the
/// next image; completed images are kept.
pub fn mine<D: Detector + ?Sized>(
    layout: &ProjectLayout,
    detector: &mut D,
    options: &MiningOptions,
    cancel: &AtomicBool,
) -> Result<MiningReport, ReviewError> {
    options.validate()?;
    let images_dir = layout.require_images_dir()?;
    let mut images = collect_top_level_files(&images_dir, &IMAGE_EXTENSIONS)?;
    images.sort_by_key(|path| rel_string(layout.root(), path));

    let mut report = MiningReport::new(options.confidence_threshold, options.candidate_cutoff);
    report.discovered = images.len();
    let mut records = Vec::new();
    let mut class_names: BTreeMap<usize, String> = BTreeMap::new();

    for path in &images {
        if cancel.load(Ordering::Relaxed) {
            info!(completed = records.len(), "mining cancelled");
            report.cancelled = true;
            break;
        }

        let image = rel_string(layout.root(), path);
        let output = match detector.detect(path, options.candidate_cutoff) {
            Ok(output) => output,
            Err(err) => {
                warn!(image = %image, error = %err, "detector failed; skipping image");
                report.skipped += 1;
                report.add(MiningIssue::warning(
                    MiningIssueCode::DetectorFailure,
                    &image,
                    err.to_string(),
                ));
                continue;
            }
        };

        let detections = output.to_detections();
        let best = max_confidence(detections.iter().map(|d| d.confidence));
        let flagged = is_flagged(best, options.confidence_threshold);
        debug!(image = %image, detections = detections.len(), best, flagged, "scored image");

        if flagged {
            let (width, height) = match read_image_dimensions(path) {
                Ok(dims) => dims,
                Err(err) => {
                    warn!(image = %image, error = %err, "cannot size flagged image; skipping");
                    report.skipped += 1;
                    report.add(MiningIssue::warning(
                        MiningIssueCode::ImageUnreadable,
                        &image,
                        err.to_string(),
                    ));
                    continue;
                }
            };

            class_names.extend(output.class_names.clone());
            if let Err(err) =
                write_predictions(layout, &image, &class_names, &detections, width, height)
            {
                warn!(image = %image, error = %err, "cannot write predictions; skipping image");
                report.skipped += 1;
                report.add(MiningIssue::warning(
                    MiningIssueCode::PredictionWrite,
                    &image,
                    err.to_string(),
                ));
                continue;
            }

            info!(image = %image, best, "flagged potential false negative");
            report.flagged += 1;
            report.flagged_images.push(image.clone());
            report.add(MiningIssue::info(
                MiningIssueCode::Flagged,
                &image,
                format!(
                    "max confidence {:.3} below {} ({} detection(s))",
                    best,
                    options.confidence_threshold,
                    detections.len()
                ),
            ));
        }

        report.scored += 1;
        records.push(ImageRecord {
            image_path: image,
            detections,
            flagged,
        });
    }

    write_metadata(&layout.metadata_path(), &records)?;
    info!(
        scored = report.scored,
        flagged = report.flagged,
        skipped = report.skipped,
        "mining finished"
    );
    Ok(report)
}

fn write_predictions(
    layout: &ProjectLayout,
    image: &str,
    class_names: &BTreeMap<usize, String>,
    detections: &[Detection],
    width: u32,
    height: u32,
) -> Result<(), ReviewError> {
    write_atomic(&layout.classes_path(), render_classes(class_names).as_bytes())?;
    write_atomic(
        &layout.prediction_path(image)?,
        render_detections(detections, width, height).as_bytes(),
    )
}
