//! Mining run summary.
//!
//! Per-image problems never abort a run; they are collected here next to
//! the counts so the caller can show them or emit them as JSON.

use serde::Serialize;
use std::fmt;

#[derive(Clone, Debug, Default, Serialize)]
pub struct MiningReport {
    pub confidence_threshold: f64,
    pub candidate_cutoff: f64,
    /// Images discovered under the images directory.
    pub discovered: usize,
    /// Images the detector scored successfully.
    pub scored: usize,
    /// Scored images whose maximum confidence fell below the threshold.
    pub flagged: usize,
    /// Images skipped because of a detector, image or prediction-file failure.
    pub skipped: usize,
    /// True if the run stopped early on request.
    pub cancelled: bool,
    /// Relative paths of flagged images, in processing order.
    pub flagged_images: Vec<String>,
    pub issues: Vec<MiningIssue>,
}

impl MiningReport {
    pub fn new(confidence_threshold: f64, candidate_cutoff: f64) -> Self {
        Self {
            confidence_threshold,
            candidate_cutoff,
            ..Default::default()
        }
    }

    pub fn add(&mut self, issue: MiningIssue) {
        self.issues.push(issue);
    }

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == MiningSeverity::Warning)
            .count()
    }

    pub fn info_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == MiningSeverity::Info)
            .count()
    }

    /// Issues with a given code, in the order they were raised.
    pub fn issues_with(&self, code: MiningIssueCode) -> impl Iterator<Item = &MiningIssue> {
        self.issues.iter().filter(move |i| i.code == code)
    }
}

impl fmt::Display for MiningReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Mined {} of {} image(s): {} flagged, {} skipped (threshold {}, candidate cutoff {})",
            self.scored,
            self.discovered,
            self.flagged,
            self.skipped,
            self.confidence_threshold,
            self.candidate_cutoff
        )?;
        if self.cancelled {
            writeln!(f, "  run cancelled; completed images were kept")?;
        }

        let warnings = self.warning_count();
        if warnings > 0 {
            writeln!(f)?;
            writeln!(f, "Warnings ({}):", warnings)?;
            for issue in self
                .issues
                .iter()
                .filter(|i| i.severity == MiningSeverity::Warning)
            {
                writeln!(f, "  - {}", issue)?;
            }
        }

        let infos = self.info_count();
        if infos > 0 {
            writeln!(f)?;
            writeln!(f, "Notes ({}):", infos)?;
            for issue in self
                .issues
                .iter()
                .filter(|i| i.severity == MiningSeverity::Info)
            {
                writeln!(f, "  - {}", issue)?;
            }
        }

        Ok(())
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct MiningIssue {
    pub severity: MiningSeverity,
    pub code: MiningIssueCode,
    /// Image path relative to the project root.
    pub image: String,
    pub message: String,
}

impl MiningIssue {
    pub fn warning(
        code: MiningIssueCode,
        image: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: MiningSeverity::Warning,
            code,
            image: image.into(),
            message: message.into(),
        }
    }

    pub fn info(code: MiningIssueCode, image: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: MiningSeverity::Info,
            code,
            image: image.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for MiningIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.image, self.message)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MiningSeverity {
    Warning,
    Info,
}

/// Stable issue codes; part of the JSON output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MiningIssueCode {
    /// The detector failed on an image; the image was skipped.
    DetectorFailure,
    /// A flagged image's dimensions could not be read; no prediction file.
    ImageUnreadable,
    /// A flagged image's prediction files could not be written; not recorded.
    PredictionWrite,
    /// An image was flagged as a potential false negative.
    Flagged,
}
