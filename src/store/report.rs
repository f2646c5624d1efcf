//! Load-time reporting for box stores.
//!
//! Malformed persisted lines never abort a load; they surface here as
//! [`ParseWarning`]s next to the boxes that did load.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Where a store's initial boxes came from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedSource {
    /// Nothing persisted and no mining record: the store started empty.
    #[default]
    Empty,
    /// A reviewed normalized-line file.
    NormalizedLines,
    /// A descriptive annotation document.
    Descriptive,
    /// Detector output from a mining run.
    Predictions,
    /// A mining run's prediction file, read when its metadata record is gone.
    PredictionFile,
}

impl SeedSource {
    pub fn name(&self) -> &'static str {
        match self {
            SeedSource::Empty => "empty",
            SeedSource::NormalizedLines => "normalized-lines",
            SeedSource::Descriptive => "descriptive",
            SeedSource::Predictions => "predictions",
            SeedSource::PredictionFile => "prediction-file",
        }
    }
}

/// A recoverable problem with one persisted line or record.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParseWarning {
    /// File the line came from, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// 1-based line (or record) number.
    pub line: usize,
    pub message: String,
}

impl ParseWarning {
    pub fn new(path: Option<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self {
            path,
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}:{}: {}", path.display(), self.line, self.message),
            None => write!(f, "line {}: {}", self.line, self.message),
        }
    }
}

/// Outcome of seeding a store.
#[derive(Clone, Debug, Default, Serialize)]
pub struct LoadReport {
    pub source: SeedSource,
    /// Number of boxes the store holds after seeding.
    pub loaded: usize,
    pub warnings: Vec<ParseWarning>,
}

impl LoadReport {
    pub fn new(source: SeedSource) -> Self {
        Self {
            source,
            ..Default::default()
        }
    }

    pub fn warn(&mut self, warning: ParseWarning) {
        self.warnings.push(warning);
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Loaded {} box(es) from {}",
            self.loaded,
            self.source.name()
        )?;

        if !self.warnings.is_empty() {
            writeln!(f)?;
            writeln!(f, "Warnings ({}):", self.warnings.len())?;
            for warning in &self.warnings {
                writeln!(f, "  - {}", warning)?;
            }
        }

        Ok(())
    }
}
