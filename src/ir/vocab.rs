//! The label vocabulary and its per-label display colors.

use serde::{Deserialize, Serialize};

/// Colors handed out to the first labels, in vocabulary order.
pub const LABEL_PALETTE: [&str; 8] = [
    "#FF0000", "#00FF00", "#0000FF", "#FFA500", "#800080", "#00FFFF", "#FFC0CB", "#A52A2A",
];

/// Labels used when a project does not declare its own.
pub const DEFAULT_LABELS: [&str; 3] = ["Animal", "Human", "Vehicle"];

/// What to do when an edit names a label outside the vocabulary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownLabelPolicy {
    /// Fail the edit with `UnknownLabel`.
    #[default]
    Reject,
    /// Append the label to the vocabulary and accept the edit.
    Register,
}

/// An ordered, append-only sequence of label names.
///
/// A label's class index is its position; since labels are never removed or
/// reordered within a session, indices and colors are stable for its lifetime.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelVocabulary {
    labels: Vec<String>,
}

impl LabelVocabulary {
    /// Builds a vocabulary, dropping blank and repeated names.
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut vocab = Self { labels: Vec::new() };
        for label in labels {
            let label = label.into();
            if !label.trim().is_empty() {
                vocab.register(label.trim());
            }
        }
        vocab
    }

    /// Appends `label` if it is new and returns its class index.
    pub fn register(&mut self, label: &str) -> usize {
        if let Some(index) = self.index_of(label) {
            return index;
        }
        self.labels.push(label.to_string());
        self.labels.len() - 1
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.index_of(label).is_some()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Returns the display color for a label in the vocabulary.
    ///
    /// The first eight labels take the fixed palette; later ones get a color
    /// derived from a CRC32C of the name, so it is the same in every session.
    pub fn color_of(&self, label: &str) -> Option<String> {
        let index = self.index_of(label)?;
        Some(match LABEL_PALETTE.get(index) {
            Some(color) => (*color).to_string(),
            None => hashed_color(label),
        })
    }

    /// Comma-separated label list, for error messages.
    pub fn describe(&self) -> String {
        self.labels.join(", ")
    }
}

impl Default for LabelVocabulary {
    fn default() -> Self {
        Self::new(DEFAULT_LABELS)
    }
}

fn hashed_color(label: &str) -> String {
    let hash = crc32c::crc32c(label.as_bytes());
    format!("#{:06X}", hash & 0x00FF_FFFF)
}
