//! Descriptive annotation documents.
//!
//! One YAML document per image:
//!
//! ```yaml
//! image: images/frame_0001.jpg
//! annotations:
//! - label: Vehicle
//!   bbox: [0.2, 0.3, 0.2, 0.2]
//! timestamp: 2024-05-01T12:00:00Z
//! ```
//!
//! `bbox` is `[x_center, y_center, w, h]` in normalized coordinates. Labels
//! are stored by name, so documents stay valid when the vocabulary is
//! reordered.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ReviewError;
use crate::store::BoxStore;

/// File extension for descriptive documents.
pub const DESCRIPTIVE_EXTENSION: &str = "yaml";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DescriptiveDoc {
    /// Image path relative to the project root.
    pub image: String,
    #[serde(default)]
    pub annotations: Vec<DescriptiveAnnotation>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DescriptiveAnnotation {
    pub label: String,
    /// `[x_center, y_center, w, h]`, normalized.
    pub bbox: [f64; 4],
}

/// Builds the document for a store's live boxes.
pub fn build_descriptive(
    image: &str,
    store: &BoxStore,
    timestamp: DateTime<Utc>,
) -> Result<DescriptiveDoc, ReviewError> {
    let annotations = store
        .boxes()
        .iter()
        .map(|b| {
            Ok(DescriptiveAnnotation {
                label: b.label.clone(),
                bbox: store.normalized(b)?.to_array(),
            })
        })
        .collect::<Result<Vec<_>, ReviewError>>()?;

    Ok(DescriptiveDoc {
        image: image.to_string(),
        annotations,
        timestamp,
    })
}

/// Reads a descriptive document from a YAML file.
pub fn read_descriptive(path: &Path) -> Result<DescriptiveDoc, ReviewError> {
    let content = fs::read_to_string(path).map_err(ReviewError::Io)?;
    from_yaml_str(&content).map_err(|source| ReviewError::DescriptiveParse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn from_yaml_str(yaml: &str) -> Result<DescriptiveDoc, serde_yaml::Error> {
    serde_yaml::from_str(yaml)
}

pub fn to_yaml_string(doc: &DescriptiveDoc) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{LabelVocabulary, PixelRect};
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().expect("valid timestamp")
    }

    #[test]
    fn build_uses_label_names_and_center_boxes() {
        let mut vocab = LabelVocabulary::new(["Animal", "Vehicle"]);
        let mut store = BoxStore::new(100, 50);
        store
            .add_human_box(PixelRect::new(10.0, 10.0, 20.0, 10.0), "Vehicle", &mut vocab)
            .unwrap();

        let doc = build_descriptive("images/a.jpg", &store, ts(0)).expect("build");
        assert_eq!(doc.image, "images/a.jpg");
        assert_eq!(doc.annotations.len(), 1);
        assert_eq!(doc.annotations[0].label, "Vehicle");
        let [cx, cy, w, h] = doc.annotations[0].bbox;
        assert!((cx - 0.2).abs() < 1e-12);
        assert!((cy - 0.3).abs() < 1e-12);
        assert!((w - 0.2).abs() < 1e-12);
        assert!((h - 0.2).abs() < 1e-12);
    }

    #[test]
    fn yaml_roundtrip_preserves_document() {
        let doc = DescriptiveDoc {
            image: "images/b.png".into(),
            annotations: vec![DescriptiveAnnotation {
                label: "Human".into(),
                bbox: [0.5, 0.5, 0.25, 0.125],
            }],
            timestamp: ts(1_700_000_000),
        };

        let yaml = to_yaml_string(&doc).expect("serialize");
        assert!(yaml.contains("label: Human"));
        assert_eq!(from_yaml_str(&yaml).expect("parse"), doc);
    }

    #[test]
    fn read_reports_parse_errors_with_path() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let path = temp.path().join("broken.yaml");
        fs::write(&path, "image: [unterminated").unwrap();

        let err = read_descriptive(&path).unwrap_err();
        assert!(matches!(err, ReviewError::DescriptiveParse { .. }));
    }
}
