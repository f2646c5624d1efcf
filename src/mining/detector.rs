//! The detector boundary.
//!
//! Mining treats the detector as an opaque scoring function: given an image
//! and a candidate cutoff it returns absolute-pixel boxes with confidences
//! and class indices, plus a class-index-to-name map. [`PrecomputedDetector`]
//! replays the output of an external inference run stored as JSON.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::error::ReviewError;
use crate::ir::{BBoxXYXY, Detection};

/// One detection as returned by a detector.
#[derive(Clone, Debug, PartialEq)]
pub struct RawDetection {
    pub bbox: BBoxXYXY,
    pub confidence: f64,
    pub class_index: usize,
}

/// Detections for one image and the class names they refer to.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectorOutput {
    pub detections: Vec<RawDetection>,
    pub class_names: BTreeMap<usize, String>,
}

impl DetectorOutput {
    /// Class name for an index, `class_<n>` when the map has no entry.
    pub fn label_for(&self, class_index: usize) -> String {
        self.class_names
            .get(&class_index)
            .cloned()
            .unwrap_or_else(|| format!("class_{class_index}"))
    }

    /// Resolves class names into labelled [`Detection`]s.
    pub fn to_detections(&self) -> Vec<Detection> {
        self.detections
            .iter()
            .map(|raw| Detection {
                bbox: raw.bbox,
                confidence: raw.confidence,
                label: self.label_for(raw.class_index),
                class_index: raw.class_index,
            })
            .collect()
    }
}

/// A per-image detector failure. Mining logs it and skips the image.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("no detections recorded for {image}")]
    MissingImage { image: String },

    #[error("detector failed on {image}: {message}")]
    Failed { image: String, message: String },
}

/// Scores one image at a time.
pub trait Detector {
    /// Returns the detections whose confidence is at least `min_confidence`.
    fn detect(&mut self, image: &Path, min_confidence: f64)
        -> Result<DetectorOutput, DetectorError>;
}

impl<F> Detector for F
where
    F: FnMut(&Path, f64) -> Result<DetectorOutput, DetectorError>,
{
    fn detect(
        &mut self,
        image: &Path,
        min_confidence: f64,
    ) -> Result<DetectorOutput, DetectorError> {
        self(image, min_confidence)
    }
}

#[derive(Debug, Deserialize)]
struct PrecomputedDoc {
    #[serde(default)]
    names: BTreeMap<usize, String>,
    images: BTreeMap<String, Vec<PrecomputedDetection>>,
}

#[derive(Debug, Deserialize)]
struct PrecomputedDetection {
    bbox: [f64; 4],
    confidence: f64,
    class: usize,
}

/// Replays detections recorded by an external inference process.
///
/// The document looks like:
///
/// ```json
/// {
///   "names": {"0": "person", "2": "car"},
///   "images": {
///     "images/a.jpg": [],
///     "c.jpg": [{"bbox": [10, 20, 60, 80], "confidence": 0.31, "class": 0}]
///   }
/// }
/// ```
///
/// Image keys match by trailing path components, so `c.jpg` matches
/// `<root>/images/c.jpg`. An image without an entry is a detector failure.
#[derive(Clone, Debug)]
pub struct PrecomputedDetector {
    names: BTreeMap<usize, String>,
    images: BTreeMap<String, Vec<RawDetection>>,
}

impl PrecomputedDetector {
    pub fn from_path(path: &Path) -> Result<Self, ReviewError> {
        let file = File::open(path).map_err(ReviewError::Io)?;
        let doc: PrecomputedDoc = serde_json::from_reader(BufReader::new(file)).map_err(
            |source| ReviewError::DetectionsParse {
                path: path.to_path_buf(),
                source,
            },
        )?;
        Ok(Self::from_doc(doc))
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let doc: PrecomputedDoc = serde_json::from_str(json)?;
        Ok(Self::from_doc(doc))
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    fn from_doc(doc: PrecomputedDoc) -> Self {
        let images = doc
            .images
            .into_iter()
            .map(|(key, detections)| {
                let detections = detections
                    .into_iter()
                    .map(|d| RawDetection {
                        bbox: BBoxXYXY::from_xyxy(d.bbox[0], d.bbox[1], d.bbox[2], d.bbox[3]),
                        confidence: d.confidence,
                        class_index: d.class,
                    })
                    .collect();
                (key.replace('\\', "/"), detections)
            })
            .collect();

        Self {
            names: doc.names,
            images,
        }
    }

    /// The entry whose key matches the most trailing components of `image`.
    fn lookup(&self, image: &Path) -> Option<&[RawDetection]> {
        self.images
            .iter()
            .filter(|(key, _)| image.ends_with(Path::new(key.as_str())))
            .max_by_key(|(key, _)| Path::new(key.as_str()).components().count())
            .map(|(_, detections)| detections.as_slice())
    }
}

impl Detector for PrecomputedDetector {
    fn detect(
        &mut self,
        image: &Path,
        min_confidence: f64,
    ) -> Result<DetectorOutput, DetectorError> {
        let image_name = image.display().to_string();
        let recorded = self
            .lookup(image)
            .ok_or_else(|| DetectorError::MissingImage {
                image: image_name.clone(),
            })?;

        let mut detections = Vec::with_capacity(recorded.len());
        for raw in recorded {
            if !raw.confidence.is_finite() || !(0.0..=1.0).contains(&raw.confidence) {
                return Err(DetectorError::Failed {
                    image: image_name,
                    message: format!("confidence {} is outside [0, 1]", raw.confidence),
                });
            }
            if raw.confidence >= min_confidence {
                detections.push(raw.clone());
            }
        }

        Ok(DetectorOutput {
            detections,
            class_names: self.names.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "names": {"0": "person", "2": "car"},
        "images": {
            "a.jpg": [],
            "images/c.jpg": [
                {"bbox": [10, 20, 60, 80], "confidence": 0.31, "class": 0},
                {"bbox": [0, 0, 5, 5], "confidence": 0.05, "class": 2}
            ],
            "bad.jpg": [{"bbox": [0, 0, 1, 1], "confidence": 1.5, "class": 0}]
        }
    }"#;

    #[test]
    fn detect_applies_candidate_cutoff_and_names() {
        let mut detector = PrecomputedDetector::from_json_str(DOC).expect("parse");
        let output = detector
            .detect(Path::new("/proj/images/c.jpg"), 0.1)
            .expect("detect");

        assert_eq!(output.detections.len(), 1);
        let detections = output.to_detections();
        assert_eq!(detections[0].label, "person");
        assert_eq!(detections[0].bbox, BBoxXYXY::from_xyxy(10.0, 20.0, 60.0, 80.0));
        assert_eq!(output.label_for(7), "class_7");
    }

    #[test]
    fn detect_matches_by_trailing_components() {
        let mut detector = PrecomputedDetector::from_json_str(DOC).expect("parse");
        let output = detector
            .detect(Path::new("/proj/images/a.jpg"), 0.0)
            .expect("detect");
        assert!(output.detections.is_empty());

        // "c.jpg" under another directory does not match "images/c.jpg".
        assert!(matches!(
            detector.detect(Path::new("/proj/other/c.jpg"), 0.0),
            Err(DetectorError::MissingImage { .. })
        ));
    }

    #[test]
    fn out_of_range_confidence_is_a_failure() {
        let mut detector = PrecomputedDetector::from_json_str(DOC).expect("parse");
        assert!(matches!(
            detector.detect(Path::new("bad.jpg"), 0.0),
            Err(DetectorError::Failed { .. })
        ));
    }

    #[test]
    fn closures_are_detectors() {
        let mut calls = 0;
        let mut detector = |_: &Path, _: f64| -> Result<DetectorOutput, DetectorError> {
            calls += 1;
            Ok(DetectorOutput::default())
        };
        detector.detect(Path::new("x.jpg"), 0.0).unwrap();
        detector.detect(Path::new("y.jpg"), 0.0).unwrap();
        assert_eq!(calls, 2);
    }
}
