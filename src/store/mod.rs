//! The in-memory box set for the image under review.
//!
//! A [`BoxStore`] is the single owner of an image's boxes while it is open.
//! It enforces the invariants the persisted formats rely on:
//!
//! - every box has strictly positive pixel extent and converts to normalized
//!   coordinates for the store's image size;
//! - ids are unique and never recycled within the store's lifetime;
//! - labels set by an edit belong to the vocabulary at the time of the edit
//!   (boxes loaded from disk may keep orphaned labels).
//!
//! Iteration order is insertion order, which keeps serialization stable.

mod report;

pub use report::{LoadReport, ParseWarning, SeedSource};

use tracing::debug;

use crate::error::ReviewError;
use crate::ir::codec;
use crate::ir::io_descriptive::DescriptiveDoc;
use crate::ir::io_lines::ParsedLines;
use crate::ir::{
    BoxId, Detection, LabelVocabulary, NormalizedRect, PixelRect, ReviewBox, UnknownLabelPolicy,
};

/// The boxes of one image, keyed by stable [`BoxId`]s.
#[derive(Clone, Debug)]
pub struct BoxStore {
    image_width: u32,
    image_height: u32,
    policy: UnknownLabelPolicy,
    boxes: Vec<ReviewBox>,
    removed: Vec<ReviewBox>,
    next_id: u64,
}

impl BoxStore {
    /// Creates an empty store for an image of the given size.
    pub fn new(image_width: u32, image_height: u32) -> Self {
        Self {
            image_width,
            image_height,
            policy: UnknownLabelPolicy::default(),
            boxes: Vec::new(),
            removed: Vec::new(),
            next_id: 1,
        }
    }

    /// Sets how edits naming an unknown label are handled.
    pub fn with_policy(mut self, policy: UnknownLabelPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn set_policy(&mut self, policy: UnknownLabelPolicy) {
        self.policy = policy;
    }

    pub fn image_size(&self) -> (u32, u32) {
        (self.image_width, self.image_height)
    }

    pub fn policy(&self) -> UnknownLabelPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn contains(&self, id: &BoxId) -> bool {
        self.boxes.iter().any(|b| &b.id == id)
    }

    pub fn get(&self, id: &BoxId) -> Option<&ReviewBox> {
        self.boxes.iter().find(|b| &b.id == id)
    }

    /// Live boxes in id-insertion order.
    pub fn boxes(&self) -> &[ReviewBox] {
        &self.boxes
    }

    /// Owned copy of the live boxes in id-insertion order.
    pub fn snapshot(&self) -> Vec<ReviewBox> {
        self.boxes.clone()
    }

    /// Boxes removed since the store was created, in removal order.
    pub fn removed(&self) -> &[ReviewBox] {
        &self.removed
    }

    /// Normalized geometry of a box for this store's image size.
    pub fn normalized(&self, b: &ReviewBox) -> Result<NormalizedRect, ReviewError> {
        codec::to_normalized(&b.rect, self.image_width as f64, self.image_height as f64)
    }

    /// Seeds an empty store from raw detector output.
    ///
    /// Boxes get `origin = predicted` and fresh sequential ids. Detector class
    /// names missing from the vocabulary are registered. Detections with
    /// unusable geometry are skipped and reported as warnings.
    pub fn seed_from_predictions(
        &mut self,
        detections: &[Detection],
        vocab: &mut LabelVocabulary,
    ) -> Result<LoadReport, ReviewError> {
        self.ensure_empty()?;
        let mut report = LoadReport::new(SeedSource::Predictions);
        let mut seeded = Vec::with_capacity(detections.len());

        for (index, detection) in detections.iter().enumerate() {
            let rect = detection.bbox.to_rect();
            if let Err(err) = self.check_geometry(&rect) {
                report.warn(ParseWarning::new(
                    None,
                    index + 1,
                    format!("skipped detection '{}': {err}", detection.label),
                ));
                continue;
            }

            vocab.register(&detection.label);
            let id = BoxId::sequential(seeded.len() as u64 + 1);
            seeded.push(ReviewBox::predicted(
                id,
                detection.label.clone(),
                rect,
                detection.confidence,
            ));
        }

        self.commit_seed(seeded, &mut report);
        Ok(report)
    }

    /// Seeds an empty store from a parsed normalized-line file.
    ///
    /// Ids are `Box 1..N` in file order. Class indices beyond the vocabulary
    /// produce an orphan `class_<n>` label plus a warning; rows whose geometry
    /// cannot be mapped onto the image are skipped with a warning.
    pub fn seed_from_persisted(
        &mut self,
        lines: &ParsedLines,
        vocab: &LabelVocabulary,
    ) -> Result<LoadReport, ReviewError> {
        self.ensure_empty()?;
        let mut report = LoadReport::new(SeedSource::NormalizedLines);
        report.warnings.extend(lines.warnings.iter().cloned());
        let mut seeded = Vec::with_capacity(lines.rows.len());

        for row in &lines.rows {
            let rect = match self.to_pixel(&row.rect) {
                Ok(rect) => rect,
                Err(err) => {
                    report.warn(ParseWarning::new(lines.path.clone(), row.line, err.to_string()));
                    continue;
                }
            };

            let label = match vocab.get(row.class_index) {
                Some(label) => label.to_string(),
                None => {
                    report.warn(ParseWarning::new(
                        lines.path.clone(),
                        row.line,
                        format!(
                            "class index {} is out of range for {} label(s); kept as orphan",
                            row.class_index,
                            vocab.len()
                        ),
                    ));
                    format!("class_{}", row.class_index)
                }
            };

            let id = BoxId::sequential(seeded.len() as u64 + 1);
            seeded.push(ReviewBox::human(id, label, rect));
        }

        self.commit_seed(seeded, &mut report);
        Ok(report)
    }

    /// Seeds an empty store from a mining run's prediction file.
    ///
    /// Class indices are the detector's, so names come from `class_names`
    /// (the project's `classes.txt`) rather than the vocabulary; an index with
    /// no usable name becomes `class_<n>`. Names are registered in `vocab`.
    /// Boxes are predicted but carry no confidence, which the file does not keep.
    pub fn seed_from_prediction_file(
        &mut self,
        lines: &ParsedLines,
        class_names: &[String],
        vocab: &mut LabelVocabulary,
    ) -> Result<LoadReport, ReviewError> {
        self.ensure_empty()?;
        let mut report = LoadReport::new(SeedSource::PredictionFile);
        report.warnings.extend(lines.warnings.iter().cloned());
        let mut seeded = Vec::with_capacity(lines.rows.len());

        for row in &lines.rows {
            let rect = match self.to_pixel(&row.rect) {
                Ok(rect) => rect,
                Err(err) => {
                    report.warn(ParseWarning::new(lines.path.clone(), row.line, err.to_string()));
                    continue;
                }
            };

            let label = match class_names.get(row.class_index) {
                Some(name) if !name.is_empty() => name.clone(),
                _ => format!("class_{}", row.class_index),
            };
            vocab.register(&label);

            let id = BoxId::sequential(seeded.len() as u64 + 1);
            seeded.push(ReviewBox::predicted_unscored(id, label, rect));
        }

        self.commit_seed(seeded, &mut report);
        Ok(report)
    }

    /// Seeds an empty store from a descriptive annotation document.
    ///
    /// Labels are matched by name, so the load survives vocabulary reordering.
    pub fn seed_from_descriptive(
        &mut self,
        doc: &DescriptiveDoc,
        vocab: &LabelVocabulary,
    ) -> Result<LoadReport, ReviewError> {
        self.ensure_empty()?;
        let mut report = LoadReport::new(SeedSource::Descriptive);
        let mut seeded = Vec::with_capacity(doc.annotations.len());

        for (index, annotation) in doc.annotations.iter().enumerate() {
            let record = index + 1;
            let rect = match self.to_pixel(&NormalizedRect::from_array(annotation.bbox)) {
                Ok(rect) => rect,
                Err(err) => {
                    report.warn(ParseWarning::new(None, record, err.to_string()));
                    continue;
                }
            };

            if !vocab.contains(&annotation.label) {
                report.warn(ParseWarning::new(
                    None,
                    record,
                    format!(
                        "label '{}' is not in the vocabulary; kept as orphan",
                        annotation.label
                    ),
                ));
            }

            let id = BoxId::sequential(seeded.len() as u64 + 1);
            seeded.push(ReviewBox::human(id, annotation.label.clone(), rect));
        }

        self.commit_seed(seeded, &mut report);
        Ok(report)
    }

    /// Adds a reviewer-drawn box and returns its id.
    pub fn add_human_box(
        &mut self,
        rect: PixelRect,
        label: &str,
        vocab: &mut LabelVocabulary,
    ) -> Result<BoxId, ReviewError> {
        self.check_geometry(&rect)?;
        let label = self.resolve_label(label, vocab)?;

        let id = self.allocate_id();
        debug!(id = %id, label = %label, "added box");
        self.boxes.push(ReviewBox::human(id.clone(), label, rect));
        Ok(id)
    }

    /// Changes the label of an existing box.
    pub fn update_label(
        &mut self,
        id: &BoxId,
        label: &str,
        vocab: &mut LabelVocabulary,
    ) -> Result<(), ReviewError> {
        let position = self.position(id)?;
        let label = self.resolve_label(label, vocab)?;
        self.boxes[position].label = label;
        Ok(())
    }

    /// Replaces the geometry of an existing box after an interactive transform.
    pub fn update_geometry(&mut self, id: &BoxId, rect: PixelRect) -> Result<(), ReviewError> {
        let position = self.position(id)?;
        self.check_geometry(&rect)?;
        self.boxes[position].rect = rect;
        Ok(())
    }

    /// Removes a box. Its id is not handed out again.
    ///
    /// The removed box is kept in [`removed`](Self::removed) so that a
    /// rejected prediction stays visible in the audit trail.
    pub fn remove(&mut self, id: &BoxId) -> Result<ReviewBox, ReviewError> {
        let position = self.position(id)?;
        let removed = self.boxes.remove(position);
        debug!(id = %removed.id, origin = removed.origin.name(), "removed box");
        self.removed.push(removed.clone());
        Ok(removed)
    }

    fn ensure_empty(&self) -> Result<(), ReviewError> {
        if !self.boxes.is_empty() || !self.removed.is_empty() {
            return Err(ReviewError::StoreNotEmpty {
                len: self.boxes.len(),
            });
        }
        Ok(())
    }

    fn commit_seed(&mut self, seeded: Vec<ReviewBox>, report: &mut LoadReport) {
        self.next_id = seeded.len() as u64 + 1;
        self.boxes = seeded;
        report.loaded = self.boxes.len();
    }

    fn allocate_id(&mut self) -> BoxId {
        let id = BoxId::sequential(self.next_id);
        self.next_id += 1;
        id
    }

    fn position(&self, id: &BoxId) -> Result<usize, ReviewError> {
        self.boxes
            .iter()
            .position(|b| &b.id == id)
            .ok_or_else(|| ReviewError::UnknownBox {
                id: id.to_string(),
            })
    }

    fn check_geometry(&self, rect: &PixelRect) -> Result<(), ReviewError> {
        if !rect.is_valid() {
            return Err(ReviewError::geometry(format!(
                "box {}x{} must have positive width and height",
                rect.width, rect.height
            )));
        }
        codec::to_normalized(rect, self.image_width as f64, self.image_height as f64)?;
        Ok(())
    }

    fn to_pixel(&self, rect: &NormalizedRect) -> Result<PixelRect, ReviewError> {
        codec::to_pixel(rect, self.image_width as f64, self.image_height as f64)
    }

    fn resolve_label(
        &self,
        label: &str,
        vocab: &mut LabelVocabulary,
    ) -> Result<String, ReviewError> {
        let label = label.trim();
        if vocab.contains(label) {
            return Ok(label.to_string());
        }
        match self.policy {
            UnknownLabelPolicy::Register if !label.is_empty() => {
                vocab.register(label);
                Ok(label.to_string())
            }
            _ => Err(ReviewError::UnknownLabel {
                label: label.to_string(),
                known: vocab.describe(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::io_lines::parse_lines;
    use crate::ir::{BBoxXYXY, Origin};
    use std::collections::HashSet;
    use std::path::Path;

    fn vocab() -> LabelVocabulary {
        LabelVocabulary::new(["Person", "Vehicle"])
    }

    fn detection(x1: f64, y1: f64, x2: f64, y2: f64, conf: f64, label: &str) -> Detection {
        Detection {
            bbox: BBoxXYXY::from_xyxy(x1, y1, x2, y2),
            confidence: conf,
            label: label.to_string(),
            class_index: 0,
        }
    }

    #[test]
    fn seed_from_predictions_assigns_sequential_predicted_boxes() {
        let mut vocab = vocab();
        let mut store = BoxStore::new(100, 100);
        let report = store
            .seed_from_predictions(
                &[
                    detection(10.0, 10.0, 30.0, 40.0, 0.31, "Person"),
                    detection(50.0, 50.0, 60.0, 70.0, 0.12, "Dog"),
                ],
                &mut vocab,
            )
            .expect("seed");

        assert_eq!(report.loaded, 2);
        assert!(report.is_clean());
        let boxes = store.boxes();
        assert_eq!(boxes[0].id.as_str(), "Box 1");
        assert_eq!(boxes[1].id.as_str(), "Box 2");
        assert_eq!(boxes[0].origin, Origin::Predicted);
        assert_eq!(boxes[0].confidence, Some(0.31));
        assert_eq!(boxes[0].rect, PixelRect::new(10.0, 10.0, 20.0, 30.0));
        // Detector class names join the vocabulary.
        assert_eq!(vocab.index_of("Dog"), Some(2));
    }

    #[test]
    fn seed_from_predictions_skips_degenerate_detections() {
        let mut vocab = vocab();
        let mut store = BoxStore::new(100, 100);
        let report = store
            .seed_from_predictions(
                &[
                    detection(10.0, 10.0, 10.0, 40.0, 0.3, "Person"),
                    detection(10.0, 10.0, 20.0, 20.0, 0.3, "Person"),
                ],
                &mut vocab,
            )
            .expect("seed");

        assert_eq!(store.len(), 1);
        assert_eq!(report.warning_count(), 1);
        assert_eq!(store.boxes()[0].id.as_str(), "Box 1");
    }

    #[test]
    fn seeding_requires_an_empty_store() {
        let mut vocab = vocab();
        let mut store = BoxStore::new(100, 100);
        store
            .add_human_box(PixelRect::new(0.0, 0.0, 10.0, 10.0), "Person", &mut vocab)
            .unwrap();

        let err = store.seed_from_predictions(&[], &mut vocab).unwrap_err();
        assert!(matches!(err, ReviewError::StoreNotEmpty { len: 1 }));
    }

    #[test]
    fn seed_from_persisted_loads_valid_lines_and_warns_on_malformed() {
        let lines = parse_lines("0 0.5 0.5 0.2 0.2\n0 0.5 0.5\n", Some(Path::new("a.txt")));
        let mut store = BoxStore::new(200, 100);
        let report = store.seed_from_persisted(&lines, &vocab()).expect("seed");

        assert_eq!(store.len(), 1);
        assert_eq!(report.warning_count(), 1);
        let b = &store.boxes()[0];
        assert_eq!(b.id.as_str(), "Box 1");
        assert_eq!(b.label, "Person");
        assert!((b.rect.left - 80.0).abs() < 1e-9);
        assert!((b.rect.top - 40.0).abs() < 1e-9);
        assert!((b.rect.width - 40.0).abs() < 1e-9);
        assert!((b.rect.height - 20.0).abs() < 1e-9);
    }

    #[test]
    fn seed_from_persisted_keeps_out_of_range_class_as_orphan() {
        let lines = parse_lines("7 0.5 0.5 0.2 0.2\n", None);
        let mut store = BoxStore::new(10, 10);
        let report = store.seed_from_persisted(&lines, &vocab()).expect("seed");

        assert_eq!(store.boxes()[0].label, "class_7");
        assert_eq!(report.warning_count(), 1);
    }

    #[test]
    fn add_human_box_rejects_non_positive_extent() {
        let mut vocab = vocab();
        let mut store = BoxStore::new(100, 100);
        let err = store
            .add_human_box(PixelRect::new(5.0, 5.0, 0.0, 10.0), "Person", &mut vocab)
            .unwrap_err();
        assert!(matches!(err, ReviewError::InvalidGeometry { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn update_label_rejects_unknown_by_default() {
        let mut vocab = vocab();
        let mut store = BoxStore::new(100, 100);
        let id = store
            .add_human_box(PixelRect::new(0.0, 0.0, 10.0, 10.0), "Person", &mut vocab)
            .unwrap();

        let err = store.update_label(&id, "Tree", &mut vocab).unwrap_err();
        assert!(matches!(err, ReviewError::UnknownLabel { .. }));
        assert_eq!(store.get(&id).unwrap().label, "Person");

        let err = store
            .update_label(&BoxId::from("Box 99"), "Vehicle", &mut vocab)
            .unwrap_err();
        assert!(matches!(err, ReviewError::UnknownBox { .. }));
    }

    #[test]
    fn update_label_registers_under_register_policy() {
        let mut vocab = vocab();
        let mut store = BoxStore::new(100, 100).with_policy(UnknownLabelPolicy::Register);
        let id = store
            .add_human_box(PixelRect::new(0.0, 0.0, 10.0, 10.0), "Person", &mut vocab)
            .unwrap();

        store.update_label(&id, "Tree", &mut vocab).expect("register");
        assert_eq!(store.get(&id).unwrap().label, "Tree");
        assert_eq!(vocab.index_of("Tree"), Some(2));
    }

    #[test]
    fn edited_labels_are_trimmed_before_lookup_and_registration() {
        let mut vocab = vocab();
        let mut store = BoxStore::new(100, 100).with_policy(UnknownLabelPolicy::Register);
        let id = store
            .add_human_box(PixelRect::new(0.0, 0.0, 10.0, 10.0), " Person ", &mut vocab)
            .expect("known label with padding");
        assert_eq!(store.get(&id).unwrap().label, "Person");
        assert_eq!(vocab.len(), 2);

        store.update_label(&id, " Tree ", &mut vocab).expect("register");
        assert_eq!(store.get(&id).unwrap().label, "Tree");
        assert_eq!(vocab.index_of("Tree"), Some(2));
        assert_eq!(vocab.index_of(" Tree "), None);

        let err = store.update_label(&id, "   ", &mut vocab).unwrap_err();
        assert!(matches!(err, ReviewError::UnknownLabel { .. }));
    }

    #[test]
    fn seed_from_prediction_file_names_boxes_from_class_file() {
        let lines = parse_lines(
            "0 0.5 0.5 0.2 0.2\n3 0.25 0.25 0.1 0.1\n1 0.5 0.5 0.0 0.2\n",
            Some(Path::new("predictions/c.txt")),
        );
        let names = vec!["person".to_string(), String::new()];
        let mut vocab = vocab();
        let mut store = BoxStore::new(200, 100);
        let report = store
            .seed_from_prediction_file(&lines, &names, &mut vocab)
            .expect("seed");

        assert_eq!(report.source, SeedSource::PredictionFile);
        assert_eq!(report.loaded, 2);
        assert_eq!(report.warning_count(), 1);
        let boxes = store.boxes();
        assert_eq!(boxes[0].label, "person");
        assert_eq!(boxes[0].origin, Origin::Predicted);
        assert_eq!(boxes[0].confidence, None);
        assert_eq!(boxes[1].label, "class_3");
        assert_eq!(boxes[1].id.as_str(), "Box 2");
        assert_eq!(vocab.index_of("person"), Some(2));
        assert_eq!(vocab.index_of("class_3"), Some(3));
    }

    #[test]
    fn update_geometry_validates_like_add() {
        let mut vocab = vocab();
        let mut store = BoxStore::new(100, 100);
        let id = store
            .add_human_box(PixelRect::new(0.0, 0.0, 10.0, 10.0), "Person", &mut vocab)
            .unwrap();

        store
            .update_geometry(&id, PixelRect::new(20.0, 20.0, 5.0, 5.0))
            .expect("valid transform");
        assert_eq!(store.get(&id).unwrap().rect.left, 20.0);

        let err = store
            .update_geometry(&id, PixelRect::new(20.0, 20.0, -5.0, 5.0))
            .unwrap_err();
        assert!(matches!(err, ReviewError::InvalidGeometry { .. }));
    }

    #[test]
    fn removed_ids_are_never_recycled() {
        let mut vocab = vocab();
        let mut store = BoxStore::new(100, 100);
        let rect = PixelRect::new(0.0, 0.0, 10.0, 10.0);
        let a = store.add_human_box(rect, "Person", &mut vocab).unwrap();
        let b = store.add_human_box(rect, "Person", &mut vocab).unwrap();
        store.remove(&b).unwrap();
        let c = store.add_human_box(rect, "Person", &mut vocab).unwrap();

        assert_eq!(a.as_str(), "Box 1");
        assert_eq!(c.as_str(), "Box 3");
        let ids: HashSet<_> = store.boxes().iter().map(|b| b.id.clone()).collect();
        assert_eq!(ids.len(), store.len());

        let err = store.remove(&b).unwrap_err();
        assert!(matches!(err, ReviewError::UnknownBox { .. }));
    }

    #[test]
    fn removing_a_prediction_is_recorded() {
        let mut vocab = vocab();
        let mut store = BoxStore::new(100, 100);
        store
            .seed_from_predictions(&[detection(1.0, 1.0, 9.0, 9.0, 0.2, "Person")], &mut vocab)
            .unwrap();

        let removed = store.remove(&BoxId::sequential(1)).unwrap();
        assert_eq!(removed.origin, Origin::Predicted);
        assert!(store.is_empty());
        assert_eq!(store.removed().len(), 1);
        assert_eq!(store.removed()[0].id.as_str(), "Box 1");
    }

    #[test]
    fn snapshot_preserves_insertion_order() {
        let mut vocab = vocab();
        let mut store = BoxStore::new(100, 100);
        let rect = PixelRect::new(0.0, 0.0, 10.0, 10.0);
        for _ in 0..4 {
            store.add_human_box(rect, "Vehicle", &mut vocab).unwrap();
        }
        store.remove(&BoxId::sequential(2)).unwrap();

        let ids: Vec<String> = store
            .snapshot()
            .iter()
            .map(|b| b.id.to_string())
            .collect();
        assert_eq!(ids, vec!["Box 1", "Box 3", "Box 4"]);
    }
}
