//! Per-image review sessions.
//!
//! A [`ReviewSession`] binds the reviewer's transient context (which image,
//! which box is selected) to that image's [`BoxStore`]. The store never
//! knows about selection or positional indices; the UI layer goes through
//! the session to translate a row index into a [`BoxId`].

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::ProjectLayout;
use crate::error::ReviewError;
use crate::fsutil::read_image_dimensions;
use crate::ir::io_descriptive::read_descriptive;
use crate::ir::io_lines::{read_class_names, read_lines_file};
use crate::ir::io_metadata::find_record;
use crate::ir::{BoxId, ImageRecord, LabelVocabulary, ReviewBox, UnknownLabelPolicy};
use crate::persist::{save_store, SaveSummary};
use crate::store::{BoxStore, LoadReport, SeedSource};

/// The image a session is bound to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageRef {
    /// Path relative to the project root.
    pub path: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug)]
pub struct ReviewSession {
    image: ImageRef,
    store: BoxStore,
    load_report: LoadReport,
    selected: Option<BoxId>,
}

impl ReviewSession {
    /// Starts a session with an empty store.
    pub fn new(image: ImageRef) -> Self {
        let store = BoxStore::new(image.width, image.height);
        Self {
            image,
            store,
            load_report: LoadReport::new(SeedSource::Empty),
            selected: None,
        }
    }

    /// Opens an image, seeding its store from the best available source.
    ///
    /// A reviewed normalized-line file wins; otherwise the image's mining
    /// record seeds predicted boxes; otherwise the mining run's prediction
    /// file does, named through `classes.txt`; otherwise the store starts empty.
    pub fn open(
        layout: &ProjectLayout,
        image: &Path,
        metadata: &[ImageRecord],
        vocab: &mut LabelVocabulary,
    ) -> Result<Self, ReviewError> {
        let mut session = Self::new(Self::image_ref(layout, image)?);
        let lines_path = layout.lines_path(&session.image.path)?;

        if lines_path.is_file() {
            let parsed = read_lines_file(&lines_path)?;
            session.load_report = session.store.seed_from_persisted(&parsed, vocab)?;
        } else if let Some(record) = find_record(metadata, &session.image.path) {
            session.load_report = session
                .store
                .seed_from_predictions(&record.detections, vocab)?;
        } else {
            let prediction_path = layout.prediction_path(&session.image.path)?;
            if prediction_path.is_file() {
                let parsed = read_lines_file(&prediction_path)?;
                let class_names = read_class_names(&layout.classes_path())?;
                session.load_report = session
                    .store
                    .seed_from_prediction_file(&parsed, &class_names, vocab)?;
            }
        }

        info!(
            image = %session.image.path,
            source = session.load_report.source.name(),
            boxes = session.load_report.loaded,
            warnings = session.load_report.warning_count(),
            "opened image"
        );
        Ok(session)
    }

    /// Opens an image from its descriptive document, matching labels by name.
    ///
    /// A missing document yields an empty store.
    pub fn open_descriptive(
        layout: &ProjectLayout,
        image: &Path,
        vocab: &LabelVocabulary,
    ) -> Result<Self, ReviewError> {
        let mut session = Self::new(Self::image_ref(layout, image)?);
        let doc_path = layout.descriptive_path(&session.image.path)?;

        if doc_path.is_file() {
            let doc = read_descriptive(&doc_path)?;
            session.load_report = session.store.seed_from_descriptive(&doc, vocab)?;
        }
        Ok(session)
    }

    /// Sets the unknown-label policy for edits made through this session.
    pub fn with_policy(mut self, policy: UnknownLabelPolicy) -> Self {
        self.store.set_policy(policy);
        self
    }

    pub fn image(&self) -> &ImageRef {
        &self.image
    }

    pub fn store(&self) -> &BoxStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut BoxStore {
        &mut self.store
    }

    /// Warnings and counts from seeding.
    pub fn load_report(&self) -> &LoadReport {
        &self.load_report
    }

    /// Translates a positional index in the current snapshot into an id.
    pub fn box_id_at(&self, index: usize) -> Result<BoxId, ReviewError> {
        self.store
            .boxes()
            .get(index)
            .map(|b| b.id.clone())
            .ok_or_else(|| ReviewError::UnknownBox {
                id: format!("#{index}"),
            })
    }

    pub fn select(&mut self, id: &BoxId) -> Result<(), ReviewError> {
        if !self.store.contains(id) {
            return Err(ReviewError::UnknownBox { id: id.to_string() });
        }
        debug!(id = %id, "selected box");
        self.selected = Some(id.clone());
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// The selected box, if it still exists.
    pub fn selected(&self) -> Option<&ReviewBox> {
        self.selected.as_ref().and_then(|id| self.store.get(id))
    }

    /// Removes a box, dropping the selection if it pointed at it.
    pub fn remove(&mut self, id: &BoxId) -> Result<ReviewBox, ReviewError> {
        let removed = self.store.remove(id)?;
        if self.selected.as_ref() == Some(id) {
            self.selected = None;
        }
        Ok(removed)
    }

    /// Saves the store through every persisted encoding, stamped now.
    pub fn save(
        &self,
        layout: &ProjectLayout,
        vocab: &LabelVocabulary,
    ) -> Result<SaveSummary, ReviewError> {
        self.save_at(layout, vocab, Utc::now())
    }

    pub fn save_at(
        &self,
        layout: &ProjectLayout,
        vocab: &LabelVocabulary,
        timestamp: DateTime<Utc>,
    ) -> Result<SaveSummary, ReviewError> {
        save_store(layout, &self.image.path, &self.store, vocab, timestamp)
    }

    fn image_ref(layout: &ProjectLayout, image: &Path) -> Result<ImageRef, ReviewError> {
        let (abs, rel) = layout.resolve_image(image)?;
        let (width, height) = read_image_dimensions(&abs)?;
        Ok(ImageRef {
            path: rel,
            width,
            height,
        })
    }
}
