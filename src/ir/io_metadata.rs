//! The run-wide mining metadata document.
//!
//! A YAML list of [`ImageRecord`]s, one per scored image, written by the
//! mining pipeline and read back when a review session opens an image for
//! the first time.

use std::fs;
use std::path::Path;

use super::model::ImageRecord;
use crate::error::ReviewError;
use crate::fsutil::write_atomic;

/// Reads a metadata document. A missing file yields no records.
pub fn read_metadata(path: &Path) -> Result<Vec<ImageRecord>, ReviewError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path).map_err(ReviewError::Io)?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_yaml::from_str(&content).map_err(|source| ReviewError::MetadataParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Atomically writes a metadata document.
pub fn write_metadata(path: &Path, records: &[ImageRecord]) -> Result<(), ReviewError> {
    let yaml = serde_yaml::to_string(records).map_err(|source| ReviewError::MetadataWrite {
        path: path.to_path_buf(),
        source,
    })?;
    write_atomic(path, yaml.as_bytes())
}

/// Finds the record for an image path relative to the project root.
pub fn find_record<'a>(records: &'a [ImageRecord], image_path: &str) -> Option<&'a ImageRecord> {
    records.iter().find(|record| record.image_path == image_path)
}
