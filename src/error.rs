use std::path::PathBuf;
use thiserror::Error;

use crate::persist::FormatKind;

/// The main error type for boxreview operations.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid geometry: {message}")]
    InvalidGeometry { message: String },

    #[error("Unknown box '{id}'")]
    UnknownBox { id: String },

    #[error("Unknown label '{label}' (known labels: {known})")]
    UnknownLabel { label: String, known: String },

    #[error("Box store already holds {len} box(es); seeding requires an empty store")]
    StoreNotEmpty { len: usize },

    #[error(
        "Partial save of {image}: completed [{}], failed at {failed}: {source}",
        FormatKind::join(.completed)
    )]
    PartialSave {
        image: String,
        completed: Vec<FormatKind>,
        failed: FormatKind,
        #[source]
        source: Box<ReviewError>,
    },

    #[error("Invalid project structure at {path}: {message}")]
    ProjectStructure { path: PathBuf, message: String },

    #[error("Failed to read image dimensions from {path}: {source}")]
    ImageDimensionRead {
        path: PathBuf,
        #[source]
        source: imagesize::ImageError,
    },

    #[error("Failed to write {path}: {source}")]
    AtomicWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse mining metadata from {path}: {source}")]
    MetadataParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to serialize mining metadata for {path}: {source}")]
    MetadataWrite {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to parse annotation document {path}: {source}")]
    DescriptiveParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to serialize annotation document for {path}: {source}")]
    DescriptiveWrite {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to parse audit log {path}: {source}")]
    AuditParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize audit log for {path}: {source}")]
    AuditWrite {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to parse detections from {path}: {source}")]
    DetectionsParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize report as JSON: {source}")]
    ReportWrite {
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to parse project config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to serialize project config for {path}: {source}")]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

impl ReviewError {
    pub(crate) fn geometry(message: impl Into<String>) -> Self {
        ReviewError::InvalidGeometry {
            message: message.into(),
        }
    }
}
