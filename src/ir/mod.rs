//! The canonical annotation representation and its persisted encodings.
//!
//! Every persisted format converts through the types defined here:
//!
//! - [`io_lines`]: normalized-line label files (`<class> <cx> <cy> <w> <h>`)
//! - [`io_descriptive`]: per-image YAML documents keyed by label name
//! - [`io_audit`]: the append-only, per-image audit log
//! - [`io_metadata`]: the mining run's list of [`ImageRecord`]s
//!
//! Pixel geometry ([`PixelRect`]) is canonical while an image is open;
//! normalized geometry ([`NormalizedRect`]) is always derived through
//! [`codec`] using the image's dimensions.
//!
//! # Example
//!
//! ```
//! use boxreview::ir::{codec, PixelRect};
//!
//! let rect = PixelRect::new(10.0, 10.0, 20.0, 10.0);
//! let norm = codec::to_normalized(&rect, 100.0, 50.0).unwrap();
//! assert!((norm.x_center - 0.2).abs() < 1e-12);
//! ```

mod bbox;
pub mod codec;
mod ids;
pub mod io_audit;
pub mod io_descriptive;
pub mod io_lines;
pub mod io_metadata;
mod model;
mod vocab;

// Re-export core types for convenient access
pub use bbox::{BBoxXYXY, NormalizedRect, PixelRect};
pub use ids::BoxId;
pub use model::{max_confidence, Detection, ImageRecord, Origin, ReviewBox};
pub use vocab::{LabelVocabulary, UnknownLabelPolicy, DEFAULT_LABELS, LABEL_PALETTE};
