//! Stable box identifiers.
//!
//! Boxes are addressed by id end-to-end; positional indices from a UI layer
//! must be translated to a [`BoxId`] before calling into the store.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a box, unique within one image's store.
///
/// Ids are allocated as `"Box 1"`, `"Box 2"`, ... and never recycled within
/// a session, so audit entries keep pointing at the same box.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoxId(String);

impl BoxId {
    /// Creates a BoxId from an arbitrary string.
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates the id for the `n`-th allocated box.
    #[inline]
    pub fn sequential(n: u64) -> Self {
        Self(format!("Box {n}"))
    }

    /// Returns the underlying string.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BoxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BoxId({})", self.0)
    }
}

impl fmt::Display for BoxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BoxId {
    fn from(id: &str) -> Self {
        BoxId::new(id)
    }
}

impl From<String> for BoxId {
    fn from(id: String) -> Self {
        BoxId::new(id)
    }
}
