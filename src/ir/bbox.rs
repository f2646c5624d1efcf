//! Box geometry in the three shapes the review tool deals with.
//!
//! - [`PixelRect`]: `{left, top, width, height}` in pixels, the canonical
//!   geometry of a box while it is being reviewed.
//! - [`NormalizedRect`]: `{x_center, y_center, w, h}` as fractions of the
//!   image size, the shape persisted by the line and descriptive formats.
//! - [`BBoxXYXY`]: absolute corner coordinates as produced by a detector.
//!
//! Conversions between pixel and normalized space live in
//! [`codec`](super::codec) because they need the image dimensions and can fail.

use serde::{Deserialize, Serialize};

/// A box in pixel space, anchored at its top-left corner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PixelRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelRect {
    #[inline]
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Returns the right edge (`left + width`).
    #[inline]
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    /// Returns the bottom edge (`top + height`).
    #[inline]
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Returns true if all fields are finite (not NaN or infinite).
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.left.is_finite()
            && self.top.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
    }

    /// Returns true if the rectangle is finite with strictly positive extent.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// A box in normalized center format, every field nominally in `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub x_center: f64,
    pub y_center: f64,
    pub w: f64,
    pub h: f64,
}

impl NormalizedRect {
    #[inline]
    pub fn new(x_center: f64, y_center: f64, w: f64, h: f64) -> Self {
        Self {
            x_center,
            y_center,
            w,
            h,
        }
    }

    /// Returns the fields in `[x_center, y_center, w, h]` order.
    #[inline]
    pub fn to_array(&self) -> [f64; 4] {
        [self.x_center, self.y_center, self.w, self.h]
    }

    #[inline]
    pub fn from_array(values: [f64; 4]) -> Self {
        Self::new(values[0], values[1], values[2], values[3])
    }
}

/// An axis-aligned box in absolute XYXY pixel coordinates (x1, y1, x2, y2).
///
/// This does NOT enforce `x1 < x2` in the constructor: detectors occasionally
/// emit degenerate boxes, and callers decide whether to skip or report them.
///
/// Serializes as a flat `[x1, y1, x2, y2]` sequence.
#[derive(Clone, Copy, Default, PartialEq)]
pub struct BBoxXYXY {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BBoxXYXY {
    #[inline]
    pub fn from_xyxy(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Returns the width of the box. May be negative if malformed.
    #[inline]
    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    /// Returns the height of the box. May be negative if malformed.
    #[inline]
    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    /// Converts to a top-left anchored [`PixelRect`].
    #[inline]
    pub fn to_rect(&self) -> PixelRect {
        PixelRect::new(self.x1, self.y1, self.width(), self.height())
    }

    /// Converts a [`PixelRect`] back to corner form.
    #[inline]
    pub fn from_rect(rect: &PixelRect) -> Self {
        Self::from_xyxy(rect.left, rect.top, rect.right(), rect.bottom())
    }
}

impl std::fmt::Debug for BBoxXYXY {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BBoxXYXY")
            .field("x1", &self.x1)
            .field("y1", &self.y1)
            .field("x2", &self.x2)
            .field("y2", &self.y2)
            .finish()
    }
}

impl Serialize for BBoxXYXY {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        [self.x1, self.y1, self.x2, self.y2].serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BBoxXYXY {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let [x1, y1, x2, y2] = <[f64; 4]>::deserialize(deserializer)?;
        Ok(BBoxXYXY::from_xyxy(x1, y1, x2, y2))
    }
}
