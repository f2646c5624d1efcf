//! Pixel-space ↔ normalized center-format conversion.
//!
//! Uses the YOLO convention: `x_center = (left + width / 2) / image_width`,
//! `w = width / image_width`, and likewise for the vertical axis.
//!
//! A normalize → denormalize cycle reconstructs the pixel box to within
//! `1e-4` pixels for any valid in-bounds box.

use tracing::warn;

use super::bbox::{NormalizedRect, PixelRect};
use crate::error::ReviewError;

/// How far a normalized value may fall outside `[0, 1]` and still be clamped.
///
/// Values further out are rejected with `InvalidGeometry`.
pub const CLAMP_TOLERANCE: f64 = 1e-3;

/// Converts a pixel rectangle to normalized center format.
pub fn to_normalized(
    rect: &PixelRect,
    image_width: f64,
    image_height: f64,
) -> Result<NormalizedRect, ReviewError> {
    check_image_dims(image_width, image_height)?;
    if !rect.is_valid() {
        return Err(ReviewError::geometry(format!(
            "box ({}, {}, {}, {}) must be finite with positive width and height",
            rect.left, rect.top, rect.width, rect.height
        )));
    }

    let x_center = (rect.left + rect.width / 2.0) / image_width;
    let y_center = (rect.top + rect.height / 2.0) / image_height;
    let w = rect.width / image_width;
    let h = rect.height / image_height;

    Ok(NormalizedRect::new(
        clamp_unit(x_center, "x_center")?,
        clamp_unit(y_center, "y_center")?,
        clamp_unit(w, "w")?,
        clamp_unit(h, "h")?,
    ))
}

/// Converts a normalized center-format box back to pixel space.
pub fn to_pixel(
    rect: &NormalizedRect,
    image_width: f64,
    image_height: f64,
) -> Result<PixelRect, ReviewError> {
    check_image_dims(image_width, image_height)?;

    let x_center = clamp_unit(rect.x_center, "x_center")?;
    let y_center = clamp_unit(rect.y_center, "y_center")?;
    let w = clamp_unit(rect.w, "w")?;
    let h = clamp_unit(rect.h, "h")?;

    if w <= 0.0 || h <= 0.0 {
        return Err(ReviewError::geometry(format!(
            "normalized size {w}x{h} must be positive"
        )));
    }

    let width = w * image_width;
    let height = h * image_height;
    Ok(PixelRect::new(
        x_center * image_width - width / 2.0,
        y_center * image_height - height / 2.0,
        width,
        height,
    ))
}

fn check_image_dims(image_width: f64, image_height: f64) -> Result<(), ReviewError> {
    if !(image_width.is_finite() && image_height.is_finite())
        || image_width <= 0.0
        || image_height <= 0.0
    {
        return Err(ReviewError::geometry(format!(
            "image dimensions {image_width}x{image_height} must be positive"
        )));
    }
    Ok(())
}

fn clamp_unit(value: f64, field: &str) -> Result<f64, ReviewError> {
    if !value.is_finite() {
        return Err(ReviewError::geometry(format!(
            "normalized {field} is not finite"
        )));
    }
    if (0.0..=1.0).contains(&value) {
        return Ok(value);
    }
    if value < -CLAMP_TOLERANCE || value > 1.0 + CLAMP_TOLERANCE {
        return Err(ReviewError::geometry(format!(
            "normalized {field} {value} is outside [0, 1]"
        )));
    }

    let clamped = value.clamp(0.0, 1.0);
    warn!(field, value, clamped, "clamped normalized coordinate into [0, 1]");
    Ok(clamped)
}
