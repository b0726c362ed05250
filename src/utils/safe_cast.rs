//! Checked numeric conversions between image dimensions and pixel coordinates

use crate::{Error, Result};

/// Convert an array dimension to an `OpenCV` dimension
///
/// # Errors
///
/// Returns an error if the value exceeds `i32::MAX`
pub fn usize_to_i32(value: usize) -> Result<i32> {
    value
        .try_into()
        .map_err(|_| Error::InvalidInput(format!("Dimension {value} too large for OpenCV")))
}

/// Convert an `OpenCV` dimension to an array dimension
///
/// # Errors
///
/// Returns an error if the value is negative
pub fn i32_to_usize(value: i32) -> Result<usize> {
    value
        .try_into()
        .map_err(|_| Error::InvalidInput(format!("Negative dimension {value}")))
}

/// Scale a normalized coordinate to a pixel index in `0..extent`.
///
/// Non-finite coordinates map to 0; out-of-frame coordinates are clamped
/// to the nearest edge.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // Clamping keeps the value in range
pub fn normalized_to_pixel(value: f64, extent: i32) -> i32 {
    if extent <= 0 || !value.is_finite() {
        return 0;
    }
    let max = extent - 1;
    // Truncation towards zero, like an integer cast of `x * width`
    let scaled = (value * f64::from(extent)).trunc();
    scaled.clamp(0.0, f64::from(max)) as i32
}

/// Number of pixels of a `rows x cols` frame as a float
#[must_use]
pub fn pixel_count(rows: i32, cols: i32) -> f64 {
    f64::from(rows.max(0)) * f64::from(cols.max(0))
}
