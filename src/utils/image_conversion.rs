//! Conversion between raw byte frames (ndarray) and `OpenCV` matrices

use crate::{Error, Result};
use ndarray::Array3;
use opencv::core::{Mat, MatTraitConst, Scalar, Vec3b, CV_8UC3};
use opencv::prelude::MatTrait;

use super::safe_cast::{i32_to_usize, usize_to_i32};

/// Convert a `height x width x 3` byte buffer (BGR order) to an `OpenCV` Mat
///
/// # Errors
///
/// * Returns error if the array does not have exactly three channels
/// * Returns error if the frame is empty or too large
/// * Returns error if Mat creation fails
pub fn array3_u8_to_mat(array: &Array3<u8>) -> Result<Mat> {
    let (height, width, channels) = array.dim();
    if channels != 3 {
        return Err(Error::InvalidInput(format!(
            "Expected 3 color channels, got {channels}"
        )));
    }
    if height == 0 || width == 0 {
        return Err(Error::InvalidInput(format!("Empty frame: {height}x{width}")));
    }

    let rows = usize_to_i32(height)?;
    let cols = usize_to_i32(width)?;
    let mut mat = Mat::new_rows_cols_with_default(rows, cols, CV_8UC3, Scalar::default())?;

    for (row, row_index) in (0..rows).zip(0..height) {
        for (col, col_index) in (0..cols).zip(0..width) {
            let mut pixel = Vec3b::default();
            for ch in 0..3 {
                pixel[ch] = array[[row_index, col_index, ch]];
            }
            *mat.at_2d_mut::<Vec3b>(row, col)? = pixel;
        }
    }

    Ok(mat)
}

/// Convert a 3-channel 8-bit Mat back to a `height x width x 3` byte buffer
///
/// # Errors
///
/// * Returns error if the Mat is not 3-channel
/// * Returns error if Mat data cannot be accessed
pub fn mat_to_array3_u8(mat: &Mat) -> Result<Array3<u8>> {
    if mat.channels() != 3 {
        return Err(Error::InvalidInput(format!(
            "Expected a 3-channel Mat, got {} channels",
            mat.channels()
        )));
    }

    let height = i32_to_usize(mat.rows())?;
    let width = i32_to_usize(mat.cols())?;
    let mut array = Array3::<u8>::zeros((height, width, 3));

    for (row, row_index) in (0..mat.rows()).zip(0..height) {
        for (col, col_index) in (0..mat.cols()).zip(0..width) {
            let pixel = mat.at_2d::<Vec3b>(row, col)?;
            for ch in 0..3 {
                array[[row_index, col_index, ch]] = pixel[ch];
            }
        }
    }

    Ok(array)
}
