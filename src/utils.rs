//! Utility functions for frame conversion and joint projection.

pub mod image_conversion;
pub mod safe_cast;

use crate::joints::{Joint, JointFrame};
use opencv::core::{Point, Vector};
use safe_cast::normalized_to_pixel;

/// Project the visible joints among `joints` into pixel space of a
/// `width x height` frame
#[must_use]
pub fn project_joints(frame: &JointFrame, joints: &[Joint], width: i32, height: i32) -> Vector<Point> {
    joints
        .iter()
        .filter_map(|&joint| frame.get(joint))
        .map(|p| Point::new(normalized_to_pixel(p.x, width), normalized_to_pixel(p.y, height)))
        .collect()
}
