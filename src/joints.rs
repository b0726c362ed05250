//! Body joints supplied by the external pose estimator.
//!
//! Coordinates are normalized to `[0, 1] x [0, 1]` with the y axis growing
//! downwards, as delivered by the pose model.

use crate::constants::NUM_JOINTS;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One of the 13 tracked joints
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    Nose,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl Joint {
    /// All joints in index order
    pub const ALL: [Joint; NUM_JOINTS] = [
        Joint::Nose,
        Joint::LeftShoulder,
        Joint::RightShoulder,
        Joint::LeftElbow,
        Joint::RightElbow,
        Joint::LeftWrist,
        Joint::RightWrist,
        Joint::LeftHip,
        Joint::RightHip,
        Joint::LeftKnee,
        Joint::RightKnee,
        Joint::LeftAnkle,
        Joint::RightAnkle,
    ];

    /// Joints that make up the upper body region
    pub const UPPER_BODY: [Joint; 7] = [
        Joint::Nose,
        Joint::LeftShoulder,
        Joint::RightShoulder,
        Joint::LeftElbow,
        Joint::RightElbow,
        Joint::LeftWrist,
        Joint::RightWrist,
    ];

    /// Joints that make up the lower body region
    pub const LOWER_BODY: [Joint; 6] = [
        Joint::LeftHip,
        Joint::RightHip,
        Joint::LeftKnee,
        Joint::RightKnee,
        Joint::LeftAnkle,
        Joint::RightAnkle,
    ];

    /// Position of the joint in [`Joint::ALL`]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Snake case name used in recorded sequences
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Joint::Nose => "nose",
            Joint::LeftShoulder => "left_shoulder",
            Joint::RightShoulder => "right_shoulder",
            Joint::LeftElbow => "left_elbow",
            Joint::RightElbow => "right_elbow",
            Joint::LeftWrist => "left_wrist",
            Joint::RightWrist => "right_wrist",
            Joint::LeftHip => "left_hip",
            Joint::RightHip => "right_hip",
            Joint::LeftKnee => "left_knee",
            Joint::RightKnee => "right_knee",
            Joint::LeftAnkle => "left_ankle",
            Joint::RightAnkle => "right_ankle",
        }
    }
}

impl fmt::Display for Joint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Joint positions for a single frame. Any joint may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<Joint, [f64; 2]>", into = "BTreeMap<Joint, [f64; 2]>")]
pub struct JointFrame {
    positions: [Option<Point2<f64>>; NUM_JOINTS],
}

impl JointFrame {
    /// Create an empty frame (no joints detected)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the position of a joint
    pub fn set(&mut self, joint: Joint, x: f64, y: f64) {
        self.positions[joint.index()] = Some(Point2::new(x, y));
    }

    /// Builder-style variant of [`JointFrame::set`]
    #[must_use]
    pub fn with(mut self, joint: Joint, x: f64, y: f64) -> Self {
        self.set(joint, x, y);
        self
    }

    /// Remove a joint
    pub fn remove(&mut self, joint: Joint) {
        self.positions[joint.index()] = None;
    }

    /// Position of a joint, if visible
    #[must_use]
    pub fn get(&self, joint: Joint) -> Option<Point2<f64>> {
        self.positions[joint.index()]
    }

    /// Whether the joint is visible
    #[must_use]
    pub fn contains(&self, joint: Joint) -> bool {
        self.positions[joint.index()].is_some()
    }

    /// Number of visible joints
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.iter().filter(|p| p.is_some()).count()
    }

    /// True when no joint is visible
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.iter().all(Option::is_none)
    }

    /// Iterate over visible joints
    pub fn iter(&self) -> impl Iterator<Item = (Joint, Point2<f64>)> + '_ {
        Joint::ALL
            .iter()
            .filter_map(move |&joint| self.get(joint).map(|p| (joint, p)))
    }

    /// Midpoint of two joints when both are visible
    #[must_use]
    pub fn midpoint(&self, a: Joint, b: Joint) -> Option<Point2<f64>> {
        let (pa, pb) = (self.get(a)?, self.get(b)?);
        Some(nalgebra::center(&pa, &pb))
    }

    /// Midpoint of the two hips
    #[must_use]
    pub fn hip_center(&self) -> Option<Point2<f64>> {
        self.midpoint(Joint::LeftHip, Joint::RightHip)
    }

    /// Midpoint of the two shoulders
    #[must_use]
    pub fn shoulder_center(&self) -> Option<Point2<f64>> {
        self.midpoint(Joint::LeftShoulder, Joint::RightShoulder)
    }
}

impl From<BTreeMap<Joint, [f64; 2]>> for JointFrame {
    fn from(map: BTreeMap<Joint, [f64; 2]>) -> Self {
        let mut frame = Self::new();
        for (joint, [x, y]) in map {
            frame.set(joint, x, y);
        }
        frame
    }
}

impl From<JointFrame> for BTreeMap<Joint, [f64; 2]> {
    fn from(frame: JointFrame) -> Self {
        frame.iter().map(|(joint, p)| (joint, [p.x, p.y])).collect()
    }
}

impl FromIterator<(Joint, (f64, f64))> for JointFrame {
    fn from_iter<I: IntoIterator<Item = (Joint, (f64, f64))>>(iter: I) -> Self {
        let mut frame = Self::new();
        for (joint, (x, y)) in iter {
            frame.set(joint, x, y);
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joint_indices_match_order() {
        for (i, joint) in Joint::ALL.iter().enumerate() {
            assert_eq!(joint.index(), i);
        }
    }

    #[test]
    fn test_empty_frame() {
        let frame = JointFrame::new();
        assert!(frame.is_empty());
        assert_eq!(frame.len(), 0);
        assert!(frame.hip_center().is_none());
    }

    #[test]
    fn test_hip_center() {
        let frame = JointFrame::new()
            .with(Joint::LeftHip, 0.4, 0.6)
            .with(Joint::RightHip, 0.6, 0.5);

        let center = frame.hip_center().unwrap();
        assert!((center.x - 0.5).abs() < 1e-12);
        assert!((center.y - 0.55).abs() < 1e-12);
    }

    #[test]
    fn test_yaml_roundtrip_uses_joint_names() {
        let frame = JointFrame::new()
            .with(Joint::Nose, 0.5, 0.1)
            .with(Joint::RightAnkle, 0.55, 0.95);

        let yaml = serde_yaml::to_string(&frame).unwrap();
        assert!(yaml.contains("nose"));
        assert!(yaml.contains("right_ankle"));

        let parsed: JointFrame = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn test_unknown_joint_is_rejected() {
        let result: std::result::Result<JointFrame, _> = serde_yaml::from_str("left_toe: [0.1, 0.2]\n");
        assert!(result.is_err());
    }
}
