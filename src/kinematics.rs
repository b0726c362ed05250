//! Kinematic feature extraction from per-frame joint positions.
//!
//! Each frame yields a fixed 16-value [`FeatureVector`]:
//! four joint angles, the trunk inclination and eleven joint velocities.
//! The extractor also tracks the apparent body size across frames, which
//! tells whether the subject walks towards or away from the camera.

use crate::{
    constants::{
        BODY_SCALE_HISTORY_CAPACITY, DEFAULT_BODY_SCALE, DEFAULT_HIP_ANGLE, DEFAULT_KNEE_ANGLE,
        DEFAULT_TRUNK_INCLINATION, DEGENERATE_ANGLE, NUM_RAW_FEATURES, NUM_VELOCITIES,
        POSITION_HISTORY_CAPACITY, SCALE_TREND_SAMPLES, SCALE_TREND_SLOPE, VELOCITY_OFFSET,
    },
    history::RingBuffer,
    joints::{Joint, JointFrame},
    Error, Result,
};
use log::{debug, warn};
use nalgebra::{Point2, Vector2};
use std::fmt;

/// Feature names in vector order
pub const FEATURE_NAMES: [&str; NUM_RAW_FEATURES] = [
    "right_knee_angle",
    "left_knee_angle",
    "right_hip_angle",
    "left_hip_angle",
    "trunk_inclination",
    "vel_nose",
    "vel_left_shoulder",
    "vel_right_shoulder",
    "vel_left_hip",
    "vel_right_hip",
    "vel_left_knee",
    "vel_right_knee",
    "vel_left_ankle",
    "vel_right_ankle",
    "vel_left_wrist",
    "vel_right_wrist",
];

/// Joints whose velocity is tracked, in vector order
pub const VELOCITY_JOINTS: [Joint; NUM_VELOCITIES] = [
    Joint::Nose,
    Joint::LeftShoulder,
    Joint::RightShoulder,
    Joint::LeftHip,
    Joint::RightHip,
    Joint::LeftKnee,
    Joint::RightKnee,
    Joint::LeftAnkle,
    Joint::RightAnkle,
    Joint::LeftWrist,
    Joint::RightWrist,
];

/// The 16 raw kinematic features of one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f64; NUM_RAW_FEATURES]);

impl FeatureVector {
    /// All-zero vector, returned when extraction cannot produce anything better
    #[must_use]
    pub const fn zeros() -> Self {
        Self([0.0; NUM_RAW_FEATURES])
    }

    #[must_use]
    pub const fn from_array(values: [f64; NUM_RAW_FEATURES]) -> Self {
        Self(values)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        NUM_RAW_FEATURES
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    #[must_use]
    pub fn right_knee_angle(&self) -> f64 {
        self.0[0]
    }

    #[must_use]
    pub fn left_knee_angle(&self) -> f64 {
        self.0[1]
    }

    #[must_use]
    pub fn right_hip_angle(&self) -> f64 {
        self.0[2]
    }

    #[must_use]
    pub fn left_hip_angle(&self) -> f64 {
        self.0[3]
    }

    #[must_use]
    pub fn trunk_inclination(&self) -> f64 {
        self.0[4]
    }

    /// The eleven joint velocities
    #[must_use]
    pub fn velocities(&self) -> &[f64] {
        &self.0[VELOCITY_OFFSET..]
    }

    #[must_use]
    pub fn mean_knee_angle(&self) -> f64 {
        (self.right_knee_angle() + self.left_knee_angle()) / 2.0
    }

    #[must_use]
    pub fn mean_hip_angle(&self) -> f64 {
        (self.right_hip_angle() + self.left_hip_angle()) / 2.0
    }

    #[must_use]
    pub fn knee_asymmetry(&self) -> f64 {
        (self.right_knee_angle() - self.left_knee_angle()).abs()
    }

    #[must_use]
    pub fn hip_asymmetry(&self) -> f64 {
        (self.right_hip_angle() - self.left_hip_angle()).abs()
    }
}

impl TryFrom<&[f64]> for FeatureVector {
    type Error = Error;

    fn try_from(values: &[f64]) -> Result<Self> {
        let array: [f64; NUM_RAW_FEATURES] =
            values.try_into().map_err(|_| Error::MalformedFeatureVector {
                expected: NUM_RAW_FEATURES,
                actual: values.len(),
            })?;
        Ok(Self(array))
    }
}

impl std::ops::Index<usize> for FeatureVector {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.0[index]
    }
}

/// Direction of the body-scale trend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleTrend {
    /// Body grows in the image
    Approaching,
    /// Body shrinks in the image
    MovingAway,
    /// No significant change, or not enough samples
    Static,
}

impl fmt::Display for ScaleTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScaleTrend::Approaching => "approaching",
            ScaleTrend::MovingAway => "moving_away",
            ScaleTrend::Static => "static",
        })
    }
}

/// Angle in degrees at `vertex` between the rays towards `p1` and `p3`.
///
/// Returns [`DEGENERATE_ANGLE`] when either ray has zero length.
#[must_use]
pub fn angle(p1: Point2<f64>, vertex: Point2<f64>, p3: Point2<f64>) -> f64 {
    let v1 = p1 - vertex;
    let v2 = p3 - vertex;

    let (n1, n2) = (v1.norm(), v2.norm());
    if n1 == 0.0 || n2 == 0.0 {
        return DEGENERATE_ANGLE;
    }

    let cos = (v1.dot(&v2) / (n1 * n2)).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}

/// Apparent body size: mean of shoulder width and torso height.
///
/// Falls back to the shoulder width when the hips are missing, and to
/// [`DEFAULT_BODY_SCALE`] when the shoulders are missing.
#[must_use]
pub fn body_scale(frame: &JointFrame) -> f64 {
    let (Some(left), Some(right)) = (frame.get(Joint::LeftShoulder), frame.get(Joint::RightShoulder)) else {
        return DEFAULT_BODY_SCALE;
    };
    let shoulder_width = (left - right).norm();

    match (frame.shoulder_center(), frame.hip_center()) {
        (Some(shoulders), Some(hips)) => (shoulder_width + (shoulders - hips).norm()) / 2.0,
        _ => shoulder_width,
    }
}

/// Translate every joint so that the hip center becomes the origin.
///
/// Frames without both hips are returned unchanged.
#[must_use]
pub fn normalize(frame: &JointFrame) -> JointFrame {
    let Some(center) = frame.hip_center() else {
        return frame.clone();
    };

    frame
        .iter()
        .map(|(joint, p)| (joint, (p.x - center.x, p.y - center.y)))
        .collect()
}

/// Signed trunk angle from vertical, in degrees.
///
/// Computed as `atan2(dx, -dy)` of the hip-to-shoulder vector, so an upright
/// trunk reads 0 (not 90, as an angle measured from the horizontal would) and
/// a horizontal trunk reads ±90. Positive when leaning towards +x. The image
/// y axis grows downwards, hence the flipped `dy`. Bend thresholds compare
/// against the absolute value.
#[must_use]
pub fn trunk_inclination(normalized: &JointFrame) -> f64 {
    let (Some(shoulders), Some(hips)) = (normalized.shoulder_center(), normalized.hip_center()) else {
        return DEFAULT_TRUNK_INCLINATION;
    };

    let offset = shoulders - hips;
    let trunk = Vector2::new(offset.x, -offset.y);
    if trunk.norm() == 0.0 {
        return DEFAULT_TRUNK_INCLINATION;
    }

    trunk.x.atan2(trunk.y).to_degrees()
}

/// Least-squares slope of `samples` against their index
fn linear_slope(samples: &[f64]) -> f64 {
    let n = samples.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = samples.iter().sum::<f64>() / n;

    let (num, den) = samples
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(num, den), (i, &y)| {
            let dx = i as f64 - mean_x;
            (num + dx * (y - mean_y), den + dx * dx)
        });

    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// Stateful extractor producing one [`FeatureVector`] per frame
#[derive(Debug, Clone)]
pub struct KinematicFeatureExtractor {
    position_history: RingBuffer<JointFrame>,
    body_scale_history: RingBuffer<f64>,
}

impl Default for KinematicFeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl KinematicFeatureExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            position_history: RingBuffer::new(POSITION_HISTORY_CAPACITY),
            body_scale_history: RingBuffer::new(BODY_SCALE_HISTORY_CAPACITY),
        }
    }

    /// Extract the 16 features for a frame.
    ///
    /// Missing joints fall back to fixed defaults. An empty frame, or any
    /// non-finite result, yields an all-zero vector.
    pub fn extract_features(&mut self, frame: &JointFrame) -> FeatureVector {
        if frame.is_empty() {
            return FeatureVector::zeros();
        }

        self.body_scale_history.push(body_scale(frame));

        let normalized = normalize(frame);
        self.position_history.push(normalized);

        match self.compute_features() {
            Ok(features) => features,
            Err(e) => {
                warn!("Kinematic feature extraction failed: {e}");
                FeatureVector::zeros()
            }
        }
    }

    fn compute_features(&self) -> Result<FeatureVector> {
        let current = self
            .position_history
            .latest()
            .ok_or_else(|| Error::InvalidInput("Position history is empty".to_string()))?;

        let joint_angle = |a: Joint, vertex: Joint, b: Joint, default: f64| -> f64 {
            match (current.get(a), current.get(vertex), current.get(b)) {
                (Some(pa), Some(pv), Some(pb)) => angle(pa, pv, pb),
                _ => default,
            }
        };

        let mut values = [0.0; NUM_RAW_FEATURES];
        values[0] = joint_angle(Joint::RightHip, Joint::RightKnee, Joint::RightAnkle, DEFAULT_KNEE_ANGLE);
        values[1] = joint_angle(Joint::LeftHip, Joint::LeftKnee, Joint::LeftAnkle, DEFAULT_KNEE_ANGLE);
        values[2] = joint_angle(Joint::RightShoulder, Joint::RightHip, Joint::RightKnee, DEFAULT_HIP_ANGLE);
        values[3] = joint_angle(Joint::LeftShoulder, Joint::LeftHip, Joint::LeftKnee, DEFAULT_HIP_ANGLE);
        values[4] = trunk_inclination(current);

        if let Some(previous) = self.position_history.back(1) {
            for (slot, &joint) in values[VELOCITY_OFFSET..].iter_mut().zip(VELOCITY_JOINTS.iter()) {
                if let (Some(before), Some(now)) = (previous.get(joint), current.get(joint)) {
                    *slot = (now - before).norm();
                }
            }
        }

        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(Error::InvalidInput(format!(
                "Non-finite value for {}",
                FEATURE_NAMES[i]
            )));
        }

        debug!(
            "Angles: knees R={:.1} L={:.1}, hips R={:.1} L={:.1}, trunk={:.1}",
            values[0], values[1], values[2], values[3], values[4]
        );

        Ok(FeatureVector(values))
    }

    /// Trend of the last five body-scale samples
    #[must_use]
    pub fn scale_trend(&self) -> ScaleTrend {
        if self.body_scale_history.len() < SCALE_TREND_SAMPLES {
            return ScaleTrend::Static;
        }

        let recent: Vec<f64> = self
            .body_scale_history
            .last_n(SCALE_TREND_SAMPLES)
            .copied()
            .collect();
        let slope = linear_slope(&recent);

        if slope > SCALE_TREND_SLOPE {
            ScaleTrend::Approaching
        } else if slope < -SCALE_TREND_SLOPE {
            ScaleTrend::MovingAway
        } else {
            ScaleTrend::Static
        }
    }

    /// Recorded body-scale samples, oldest first
    pub fn body_scales(&self) -> impl Iterator<Item = f64> + '_ {
        self.body_scale_history.iter().copied()
    }

    /// Number of buffered normalized frames
    #[must_use]
    pub fn position_history_len(&self) -> usize {
        self.position_history.len()
    }

    /// Forget all buffered frames
    pub fn reset(&mut self) {
        self.position_history.clear();
        self.body_scale_history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn standing() -> JointFrame {
        JointFrame::new()
            .with(Joint::Nose, 0.5, 0.1)
            .with(Joint::LeftShoulder, 0.45, 0.3)
            .with(Joint::RightShoulder, 0.55, 0.3)
            .with(Joint::LeftHip, 0.45, 0.5)
            .with(Joint::RightHip, 0.55, 0.5)
            .with(Joint::LeftKnee, 0.45, 0.7)
            .with(Joint::RightKnee, 0.55, 0.7)
            .with(Joint::LeftAnkle, 0.45, 0.9)
            .with(Joint::RightAnkle, 0.55, 0.9)
    }

    #[test]
    fn test_angle_right_and_straight() {
        let a = angle(Point2::new(1.0, 0.0), Point2::new(0.0, 0.0), Point2::new(0.0, 1.0));
        assert!((a - 90.0).abs() < 1e-9);

        let b = angle(Point2::new(-1.0, 0.0), Point2::new(0.0, 0.0), Point2::new(1.0, 0.0));
        assert!((b - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_angle_degenerate() {
        let p = Point2::new(0.3, 0.3);
        assert_eq!(angle(p, p, p), 180.0);
        assert_eq!(angle(p, p, Point2::new(1.0, 1.0)), 180.0);
        assert_eq!(angle(Point2::new(1.0, 1.0), p, p), 180.0);
    }

    #[test]
    fn test_body_scale_fallbacks() {
        let full = standing();
        // shoulder width 0.1, torso height 0.2
        assert!((body_scale(&full) - 0.15).abs() < 1e-12);

        let mut no_hips = standing();
        no_hips.remove(Joint::LeftHip);
        assert!((body_scale(&no_hips) - 0.1).abs() < 1e-12);

        let mut no_shoulders = standing();
        no_shoulders.remove(Joint::RightShoulder);
        assert_eq!(body_scale(&no_shoulders), DEFAULT_BODY_SCALE);
    }

    #[test]
    fn test_normalize_moves_hip_center_to_origin() {
        let normalized = normalize(&standing());
        let center = normalized.hip_center().unwrap();
        assert!(center.x.abs() < 1e-12);
        assert!(center.y.abs() < 1e-12);

        let nose = normalized.get(Joint::Nose).unwrap();
        assert!((nose.x - 0.0).abs() < 1e-12);
        assert!((nose.y + 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_without_hips_is_identity() {
        let mut frame = standing();
        frame.remove(Joint::RightHip);
        assert_eq!(normalize(&frame), frame);
    }

    #[test]
    fn test_trunk_inclination_sign() {
        let upright = normalize(&standing());
        assert!(trunk_inclination(&upright).abs() < 1e-9);

        let leaning = JointFrame::new()
            .with(Joint::LeftShoulder, 0.2, -0.2)
            .with(Joint::RightShoulder, 0.2, -0.2)
            .with(Joint::LeftHip, 0.0, 0.0)
            .with(Joint::RightHip, 0.0, 0.0);
        assert!((trunk_inclination(&leaning) - 45.0).abs() < 1e-9);

        let horizontal = JointFrame::new()
            .with(Joint::LeftShoulder, -0.3, 0.0)
            .with(Joint::RightShoulder, -0.3, 0.0)
            .with(Joint::LeftHip, 0.0, 0.0)
            .with(Joint::RightHip, 0.0, 0.0);
        assert!((trunk_inclination(&horizontal) + 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_upright_trunk_is_zero_not_ninety() {
        let mut extractor = KinematicFeatureExtractor::new();
        let features = extractor.extract_features(&standing());
        assert!(features.trunk_inclination().abs() < 1e-9);
        assert!(!crate::heuristics::is_bending(&features));

        // Mirror leans have opposite signs and bend alike
        let lean = |dx: f64| {
            JointFrame::new()
                .with(Joint::LeftShoulder, dx, -0.3)
                .with(Joint::RightShoulder, dx, -0.3)
                .with(Joint::LeftHip, 0.0, 0.0)
                .with(Joint::RightHip, 0.0, 0.0)
        };
        let (right, left) = (trunk_inclination(&lean(0.1)), trunk_inclination(&lean(-0.1)));
        assert!(right > 0.0 && left < 0.0);
        assert!((right + left).abs() < 1e-9);
        assert!(right.abs() > crate::constants::BEND_TRUNK_INCLINATION);
    }

    #[test]
    fn test_standing_features() {
        let mut extractor = KinematicFeatureExtractor::new();
        let features = extractor.extract_features(&standing());

        assert!((features.right_knee_angle() - 180.0).abs() < 1e-9);
        assert!((features.left_knee_angle() - 180.0).abs() < 1e-9);
        assert!((features.right_hip_angle() - 180.0).abs() < 1e-9);
        assert!((features.left_hip_angle() - 180.0).abs() < 1e-9);
        assert!(features.trunk_inclination().abs() < 1e-9);
        assert!(features.velocities().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_missing_joints_use_defaults() {
        let mut extractor = KinematicFeatureExtractor::new();
        let frame = JointFrame::new().with(Joint::Nose, 0.5, 0.1);
        let features = extractor.extract_features(&frame);

        assert_eq!(features.right_knee_angle(), DEFAULT_KNEE_ANGLE);
        assert_eq!(features.left_knee_angle(), DEFAULT_KNEE_ANGLE);
        assert_eq!(features.right_hip_angle(), DEFAULT_HIP_ANGLE);
        assert_eq!(features.left_hip_angle(), DEFAULT_HIP_ANGLE);
        assert_eq!(features.trunk_inclination(), DEFAULT_TRUNK_INCLINATION);
    }

    #[test]
    fn test_velocity_uses_previous_frame() {
        let mut extractor = KinematicFeatureExtractor::new();
        extractor.extract_features(&standing());

        let mut moved = standing();
        moved.set(Joint::Nose, 0.53, 0.14);
        let features = extractor.extract_features(&moved);

        // vel_nose is index 5
        assert!((features[5] - 0.05).abs() < 1e-9);
        assert!(features[6].abs() < 1e-12);
    }

    #[test]
    fn test_empty_frame_leaves_history_untouched() {
        let mut extractor = KinematicFeatureExtractor::new();
        let features = extractor.extract_features(&JointFrame::new());

        assert_eq!(features, FeatureVector::zeros());
        assert_eq!(extractor.position_history_len(), 0);
        assert_eq!(extractor.body_scales().count(), 0);
    }

    #[test]
    fn test_linear_slope() {
        assert!((linear_slope(&[1.0, 2.0, 3.0, 4.0, 5.0]) - 1.0).abs() < 1e-12);
        assert!(linear_slope(&[0.3; 5]).abs() < 1e-12);
    }

    #[test]
    fn test_feature_vector_try_from_rejects_wrong_length() {
        let short = [0.0; 15];
        let err = FeatureVector::try_from(&short[..]).unwrap_err();
        assert!(matches!(err, Error::MalformedFeatureVector { expected: 16, actual: 15 }));
    }

    proptest! {
        #[test]
        fn prop_angle_in_range(
            ax in -1.0f64..1.0, ay in -1.0f64..1.0,
            bx in -1.0f64..1.0, by in -1.0f64..1.0,
            cx in -1.0f64..1.0, cy in -1.0f64..1.0,
        ) {
            let a = angle(Point2::new(ax, ay), Point2::new(bx, by), Point2::new(cx, cy));
            prop_assert!((0.0..=180.0).contains(&a));
        }

        #[test]
        fn prop_features_always_finite(
            coords in proptest::collection::vec((0.0f64..1.0, 0.0f64..1.0), 13),
            mask in proptest::collection::vec(any::<bool>(), 13),
        ) {
            let mut extractor = KinematicFeatureExtractor::new();
            let frame: JointFrame = Joint::ALL
                .iter()
                .zip(coords.iter().zip(mask.iter()))
                .filter(|(_, (_, keep))| **keep)
                .map(|(&joint, (&xy, _))| (joint, xy))
                .collect();

            for _ in 0..3 {
                let features = extractor.extract_features(&frame);
                prop_assert_eq!(features.as_slice().len(), NUM_RAW_FEATURES);
                prop_assert!(features.as_slice().iter().all(|v| v.is_finite()));
            }
        }
    }
}
