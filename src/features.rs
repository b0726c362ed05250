//! Feature engineering into the classifier's training schema.
//!
//! The classifier was trained on a different field order than the one the
//! extractor produces, plus eight aggregates. The formulas here must stay
//! numerically identical to the training pipeline.

use crate::{
    constants::{NUM_ENHANCED_FEATURES, VELOCITY_RATIO_EPSILON},
    kinematics::FeatureVector,
};

/// Field names of the engineered vector, in order
pub const ENHANCED_FEATURE_NAMES: [&str; NUM_ENHANCED_FEATURES] = [
    "left_hip_angle",
    "right_hip_angle",
    "left_knee_angle",
    "right_knee_angle",
    "trunk_inclination",
    "vel_left_shoulder",
    "vel_right_shoulder",
    "vel_left_elbow",
    "vel_right_elbow",
    "vel_left_hip",
    "vel_right_hip",
    "vel_left_knee",
    "vel_right_knee",
    "vel_left_ankle",
    "vel_right_ankle",
    "vel_nose",
    "hip_angle_diff",
    "hip_angle_mean",
    "knee_angle_diff",
    "knee_angle_mean",
    "total_velocity",
    "velocity_variance",
    "max_velocity",
    "left_right_vel_ratio",
];

/// Raw-vector index feeding each of the first 16 engineered fields.
///
/// The elbow velocities are not measured; the wrist velocities stand in.
const REMAP: [usize; 16] = [3, 2, 1, 0, 4, 6, 7, 14, 15, 8, 9, 10, 11, 12, 13, 5];

/// Positions of the velocity fields in the remapped schema
const VELOCITY_FIELDS: std::ops::Range<usize> = 5..16;

/// Left-side velocity fields in the remapped schema
const LEFT_VELOCITY_FIELDS: [usize; 5] = [5, 7, 9, 11, 13];

/// Right-side velocity fields in the remapped schema
const RIGHT_VELOCITY_FIELDS: [usize; 5] = [6, 8, 10, 12, 14];

/// The 24-value vector consumed by the classifier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnhancedFeatureVector([f64; NUM_ENHANCED_FEATURES]);

impl EnhancedFeatureVector {
    /// Remap the raw features and append the derived aggregates
    #[must_use]
    pub fn from_features(features: &FeatureVector) -> Self {
        let mut values = [0.0; NUM_ENHANCED_FEATURES];
        for (slot, &source) in values.iter_mut().zip(REMAP.iter()) {
            *slot = features[source];
        }

        let (left_hip, right_hip, left_knee, right_knee) = (values[0], values[1], values[2], values[3]);
        let velocities = &values[VELOCITY_FIELDS];

        let total_velocity: f64 = velocities.iter().map(|v| v.abs()).sum();
        let max_velocity = velocities.iter().map(|v| v.abs()).fold(f64::NEG_INFINITY, f64::max);
        let velocity_variance = sample_variance(velocities);

        let left_sum: f64 = LEFT_VELOCITY_FIELDS.iter().map(|&i| values[i].abs()).sum();
        let right_sum: f64 = RIGHT_VELOCITY_FIELDS.iter().map(|&i| values[i].abs()).sum();

        values[16] = left_hip - right_hip;
        values[17] = (left_hip + right_hip) / 2.0;
        values[18] = left_knee - right_knee;
        values[19] = (left_knee + right_knee) / 2.0;
        values[20] = total_velocity;
        values[21] = velocity_variance;
        values[22] = max_velocity;
        values[23] = left_sum / (right_sum + VELOCITY_RATIO_EPSILON);

        Self(values)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Value of a named field
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        ENHANCED_FEATURE_NAMES
            .iter()
            .position(|&n| n == name)
            .map(|i| self.0[i])
    }
}

impl From<&FeatureVector> for EnhancedFeatureVector {
    fn from(features: &FeatureVector) -> Self {
        Self::from_features(features)
    }
}

/// Unbiased (n - 1) variance, matching the training data frame
fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)
}
