//! Geometric rules evaluated on the raw kinematic features.
//!
//! These rules do not depend on the classifier and take precedence over it
//! when the body geometry is unambiguous.

use crate::{
    activity::ActivityCategory,
    constants::{
        BEND_HIP_ANGLE, BEND_HIP_ASYMMETRY, BEND_PROMOTE_BELOW, BEND_TRUNK_INCLINATION,
        FORWARD_BEND_CONFIDENCE, FORWARD_BEND_HIP, FORWARD_BEND_KNEE_ASYMMETRY, FORWARD_BEND_TRUNK,
        LATERAL_BEND_ASYMMETRY, LATERAL_BEND_CONFIDENCE, LATERAL_DIRECTION_MARGIN,
        LEG_VELOCITY_INDICES, SLIGHT_BEND_CONFIDENCE, SLIGHT_BEND_HIP, SLIGHT_BEND_PROMOTE_BELOW,
        SLIGHT_BEND_TRUNK, SQUAT_CLEAR_ASYMMETRY, SQUAT_CLEAR_HIP, SQUAT_CLEAR_KNEE,
        SQUAT_PARTIAL_ASYMMETRY, SQUAT_PARTIAL_HIP, SQUAT_PARTIAL_KNEE, SQUAT_STANDING_KNEE,
        STATIC_MAX_VELOCITY, STATIC_MEAN_VELOCITY, WALKING_LEG_VELOCITY, WALKING_MAX_VELOCITY,
        WALKING_MEAN_VELOCITY,
    },
    kinematics::FeatureVector,
};
use std::fmt;

/// Mean and maximum of the absolute velocities
fn velocity_stats(features: &FeatureVector) -> (f64, f64) {
    let velocities = features.velocities();
    if velocities.is_empty() {
        return (0.0, 0.0);
    }
    let mean = velocities.iter().map(|v| v.abs()).sum::<f64>() / velocities.len() as f64;
    let max = velocities.iter().map(|v| v.abs()).fold(0.0, f64::max);
    (mean, max)
}

/// Velocity pattern of a walking person: overall movement carried by the legs
#[must_use]
pub fn is_walking(features: &FeatureVector) -> bool {
    let (mean, max) = velocity_stats(features);
    let leg = LEG_VELOCITY_INDICES
        .iter()
        .map(|&i| features[i].abs())
        .sum::<f64>()
        / LEG_VELOCITY_INDICES.len() as f64;

    mean > WALKING_MEAN_VELOCITY && leg > WALKING_LEG_VELOCITY && max < WALKING_MAX_VELOCITY
}

/// Every joint is (nearly) still and the pattern is not walking
#[must_use]
pub fn is_static(features: &FeatureVector) -> bool {
    let (mean, max) = velocity_stats(features);
    mean < STATIC_MEAN_VELOCITY && max < STATIC_MAX_VELOCITY && !is_walking(features)
}

/// How deep a detected squat is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SquatDepth {
    Partial,
    Clear,
}

/// Squat tier, if the knees and hips are flexed symmetrically
#[must_use]
pub fn squat_depth(features: &FeatureVector) -> Option<SquatDepth> {
    let knee = features.mean_knee_angle();
    let hip = features.mean_hip_angle();
    let asymmetry = features.knee_asymmetry();

    if knee < SQUAT_CLEAR_KNEE && hip < SQUAT_CLEAR_HIP && asymmetry < SQUAT_CLEAR_ASYMMETRY {
        return Some(SquatDepth::Clear);
    }

    let partial = knee < SQUAT_PARTIAL_KNEE
        && hip < SQUAT_PARTIAL_HIP
        && asymmetry < SQUAT_PARTIAL_ASYMMETRY
        && knee < SQUAT_STANDING_KNEE;
    partial.then_some(SquatDepth::Partial)
}

#[must_use]
pub fn is_squatting(features: &FeatureVector) -> bool {
    squat_depth(features).is_some()
}

/// Coarse gate for any kind of bend
#[must_use]
pub fn is_bending(features: &FeatureVector) -> bool {
    let trunk_bent = features.trunk_inclination().abs() > BEND_TRUNK_INCLINATION;
    let hips_bent = features.mean_hip_angle() < BEND_HIP_ANGLE;
    let asymmetric = features.hip_asymmetry() > BEND_HIP_ASYMMETRY;

    trunk_bent || (hips_bent && !is_squatting(features)) || asymmetric
}

/// Side a lateral bend leans towards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Category whose labels name this side
    #[must_use]
    pub const fn category(self) -> ActivityCategory {
        match self {
            Side::Left => ActivityCategory::LeanLeft,
            Side::Right => ActivityCategory::LeanRight,
        }
    }
}

/// Kind of bend recognised from the body geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BendType {
    Forward,
    Lateral(Side),
    Slight,
}

impl BendType {
    /// Confidence assigned when the override promotes a label
    #[must_use]
    pub const fn confidence(self) -> f64 {
        match self {
            BendType::Forward => FORWARD_BEND_CONFIDENCE,
            BendType::Lateral(_) => LATERAL_BEND_CONFIDENCE,
            BendType::Slight => SLIGHT_BEND_CONFIDENCE,
        }
    }

    /// Labels with a probability below this are replaced
    #[must_use]
    pub const fn promote_below(self) -> f64 {
        match self {
            BendType::Forward | BendType::Lateral(_) => BEND_PROMOTE_BELOW,
            BendType::Slight => SLIGHT_BEND_PROMOTE_BELOW,
        }
    }

    /// Label categories accepted for this bend, any of which may match
    #[must_use]
    pub fn categories(self) -> Vec<ActivityCategory> {
        match self {
            BendType::Forward => vec![ActivityCategory::ForwardBend, ActivityCategory::Lean],
            BendType::Lateral(side) => vec![side.category(), ActivityCategory::Lean],
            BendType::Slight => vec![ActivityCategory::Lean],
        }
    }
}

impl fmt::Display for BendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BendType::Forward => f.write_str("forward"),
            BendType::Lateral(Side::Left) => f.write_str("lateral_left"),
            BendType::Lateral(Side::Right) => f.write_str("lateral_right"),
            BendType::Slight => f.write_str("slight"),
        }
    }
}

/// Classify the bend. A lateral bend needs a clear direction to count.
#[must_use]
pub fn bend_type(features: &FeatureVector) -> Option<BendType> {
    let hip = features.mean_hip_angle();
    let trunk = features.trunk_inclination().abs();
    let (right_hip, left_hip) = (features.right_hip_angle(), features.left_hip_angle());

    let forward = hip < FORWARD_BEND_HIP
        && trunk > FORWARD_BEND_TRUNK
        && features.knee_asymmetry() < FORWARD_BEND_KNEE_ASYMMETRY;
    if forward {
        return Some(BendType::Forward);
    }

    let lateral = features.hip_asymmetry() > LATERAL_BEND_ASYMMETRY
        || features.knee_asymmetry() > LATERAL_BEND_ASYMMETRY;
    if lateral {
        if right_hip < left_hip - LATERAL_DIRECTION_MARGIN {
            return Some(BendType::Lateral(Side::Right));
        }
        if left_hip < right_hip - LATERAL_DIRECTION_MARGIN {
            return Some(BendType::Lateral(Side::Left));
        }
        // Asymmetric without a direction: not a slight bend either
        return None;
    }

    (trunk > SLIGHT_BEND_TRUNK && hip < SLIGHT_BEND_HIP).then_some(BendType::Slight)
}
