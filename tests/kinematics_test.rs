//! Feature extraction over joint sequences

mod test_helpers;

use activity_recognition::{
    features::EnhancedFeatureVector,
    heuristics::{self, SquatDepth},
    joints::{Joint, JointFrame},
    kinematics::{KinematicFeatureExtractor, ScaleTrend},
};
use proptest::prelude::*;
use test_helpers::{flexed_pose, standing_pose};

/// Scale a pose about the hip center
fn scaled(frame: &JointFrame, scale: f64) -> JointFrame {
    frame
        .iter()
        .map(|(joint, p)| (joint, (0.5 + (p.x - 0.5) * scale, 0.55 + (p.y - 0.55) * scale)))
        .collect()
}

#[test]
fn test_flexed_pose_angles() {
    let mut extractor = KinematicFeatureExtractor::new();

    for flexion in [170.0, 140.0, 110.0, 95.0] {
        let features = extractor.extract_features(&flexed_pose(flexion, 0.0));
        assert!((features.left_knee_angle() - flexion).abs() < 1e-6);
        assert!((features.right_knee_angle() - flexion).abs() < 1e-6);
        assert!((features.left_hip_angle() - flexion).abs() < 1e-6);
        assert!((features.right_hip_angle() - flexion).abs() < 1e-6);
        assert!(features.trunk_inclination().abs() < 1e-6);
    }
}

#[test]
fn test_squat_tiers_follow_flexion() {
    let mut extractor = KinematicFeatureExtractor::new();

    let standing = extractor.extract_features(&standing_pose());
    assert_eq!(heuristics::squat_depth(&standing), None);

    let partial = extractor.extract_features(&flexed_pose(140.0, 0.0));
    assert_eq!(heuristics::squat_depth(&partial), Some(SquatDepth::Partial));

    let clear = extractor.extract_features(&flexed_pose(100.0, 0.0));
    assert_eq!(heuristics::squat_depth(&clear), Some(SquatDepth::Clear));
}

#[test]
fn test_still_pose_is_static() {
    let mut extractor = KinematicFeatureExtractor::new();
    let pose = standing_pose();

    extractor.extract_features(&pose);
    let features = extractor.extract_features(&pose);

    assert!(features.velocities().iter().all(|&v| v == 0.0));
    assert!(heuristics::is_static(&features));
}

#[test]
fn test_translation_does_not_create_velocity() {
    let mut extractor = KinematicFeatureExtractor::new();
    let pose = standing_pose();
    let shifted: JointFrame = pose.iter().map(|(joint, p)| (joint, (p.x + 0.2, p.y - 0.1))).collect();

    extractor.extract_features(&pose);
    let features = extractor.extract_features(&shifted);

    assert!(features.velocities().iter().all(|&v| v.abs() < 1e-9));
}

#[test]
fn test_scale_trend_follows_body_size() {
    let mut approaching = KinematicFeatureExtractor::new();
    let mut retreating = KinematicFeatureExtractor::new();
    let mut steady = KinematicFeatureExtractor::new();
    let pose = standing_pose();

    for i in 0..6 {
        let step = f64::from(i) * 0.02;
        approaching.extract_features(&scaled(&pose, 1.0 + step));
        retreating.extract_features(&scaled(&pose, 1.0 - step));
        steady.extract_features(&pose);
    }

    assert_eq!(approaching.scale_trend(), ScaleTrend::Approaching);
    assert_eq!(retreating.scale_trend(), ScaleTrend::MovingAway);
    assert_eq!(steady.scale_trend(), ScaleTrend::Static);
}

#[test]
fn test_enhanced_features_of_pose() {
    let mut extractor = KinematicFeatureExtractor::new();
    let features = extractor.extract_features(&flexed_pose(120.0, 0.0));
    let enhanced = EnhancedFeatureVector::from_features(&features);

    assert_eq!(enhanced.as_slice().len(), 24);
    assert!((enhanced.get("knee_angle_mean").unwrap() - 120.0).abs() < 1e-6);
    assert!(enhanced.get("hip_angle_diff").unwrap().abs() < 1e-6);
    assert_eq!(enhanced.get("total_velocity"), Some(0.0));
}

#[test]
fn test_joint_sequence_yaml() {
    let yaml = "- left_hip: [0.45, 0.55]\n  right_hip: [0.55, 0.55]\n- null\n- {}\n";
    let sequence: Vec<Option<JointFrame>> = serde_yaml::from_str(yaml).unwrap();

    assert_eq!(sequence.len(), 3);
    let first = sequence[0].as_ref().unwrap();
    assert_eq!(first.len(), 2);
    assert!(first.contains(Joint::LeftHip));
    assert!(sequence[1].is_none());
    assert!(sequence[2].as_ref().unwrap().is_empty());
}

fn arbitrary_frame() -> impl Strategy<Value = JointFrame> {
    prop::collection::vec(prop::option::of((0.0f64..1.0, 0.0f64..1.0)), 13).prop_map(|positions| {
        Joint::ALL
            .iter()
            .zip(positions)
            .filter_map(|(&joint, p)| p.map(|p| (joint, p)))
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_features_are_finite(frames in prop::collection::vec(arbitrary_frame(), 1..8)) {
        let mut extractor = KinematicFeatureExtractor::new();
        for frame in &frames {
            let features = extractor.extract_features(frame);
            prop_assert!(features.as_slice().iter().all(|v| v.is_finite()));
            prop_assert!(features.as_slice()[..4].iter().all(|&a| (0.0..=180.0).contains(&a)));
            prop_assert!(features.velocities().iter().all(|&v| v >= 0.0));
        }
    }

    #[test]
    fn prop_enhanced_features_are_finite(frames in prop::collection::vec(arbitrary_frame(), 1..8)) {
        let mut extractor = KinematicFeatureExtractor::new();
        for frame in &frames {
            let enhanced = EnhancedFeatureVector::from_features(&extractor.extract_features(frame));
            prop_assert!(enhanced.as_slice().iter().all(|v| v.is_finite()));
        }
    }
}
