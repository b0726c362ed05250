//! End-to-end tests of the decision cascade with a mock classifier

mod test_helpers;

use activity_recognition::{
    decision_engine::{ActivityLabel, EngineStatus, Prediction},
    Result,
};
use test_helpers::{features, flexed_pose, mock_engine, standing_pose};

const STAND_SQUAT_WALK: [(&str, f64); 3] = [("stand", 0.7), ("squat", 0.2), ("walk", 0.1)];

fn assert_prediction(prediction: &Prediction, label: &str, confidence: f64) {
    assert_eq!(prediction.label.to_string(), label, "unexpected label in {prediction}");
    assert!(
        (prediction.confidence - confidence).abs() < 1e-9,
        "expected confidence {confidence}, got {prediction}"
    );
}

#[test]
fn test_motionless_subject() -> Result<()> {
    let mut engine = mock_engine(&STAND_SQUAT_WALK)?;
    let pose = standing_pose();

    for i in 0..29 {
        let prediction = engine.predict(Some(&pose), None);
        assert_eq!(
            prediction.label,
            ActivityLabel::Initializing { remaining: 29 - i },
            "frame {i}"
        );
        assert_eq!(prediction.confidence, 0.0);
    }
    assert_eq!(engine.status(), EngineStatus::Initializing { remaining: 1 });

    let prediction = engine.predict(Some(&pose), None);
    assert_prediction(&prediction, "motionless", 0.95);
    assert_eq!(engine.status(), EngineStatus::Ready);

    Ok(())
}

#[test]
fn test_initializing_message() -> Result<()> {
    let mut engine = mock_engine(&STAND_SQUAT_WALK)?;
    let prediction = engine.predict_features(&features(175.0, 170.0, 0.05));
    assert_eq!(prediction.label.to_string(), "initializing (29 frames remaining)...");
    Ok(())
}

#[test]
fn test_squat_synthesized_when_vocabulary_lacks_it() -> Result<()> {
    let mut engine = mock_engine(&[("stand", 0.6), ("walk", 0.3), ("sit", 0.1)])?;
    let squat = features(100.0, 100.0, 0.05);

    let mut last = None;
    for _ in 0..30 {
        last = Some(engine.predict_features(&squat));
    }

    let prediction = last.expect("thirty frames were fed");
    assert_prediction(&prediction, "squat", 0.75);
    assert!(!prediction.label.is_sentinel());
    Ok(())
}

#[test]
fn test_squat_ramp_from_joints() -> Result<()> {
    let mut engine = mock_engine(&STAND_SQUAT_WALK)?;

    let predictions: Vec<Prediction> = (0..60)
        .map(|i| {
            let flexion = if i <= 30 {
                175.0 - 80.0 * f64::from(i) / 30.0
            } else {
                95.0 + 80.0 * f64::from(i - 30) / 30.0
            };
            let wave = if i % 2 == 0 { 0.05 } else { -0.05 };
            engine.predict(Some(&flexed_pose(flexion, wave)), None)
        })
        .collect();

    for prediction in &predictions[..29] {
        assert!(matches!(prediction.label, ActivityLabel::Initializing { .. }));
    }
    for (i, prediction) in predictions.iter().enumerate().take(41).skip(29) {
        assert_eq!(prediction.label.to_string(), "squat", "frame {i}");
        assert!((prediction.confidence - 0.78).abs() < 1e-9, "frame {i}");
    }
    assert_prediction(&predictions[59], "stand", 0.7);

    Ok(())
}

#[test]
fn test_engines_are_deterministic() -> Result<()> {
    let pairs = [("stand", 0.5), ("walk", 0.3), ("squat", 0.2)];
    let mut first = mock_engine(&pairs)?;
    let mut second = mock_engine(&pairs)?;

    for i in 0..50 {
        let wave = if i % 3 == 0 { 0.04 } else { -0.02 };
        let pose = flexed_pose(120.0 + f64::from(i % 7) * 8.0, wave);
        assert_eq!(first.predict(Some(&pose), None), second.predict(Some(&pose), None), "frame {i}");
    }

    Ok(())
}

#[test]
fn test_malformed_features_are_rejected() -> Result<()> {
    let mut engine = mock_engine(&STAND_SQUAT_WALK)?;

    assert_prediction(&engine.predict_features(&[1.0; 5]), "processing...", 0.0);
    assert_prediction(&engine.predict_features(&[]), "processing...", 0.0);
    assert_eq!(engine.predict_features(&[0.0; 17]).label, ActivityLabel::Processing);

    // Rejected frames never enter the window
    assert_eq!(engine.status(), EngineStatus::Initializing { remaining: 30 });
    Ok(())
}

#[test]
fn test_no_subject_is_idle() -> Result<()> {
    let mut engine = mock_engine(&STAND_SQUAT_WALK)?;

    assert_prediction(&engine.predict(None, None), "system initializing...", 0.0);
    let empty = activity_recognition::joints::JointFrame::new();
    assert_prediction(&engine.predict(Some(&empty), None), "system initializing...", 0.0);
    Ok(())
}

#[test]
fn test_engine_without_classifier_is_not_ready() {
    let config = activity_recognition::config::Config::default();
    let mut engine = activity_recognition::decision_engine::DecisionEngine::new(&config, None);

    assert_eq!(engine.status(), EngineStatus::NotReady);
    assert_prediction(&engine.predict(Some(&standing_pose()), None), "system initializing...", 0.0);
    assert_prediction(&engine.predict_features(&features(175.0, 170.0, 0.05)), "system initializing...", 0.0);
}

#[test]
fn test_close_call_is_uncertain() -> Result<()> {
    let mut engine = mock_engine(&[("stand", 0.45), ("walk", 0.44), ("sit", 0.11)])?;
    let upright = features(175.0, 170.0, 0.05);

    let mut last = None;
    for _ in 0..30 {
        last = Some(engine.predict_features(&upright));
    }

    let prediction = last.expect("thirty frames were fed");
    assert_prediction(&prediction, "analyzing sequence...", 0.45);
    Ok(())
}

#[test]
fn test_problematic_label_falls_back_to_runner_up() -> Result<()> {
    let mut engine = mock_engine(&[("Caminar alejandose (espaldas)", 0.38), ("stand", 0.30), ("sit", 0.32)])?;
    let upright = features(175.0, 170.0, 0.05);

    let mut last = None;
    for _ in 0..32 {
        last = Some(engine.predict_features(&upright));
    }

    assert_prediction(&last.expect("frames were fed"), "sit", 0.32);
    Ok(())
}

#[test]
fn test_low_confidence_is_detecting_pattern() -> Result<()> {
    let mut engine = mock_engine(&[("stand", 0.15), ("walk", 0.05), ("sit", 0.05)])?;
    let upright = features(175.0, 170.0, 0.05);

    let mut last = None;
    for _ in 0..30 {
        last = Some(engine.predict_features(&upright));
    }

    let prediction = last.expect("thirty frames were fed");
    assert_eq!(prediction.label, ActivityLabel::DetectingPattern);
    assert_eq!(prediction.label.to_string(), "detecting pattern...");
    Ok(())
}

#[test]
fn test_reset_restarts_initialization() -> Result<()> {
    let mut engine = mock_engine(&STAND_SQUAT_WALK)?;
    let upright = features(175.0, 170.0, 0.05);

    for _ in 0..30 {
        engine.predict_features(&upright);
    }
    assert_eq!(engine.status(), EngineStatus::Ready);

    engine.reset();
    assert_eq!(engine.status(), EngineStatus::Initializing { remaining: 30 });
    assert_eq!(
        engine.predict_features(&upright).label,
        ActivityLabel::Initializing { remaining: 29 }
    );
    Ok(())
}
