//! Helper functions and utilities for tests

#![allow(dead_code)]

use activity_recognition::{
    classifier::{ActivityClassifier, Classification, ClassifierPipeline, ModelArtifacts},
    config::Config,
    decision_engine::DecisionEngine,
    joints::{Joint, JointFrame},
    Result,
};
use opencv::{
    core::{Mat, Rect, Scalar, CV_8UC3},
    imgproc,
    prelude::*,
};

/// Classifier returning the same probabilities for every input
pub struct MockClassifier {
    probabilities: Vec<f64>,
}

impl MockClassifier {
    pub fn new(probabilities: Vec<f64>) -> Self {
        Self { probabilities }
    }
}

impl ActivityClassifier for MockClassifier {
    fn classify(&self, _features: &[f64]) -> Result<Classification> {
        let index = self
            .probabilities
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, &p)| if p > best.1 { (i, p) } else { best })
            .0;
        Ok(Classification {
            index,
            probabilities: self.probabilities.clone(),
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Classifier pipeline over `(label, probability)` pairs
pub fn mock_pipeline(pairs: &[(&str, f64)]) -> Result<ClassifierPipeline> {
    let artifacts = ModelArtifacts {
        labels: pairs.iter().map(|(label, _)| (*label).to_string()).collect(),
        ..ModelArtifacts::default()
    };
    let probabilities = pairs.iter().map(|(_, p)| *p).collect();
    ClassifierPipeline::new(Box::new(MockClassifier::new(probabilities)), artifacts)
}

/// Engine with motion validation disabled around a mock classifier
pub fn mock_engine(pairs: &[(&str, f64)]) -> Result<DecisionEngine> {
    let mut config = Config::default();
    config.engine.enable_motion_validation = false;
    Ok(DecisionEngine::new(&config, Some(mock_pipeline(pairs)?)))
}

/// Engine with motion validation enabled around a mock classifier
pub fn mock_engine_with_motion(pairs: &[(&str, f64)]) -> Result<DecisionEngine> {
    let config = Config::default();
    Ok(DecisionEngine::new(&config, Some(mock_pipeline(pairs)?)))
}

/// Raw feature vector with the given knee and hip angles, upright trunk and
/// uniform velocities
pub fn features(knee: f64, hip: f64, velocity: f64) -> Vec<f64> {
    let mut values = vec![velocity; 16];
    values[0] = knee;
    values[1] = knee;
    values[2] = hip;
    values[3] = hip;
    values[4] = 0.0;
    values
}

/// Frontal pose with symmetric legs flexed so that both the knee and the hip
/// angle equal `flexion` degrees. `wrist_offset` shifts both wrists
/// sideways.
pub fn flexed_pose(flexion: f64, wrist_offset: f64) -> JointFrame {
    let thigh = 0.2;
    let shank = 0.2;
    let bend = (180.0 - flexion).to_radians();

    let mut frame = JointFrame::new()
        .with(Joint::Nose, 0.5, 0.2)
        .with(Joint::LeftShoulder, 0.45, 0.3)
        .with(Joint::RightShoulder, 0.55, 0.3)
        .with(Joint::LeftElbow, 0.42, 0.42)
        .with(Joint::RightElbow, 0.58, 0.42)
        .with(Joint::LeftWrist, 0.40 + wrist_offset, 0.52)
        .with(Joint::RightWrist, 0.60 + wrist_offset, 0.52);

    for (hip, knee, ankle, x) in [
        (Joint::LeftHip, Joint::LeftKnee, Joint::LeftAnkle, 0.45),
        (Joint::RightHip, Joint::RightKnee, Joint::RightAnkle, 0.55),
    ] {
        let hip_y = 0.55;
        let knee_x = x + thigh * bend.sin();
        let knee_y = hip_y + thigh * bend.cos();
        frame.set(hip, x, hip_y);
        frame.set(knee, knee_x, knee_y);
        frame.set(ankle, knee_x, knee_y + shank);
    }

    frame
}

/// Upright standing pose
pub fn standing_pose() -> JointFrame {
    flexed_pose(180.0, 0.0)
}

/// Black BGR frame
pub fn black_frame(height: i32, width: i32) -> Result<Mat> {
    Mat::zeros(height, width, CV_8UC3)?.to_mat().map_err(Into::into)
}

/// Black BGR frame with a filled white rectangle
pub fn frame_with_rect(height: i32, width: i32, rect: Rect) -> Result<Mat> {
    let mut frame = black_frame(height, width)?;
    imgproc::rectangle(
        &mut frame,
        rect,
        Scalar::new(255.0, 255.0, 255.0, 0.0),
        -1,
        imgproc::LINE_8,
        0,
    )?;
    Ok(frame)
}
