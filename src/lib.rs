//! Pose-based human activity recognition.
//!
//! This library turns per-frame body joints, supplied by an external pose
//! estimator, into a stable activity label with a confidence:
//! - Kinematic features (joint angles, trunk inclination, velocities)
//! - A sliding window of engineered features fed to an external classifier
//!   served through ONNX Runtime
//! - A cascade of rule-based corrections on top of the classifier ranking
//! - Classical motion analysis with `OpenCV` to cross-check each label
//!   against the motion visible in the video
//!
//! The decision pipeline for each frame:
//! 1. Extract the 16 kinematic features from the joints
//! 2. Derive 24 engineered features and push them into a 30 frame window
//! 3. Rank the classifier output and apply the correction cascade
//! 4. Smooth over recent predictions and validate against measured motion
//!
//! # Examples
//!
//! ## Basic Usage
//!
//! ```no_run
//! use activity_recognition::{
//!     config::Config,
//!     decision_engine::DecisionEngine,
//!     joints::{Joint, JointFrame},
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_file("config.yaml")?;
//! let mut engine = DecisionEngine::from_config(&config);
//!
//! let joints = JointFrame::new()
//!     .with(Joint::LeftShoulder, 0.45, 0.30)
//!     .with(Joint::RightShoulder, 0.55, 0.30)
//!     .with(Joint::LeftHip, 0.46, 0.55)
//!     .with(Joint::RightHip, 0.54, 0.55);
//!
//! let prediction = engine.predict(Some(&joints), None);
//! println!("{} ({:.2})", prediction.label, prediction.confidence);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Extraction
//!
//! ```no_run
//! use activity_recognition::{
//!     features::EnhancedFeatureVector,
//!     joints::{Joint, JointFrame},
//!     kinematics::KinematicFeatureExtractor,
//! };
//!
//! # fn main() {
//! let mut extractor = KinematicFeatureExtractor::new();
//!
//! let joints = JointFrame::new()
//!     .with(Joint::LeftHip, 0.46, 0.55)
//!     .with(Joint::LeftKnee, 0.46, 0.75)
//!     .with(Joint::LeftAnkle, 0.46, 0.95);
//!
//! let features = extractor.extract_features(&joints);
//! println!("Left knee angle: {:.1}", features.left_knee_angle());
//!
//! let enhanced = EnhancedFeatureVector::from_features(&features);
//! println!("Engineered features: {:?}", enhanced.as_slice());
//! # }
//! ```
//!
//! ## Motion Validation
//!
//! ```no_run
//! use activity_recognition::{
//!     config::MotionConfig,
//!     motion_analyzer::{ConsistencyStats, MotionAnalyzer},
//! };
//! use opencv::{videoio, core::Mat, prelude::*};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut analyzer = MotionAnalyzer::new(MotionConfig::default());
//! let mut stats = ConsistencyStats::new();
//!
//! let mut cap = videoio::VideoCapture::from_file("walk.mp4", videoio::CAP_ANY)?;
//! let mut frame = Mat::default();
//!
//! while cap.read(&mut frame)? {
//!     let analysis = analyzer.analyze(&frame, None)?;
//!     let validation = MotionAnalyzer::validate("Caminar hacia adelante", &analysis);
//!     stats.record(&validation);
//! }
//!
//! println!("{stats}");
//! # Ok(())
//! # }
//! ```

/// Named constants for the decision pipeline
pub mod constants;

/// Error types used throughout the crate
pub mod error;

/// Body joints and per-frame joint positions
pub mod joints;

/// Fixed-capacity history buffers
pub mod history;

/// Kinematic feature extraction from joints
pub mod kinematics;

/// Engineered features derived from the kinematic vector
pub mod features;

/// Activity vocabulary matching
pub mod activity;

/// External classifier adapter and ranking
pub mod classifier;

/// Rule-based posture and movement heuristics
pub mod heuristics;

/// Classical video motion analysis and label validation
pub mod motion_analyzer;

/// Per-frame decision cascade
pub mod decision_engine;

/// Configuration management
pub mod config;

/// Joint sequence replay application
pub mod app;

/// Utility functions for image and coordinate conversion
pub mod utils;

pub use error::{Error, Result};
