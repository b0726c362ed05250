//! Configuration management for the activity recognition pipeline

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model configuration
    pub models: ModelConfig,

    /// Decision engine configuration
    pub engine: EngineConfig,

    /// Motion analysis configuration
    pub motion: MotionConfig,
}

/// Model file paths configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to the activity classifier exported to ONNX
    pub classifier: PathBuf,

    /// Path to the YAML bundle with labels, scaler and feature selector
    pub artifacts: PathBuf,
}

/// Decision engine parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Cross-check every label against the motion measured in the video
    pub enable_motion_validation: bool,

    /// Labels the classifier is known to over-predict
    pub problematic_labels: Vec<String>,
}

/// Classical motion analysis parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Pixel intensity difference counted as motion
    pub diff_threshold: f64,

    /// Smallest motion region kept, in square pixels
    pub min_contour_area: f64,

    /// Gaussian blur kernel size (odd)
    pub blur_kernel_size: i32,

    /// Dilation passes applied to the thresholded difference
    pub dilate_iterations: i32,

    /// Number of preprocessed frames kept
    pub frame_history: usize,

    /// Maximum corners seeded for optical flow
    pub max_corners: i32,

    /// Corner quality level (0.0-1.0)
    pub quality_level: f64,

    /// Minimum distance between seeded corners
    pub min_distance: f64,

    /// Corner detector block size
    pub block_size: i32,

    /// Re-seed corners below this many tracked points
    pub min_tracked_points: usize,

    /// Lucas-Kanade search window size
    pub lk_window_size: i32,

    /// Lucas-Kanade pyramid levels
    pub lk_max_level: i32,

    /// Lucas-Kanade iteration limit
    pub lk_max_iterations: i32,

    /// Lucas-Kanade convergence epsilon
    pub lk_epsilon: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            classifier: PathBuf::from("models/activity_classifier.onnx"),
            artifacts: PathBuf::from("models/activity_artifacts.yaml"),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enable_motion_validation: true,
            problematic_labels: vec!["Caminar alejandose (espaldas)".to_string()],
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            diff_threshold: 25.0,
            min_contour_area: 500.0,
            blur_kernel_size: 21,
            dilate_iterations: 2,
            frame_history: 5,
            max_corners: 100,
            quality_level: 0.3,
            min_distance: 7.0,
            block_size: 7,
            min_tracked_points: 10,
            lk_window_size: 15,
            lk_max_level: 2,
            lk_max_iterations: 10,
            lk_epsilon: 0.03,
        }
    }
}

impl ModelConfig {
    /// Check that both model files exist
    ///
    /// # Errors
    ///
    /// Returns an error naming the first missing file
    pub fn check_files(&self) -> Result<()> {
        if !self.classifier.exists() {
            return Err(Error::ConfigError(format!(
                "Classifier model not found: {}",
                self.classifier.display()
            )));
        }
        if !self.artifacts.exists() {
            return Err(Error::ConfigError(format!(
                "Model artifacts not found: {}",
                self.artifacts.display()
            )));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::IoError(e.to_string()))?;

        serde_yaml::from_str(&content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content).map_err(|e| Error::IoError(e.to_string()))?;

        Ok(())
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid parameter
    pub fn validate(&self) -> Result<()> {
        let motion = &self.motion;

        if !(0.0..=255.0).contains(&motion.diff_threshold) {
            return Err(Error::ConfigError(
                "Difference threshold must be between 0 and 255".to_string(),
            ));
        }
        if motion.min_contour_area < 0.0 {
            return Err(Error::ConfigError(
                "Minimum contour area must not be negative".to_string(),
            ));
        }
        if motion.blur_kernel_size <= 0 || motion.blur_kernel_size % 2 == 0 {
            return Err(Error::ConfigError(
                "Blur kernel size must be odd and greater than 0".to_string(),
            ));
        }
        if motion.dilate_iterations < 0 {
            return Err(Error::ConfigError(
                "Dilate iterations must not be negative".to_string(),
            ));
        }
        if motion.frame_history < 2 {
            return Err(Error::ConfigError(
                "Frame history must hold at least 2 frames".to_string(),
            ));
        }
        if motion.max_corners <= 0 {
            return Err(Error::ConfigError("Max corners must be greater than 0".to_string()));
        }
        if !(motion.quality_level > 0.0 && motion.quality_level <= 1.0) {
            return Err(Error::ConfigError(
                "Corner quality level must be in (0.0, 1.0]".to_string(),
            ));
        }
        if motion.block_size <= 0 {
            return Err(Error::ConfigError("Block size must be greater than 0".to_string()));
        }
        if motion.lk_window_size <= 0 || motion.lk_max_level < 0 {
            return Err(Error::ConfigError(
                "Optical flow window must be positive and pyramid level non-negative".to_string(),
            ));
        }
        if motion.lk_max_iterations <= 0 || motion.lk_epsilon <= 0.0 {
            return Err(Error::ConfigError(
                "Optical flow termination criteria must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Activity Recognition Configuration

# Model paths
models:
  classifier: "models/activity_classifier.onnx"
  artifacts: "models/activity_artifacts.yaml"

# Decision engine
engine:
  enable_motion_validation: true
  problematic_labels:
    - "Caminar alejandose (espaldas)"

# Motion analysis
motion:
  diff_threshold: 25.0
  min_contour_area: 500.0
  blur_kernel_size: 21
  dilate_iterations: 2
  frame_history: 5
  max_corners: 100
  quality_level: 0.3
  min_distance: 7.0
  block_size: 7
  min_tracked_points: 10
  lk_window_size: 15
  lk_max_level: 2
  lk_max_iterations: 10
  lk_epsilon: 0.03
"#;
