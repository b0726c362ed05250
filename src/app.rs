//! Replay application: feeds a recorded joint sequence, and optionally the
//! video it was extracted from, through a decision engine.

use crate::{
    decision_engine::{DecisionEngine, Prediction},
    error::{Error, Result},
    joints::{Joint, JointFrame},
    motion_analyzer::{ConsistencyStats, MotionAnalysis},
    utils::project_joints,
};
use log::{info, warn};
use opencv::{
    core::{Mat, Point, Scalar},
    highgui::{self, WINDOW_NORMAL},
    imgproc::{self, FONT_HERSHEY_SIMPLEX, LINE_8},
    prelude::*,
    videoio::{self, VideoCapture},
};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const WINDOW_NAME: &str = "Activity Recognition";

/// Replay configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// YAML file with one joint map (or `null`) per frame
    pub joints_path: PathBuf,
    /// Video the joints were extracted from
    pub video_path: Option<PathBuf>,
    /// Show the annotated video
    pub display: bool,
}

/// Outcome of a replay
#[derive(Debug, Clone)]
pub struct ReplaySummary {
    /// One prediction per replayed frame
    pub predictions: Vec<Prediction>,
    /// Label versus motion agreement
    pub stats: ConsistencyStats,
    pub elapsed: Duration,
}

impl ReplaySummary {
    #[must_use]
    pub fn frames(&self) -> usize {
        self.predictions.len()
    }
}

/// Load a recorded joint sequence
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a YAML list of
/// joint maps
pub fn load_joint_sequence<P: AsRef<Path>>(path: P) -> Result<Vec<Option<JointFrame>>> {
    let content = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::IoError(e.to_string()))?;
    serde_yaml::from_str(&content)
        .map_err(|e| Error::InvalidInput(format!("Failed to parse joint sequence: {e}")))
}

/// Replays a joint sequence through a decision engine
pub struct ReplayApp {
    config: AppConfig,
    engine: DecisionEngine,
    sequence: Vec<Option<JointFrame>>,
    video_capture: Option<VideoCapture>,
    stats: ConsistencyStats,
}

impl ReplayApp {
    /// Create the application around an existing engine
    ///
    /// # Errors
    ///
    /// Returns an error if the sequence or video cannot be opened
    pub fn new(config: AppConfig, engine: DecisionEngine) -> Result<Self> {
        info!("Loading joint sequence: {}", config.joints_path.display());
        let sequence = load_joint_sequence(&config.joints_path)?;
        info!("Loaded {} frames", sequence.len());

        let video_capture = match &config.video_path {
            Some(path) => {
                info!("Opening video file: {}", path.display());
                let capture = VideoCapture::from_file(&path.to_string_lossy(), videoio::CAP_ANY)?;
                if !capture.is_opened()? {
                    return Err(Error::IoError(format!("Cannot open video {}", path.display())));
                }
                Some(capture)
            }
            None => None,
        };

        if config.display {
            highgui::named_window(WINDOW_NAME, WINDOW_NORMAL)?;
        }

        Ok(Self {
            config,
            engine,
            sequence,
            video_capture,
            stats: ConsistencyStats::new(),
        })
    }

    #[must_use]
    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    /// Replay every frame and collect the predictions
    ///
    /// # Errors
    ///
    /// Returns an error if reading the video or drawing fails
    pub fn run(&mut self) -> Result<ReplaySummary> {
        info!("Replaying {} frames ({})", self.sequence.len(), self.engine.status());
        let start = Instant::now();
        let mut predictions = Vec::with_capacity(self.sequence.len());

        for index in 0..self.sequence.len() {
            let frame = self.next_video_frame()?;
            let joints = self.sequence[index].as_ref();

            let prediction = self.engine.predict(joints, frame.as_ref());
            if let Some(validation) = self.engine.last_validation() {
                self.stats.record(validation);
            }
            info!("Frame {index}: {prediction}");

            if self.config.display {
                if let Some(frame) = &frame {
                    let mut annotated = frame.try_clone()?;
                    draw_overlay(&mut annotated, joints, &prediction, self.engine.last_motion())?;
                    highgui::imshow(WINDOW_NAME, &annotated)?;

                    let key = highgui::wait_key(1)?;
                    if key == 27 || key == i32::from(b'q') {
                        info!("Exit requested by user");
                        predictions.push(prediction);
                        break;
                    }
                }
            }

            predictions.push(prediction);
        }

        let summary = ReplaySummary {
            predictions,
            stats: self.stats.clone(),
            elapsed: start.elapsed(),
        };
        info!(
            "Replay finished: {} frames in {:.2}s",
            summary.frames(),
            summary.elapsed.as_secs_f64()
        );
        Ok(summary)
    }

    /// Next video frame, or `None` once the video is exhausted
    fn next_video_frame(&mut self) -> Result<Option<Mat>> {
        let Some(capture) = self.video_capture.as_mut() else {
            return Ok(None);
        };

        let mut frame = Mat::default();
        if !capture.read(&mut frame)? || frame.empty() {
            warn!("Video ended before the joint sequence, continuing without frames");
            self.video_capture = None;
            return Ok(None);
        }
        Ok(Some(frame))
    }
}

/// Draw joints, label and motion level onto a video frame
///
/// # Errors
///
/// Returns an error if `OpenCV` drawing fails
pub fn draw_overlay(
    frame: &mut Mat,
    joints: Option<&JointFrame>,
    prediction: &Prediction,
    motion: Option<&MotionAnalysis>,
) -> Result<()> {
    if let Some(joints) = joints {
        let (width, height) = (frame.cols(), frame.rows());
        for point in &project_joints(joints, &Joint::ALL, width, height) {
            imgproc::circle(frame, point, 4, Scalar::new(0.0, 255.0, 0.0, 0.0), -1, LINE_8, 0)?;
        }
    }

    imgproc::put_text(
        frame,
        &prediction.to_string(),
        Point::new(10, 30),
        FONT_HERSHEY_SIMPLEX,
        0.8,
        Scalar::new(0.0, 255.0, 0.0, 0.0),
        2,
        LINE_8,
        false,
    )?;

    if let Some(motion) = motion {
        let text = format!(
            "motion: {} (diff {:.1}%, flow {:.2})",
            motion.level, motion.frame_difference.motion_percentage, motion.optical_flow.avg_magnitude
        );
        imgproc::put_text(
            frame,
            &text,
            Point::new(10, 60),
            FONT_HERSHEY_SIMPLEX,
            0.6,
            Scalar::new(0.0, 200.0, 255.0, 0.0),
            1,
            LINE_8,
            false,
        )?;
    }

    Ok(())
}
