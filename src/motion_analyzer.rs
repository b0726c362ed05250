//! Classical motion analysis on raw video frames.
//!
//! Measures real pixel-level movement independently of the pose model:
//! frame differencing, sparse Lucas-Kanade optical flow and per body region
//! motion. The measurements are used to validate the label chosen by the
//! decision engine.

use crate::{
    activity::ActivityCategory,
    config::MotionConfig,
    constants::{
        FLOW_DETECTED_MAGNITUDE, MIN_CONFIDENCE_ADJUSTMENT, MOTION_HISTORY_CAPACITY, MOTION_LEVEL_MINIMAL,
        MOTION_LEVEL_MODERATE, MOTION_LEVEL_STATIC, MOTION_PERCENT_DIVISOR, MOTION_TREND_WINDOW,
        REGION_RATIO_EPSILON, SQUAT_MIN_LOWER_BODY_MOTION, WALKING_MIN_FLOW,
    },
    history::RingBuffer,
    joints::{Joint, JointFrame},
    utils::{image_conversion::array3_u8_to_mat, project_joints, safe_cast::pixel_count},
    Error, Result,
};
use log::debug;
use ndarray::Array3;
use opencv::{
    core::{self, Mat, Point, Point2f, Rect, Scalar, Size, TermCriteria, TermCriteria_Type, Vector, CV_8UC1},
    imgproc,
    prelude::*,
    video,
};
use std::collections::BTreeMap;
use std::fmt;

/// Overall amount of movement in a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MotionLevel {
    Static,
    Minimal,
    Moderate,
    High,
}

impl MotionLevel {
    /// Bucket a combined motion score
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score < MOTION_LEVEL_STATIC {
            MotionLevel::Static
        } else if score < MOTION_LEVEL_MINIMAL {
            MotionLevel::Minimal
        } else if score < MOTION_LEVEL_MODERATE {
            MotionLevel::Moderate
        } else {
            MotionLevel::High
        }
    }

    /// Classify from the frame difference percentage and mean flow magnitude
    #[must_use]
    pub fn classify(motion_percentage: f64, flow_magnitude: f64) -> Self {
        Self::from_score(motion_percentage / MOTION_PERCENT_DIVISOR + flow_magnitude)
    }

    /// Moderate or high
    #[must_use]
    pub fn is_significant(self) -> bool {
        matches!(self, MotionLevel::Moderate | MotionLevel::High)
    }

    /// Static or minimal
    #[must_use]
    pub fn is_minimal(self) -> bool {
        matches!(self, MotionLevel::Static | MotionLevel::Minimal)
    }
}

impl fmt::Display for MotionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MotionLevel::Static => "static",
            MotionLevel::Minimal => "minimal",
            MotionLevel::Moderate => "moderate",
            MotionLevel::High => "high",
        })
    }
}

/// A connected region of changed pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionRegion {
    pub bbox: Rect,
    pub area: f64,
}

/// Result of differencing two consecutive frames
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameDifference {
    pub motion_detected: bool,
    /// Area of the kept regions as a percentage of the frame
    pub motion_percentage: f64,
    /// Mean absolute difference over the motion pixels
    pub motion_intensity: f64,
    pub regions: Vec<MotionRegion>,
}

/// Displacement of one tracked corner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowVector {
    pub from: Point2f,
    pub to: Point2f,
    pub magnitude: f64,
}

/// Sparse optical flow between two consecutive frames
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpticalFlow {
    pub flow_detected: bool,
    pub avg_magnitude: f64,
    pub max_magnitude: f64,
    pub vectors: Vec<FlowVector>,
}

impl OpticalFlow {
    #[must_use]
    pub fn tracked_points(&self) -> usize {
        self.vectors.len()
    }
}

/// Body region carrying most of the motion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DominantRegion {
    Upper,
    Lower,
    None,
}

impl fmt::Display for DominantRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DominantRegion::Upper => "upper",
            DominantRegion::Lower => "lower",
            DominantRegion::None => "none",
        })
    }
}

/// Mean difference intensity inside the upper and lower body hulls
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionMotion {
    pub upper_body: f64,
    pub lower_body: f64,
    pub dominant: DominantRegion,
    /// Upper over lower motion
    pub ratio: f64,
}

impl RegionMotion {
    /// Result used when there is no previous frame to compare against
    #[must_use]
    pub const fn none() -> Self {
        Self {
            upper_body: 0.0,
            lower_body: 0.0,
            dominant: DominantRegion::None,
            ratio: 1.0,
        }
    }

    /// Build from the per-region intensities
    #[must_use]
    pub fn from_intensities(upper_body: f64, lower_body: f64) -> Self {
        Self {
            upper_body,
            lower_body,
            dominant: if upper_body > lower_body {
                DominantRegion::Upper
            } else {
                DominantRegion::Lower
            },
            ratio: upper_body / (lower_body + REGION_RATIO_EPSILON),
        }
    }
}

/// Per-frame entry of the motion history
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionSample {
    pub frame_diff_percentage: f64,
    pub flow_magnitude: f64,
}

/// Trailing statistics of the frame difference percentage
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionTrend {
    pub mean: f64,
    pub variance: f64,
}

impl MotionTrend {
    /// Mean and variance of the last samples; zero until the window is filled
    #[must_use]
    pub fn from_history(history: &RingBuffer<MotionSample>) -> Self {
        if history.len() < MOTION_TREND_WINDOW {
            return Self::default();
        }

        let recent: Vec<f64> = history
            .last_n(MOTION_TREND_WINDOW)
            .map(|sample| sample.frame_diff_percentage)
            .collect();
        let n = recent.len() as f64;
        let mean = recent.iter().sum::<f64>() / n;
        let variance = recent.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;

        Self { mean, variance }
    }
}

/// Everything measured on one frame
#[derive(Debug, Clone, PartialEq)]
pub struct MotionAnalysis {
    pub frame_difference: FrameDifference,
    pub optical_flow: OpticalFlow,
    /// Present whenever joints were supplied with the frame
    pub region: Option<RegionMotion>,
    pub level: MotionLevel,
    pub trend: MotionTrend,
    /// Number of samples in the motion history, this frame included
    pub sample_count: usize,
}

impl MotionAnalysis {
    /// Analysis of a frame without any measurable change
    #[must_use]
    pub fn still() -> Self {
        Self {
            frame_difference: FrameDifference::default(),
            optical_flow: OpticalFlow::default(),
            region: None,
            level: MotionLevel::Static,
            trend: MotionTrend::default(),
            sample_count: 0,
        }
    }
}

/// Weight of an inconsistency in the confidence adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    #[must_use]
    pub const fn weight(self) -> f64 {
        match self {
            Severity::High => 0.3,
            Severity::Medium => 0.15,
            Severity::Low => 0.05,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        })
    }
}

/// What the label disagrees with
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InconsistencyKind {
    MotionMismatch,
    WalkingValidation,
    SquatValidation,
}

impl fmt::Display for InconsistencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InconsistencyKind::MotionMismatch => "motion_mismatch",
            InconsistencyKind::WalkingValidation => "walking_validation",
            InconsistencyKind::SquatValidation => "squat_validation",
        })
    }
}

/// A disagreement between a label and the measured motion
#[derive(Debug, Clone, PartialEq)]
pub struct Inconsistency {
    pub kind: InconsistencyKind,
    pub message: String,
    pub severity: Severity,
    pub suggestion: String,
}

/// Whether a validated label should be trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recommendation {
    Accept,
    Review,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Recommendation::Accept => "accept",
            Recommendation::Review => "review",
        })
    }
}

/// Outcome of validating a label against a motion analysis
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub inconsistencies: Vec<Inconsistency>,
    /// Factor in `[0.5, 1.0]` applied to the label confidence
    pub confidence_adjustment: f64,
    pub motion_level: MotionLevel,
}

impl ValidationResult {
    #[must_use]
    pub fn recommendation(&self) -> Recommendation {
        if self.is_valid {
            Recommendation::Accept
        } else {
            Recommendation::Review
        }
    }
}

/// Overall agreement between labels and measured motion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsistencyGrade {
    /// Below 60%
    Low,
    /// 60% to 80%
    Acceptable,
    /// 80% and above
    High,
}

impl fmt::Display for ConsistencyGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConsistencyGrade::Low => "low",
            ConsistencyGrade::Acceptable => "acceptable",
            ConsistencyGrade::High => "high",
        })
    }
}

/// Running tally of validation outcomes over a session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsistencyStats {
    pub total: usize,
    pub consistent: usize,
    pub by_kind: BTreeMap<InconsistencyKind, usize>,
}

impl ConsistencyStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, validation: &ValidationResult) {
        self.total += 1;
        if validation.is_valid {
            self.consistent += 1;
        }
        for inconsistency in &validation.inconsistencies {
            *self.by_kind.entry(inconsistency.kind).or_insert(0) += 1;
        }
    }

    #[must_use]
    pub fn inconsistent(&self) -> usize {
        self.total - self.consistent
    }

    /// Percentage of consistent frames
    #[must_use]
    pub fn consistency_rate(&self) -> f64 {
        self.consistent as f64 / self.total.max(1) as f64 * 100.0
    }

    /// Kind seen most often; ties go to the first kind in declaration order
    #[must_use]
    pub fn most_common_kind(&self) -> Option<InconsistencyKind> {
        self.by_kind
            .iter()
            .fold(None, |best: Option<(InconsistencyKind, usize)>, (&kind, &count)| match best {
                Some((_, best_count)) if best_count >= count => best,
                _ => Some((kind, count)),
            })
            .map(|(kind, _)| kind)
    }

    #[must_use]
    pub fn grade(&self) -> ConsistencyGrade {
        let rate = self.consistency_rate();
        if rate < 60.0 {
            ConsistencyGrade::Low
        } else if rate < 80.0 {
            ConsistencyGrade::Acceptable
        } else {
            ConsistencyGrade::High
        }
    }

    /// Whether the session's labels can be trusted as a whole
    #[must_use]
    pub fn recommendation(&self) -> Recommendation {
        if self.inconsistent() == 0 || self.grade() == ConsistencyGrade::High {
            Recommendation::Accept
        } else {
            Recommendation::Review
        }
    }
}

impl fmt::Display for ConsistencyStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Frames processed: {}", self.total)?;
        writeln!(
            f,
            "Consistent predictions: {} ({:.1}%)",
            self.consistent,
            self.consistency_rate()
        )?;
        writeln!(f, "Inconsistent predictions: {}", self.inconsistent())?;

        let mut kinds: Vec<(&InconsistencyKind, &usize)> = self.by_kind.iter().collect();
        kinds.sort_by(|a, b| b.1.cmp(a.1));
        for (kind, count) in kinds {
            let share = *count as f64 / self.inconsistent().max(1) as f64 * 100.0;
            writeln!(f, "  - {kind}: {count} ({share:.1}%)")?;
        }

        match self.most_common_kind() {
            Some(kind) => writeln!(f, "Most common inconsistency: {kind} ({})", self.by_kind[&kind])?,
            None => writeln!(f, "Most common inconsistency: none")?,
        }
        writeln!(f, "Consistency grade: {}", self.grade())?;
        write!(f, "Recommendation: {}", self.recommendation())
    }
}

/// Stateful motion analyzer for one video stream
pub struct MotionAnalyzer {
    config: MotionConfig,
    gray_history: RingBuffer<Mat>,
    flow_previous: Option<Mat>,
    flow_points: Vector<Point2f>,
    motion_history: RingBuffer<MotionSample>,
    last_diff_mask: Option<Mat>,
}

impl MotionAnalyzer {
    #[must_use]
    pub fn new(config: MotionConfig) -> Self {
        Self {
            gray_history: RingBuffer::new(config.frame_history),
            config,
            flow_previous: None,
            flow_points: Vector::new(),
            motion_history: RingBuffer::new(MOTION_HISTORY_CAPACITY),
            last_diff_mask: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    /// Grayscale and blur a BGR frame
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is empty or `OpenCV` fails
    pub fn preprocess(&self, frame: &Mat) -> Result<Mat> {
        if frame.empty() {
            return Err(Error::MotionAnalysisError("Empty frame".to_string()));
        }

        let mut gray = Mat::default();
        if frame.channels() == 1 {
            gray = frame.try_clone()?;
        } else {
            imgproc::cvt_color(frame, &mut gray, imgproc::COLOR_BGR2GRAY, 0)?;
        }

        let mut blurred = Mat::default();
        let kernel = self.config.blur_kernel_size;
        imgproc::gaussian_blur(
            &gray,
            &mut blurred,
            Size::new(kernel, kernel),
            0.0,
            0.0,
            core::BORDER_DEFAULT,
        )?;
        Ok(blurred)
    }

    /// Difference `frame` against the previous frame and buffer it
    ///
    /// # Errors
    ///
    /// Returns an error if `OpenCV` fails
    pub fn frame_difference(&mut self, frame: &Mat) -> Result<FrameDifference> {
        let gray = self.preprocess(frame)?;
        self.drop_history_on_resize(&gray)?;
        let difference = self.difference_against_latest(&gray)?;
        self.gray_history.push(gray);
        Ok(difference)
    }

    /// Track corners from the previous frame into `frame`
    ///
    /// # Errors
    ///
    /// Returns an error if `OpenCV` fails
    pub fn optical_flow(&mut self, frame: &Mat) -> Result<OpticalFlow> {
        let gray = self.preprocess(frame)?;
        self.drop_history_on_resize(&gray)?;
        self.track_flow(&gray)
    }

    /// Motion inside the upper and lower body hulls between the most recently
    /// buffered frame and `frame`. `frame` itself is not buffered.
    ///
    /// # Errors
    ///
    /// Returns an error if `OpenCV` fails
    pub fn region_motion(&self, frame: &Mat, joints: &JointFrame) -> Result<RegionMotion> {
        let gray = self.preprocess(frame)?;
        match self.gray_history.latest() {
            Some(previous) if previous.size()? == gray.size()? => {
                region_motion_between(previous, &gray, joints, self.config.diff_threshold)
            }
            _ => Ok(RegionMotion::none()),
        }
    }

    /// Run every measurement on `frame` and update the motion history
    ///
    /// # Errors
    ///
    /// Returns an error if `OpenCV` fails
    pub fn analyze(&mut self, frame: &Mat, joints: Option<&JointFrame>) -> Result<MotionAnalysis> {
        let gray = self.preprocess(frame)?;
        self.drop_history_on_resize(&gray)?;

        let frame_difference = self.difference_against_latest(&gray)?;

        let region = match joints.filter(|j| !j.is_empty()) {
            Some(joints) => Some(match self.gray_history.latest() {
                Some(previous) => region_motion_between(previous, &gray, joints, self.config.diff_threshold)?,
                None => RegionMotion::none(),
            }),
            None => None,
        };

        let optical_flow = self.track_flow(&gray)?;
        self.gray_history.push(gray);

        self.motion_history.push(MotionSample {
            frame_diff_percentage: frame_difference.motion_percentage,
            flow_magnitude: optical_flow.avg_magnitude,
        });
        let trend = MotionTrend::from_history(&self.motion_history);
        let level = MotionLevel::classify(frame_difference.motion_percentage, optical_flow.avg_magnitude);

        debug!(
            "Motion: {} (diff {:.2}%, flow {:.2}, {} points)",
            level,
            frame_difference.motion_percentage,
            optical_flow.avg_magnitude,
            optical_flow.tracked_points()
        );

        Ok(MotionAnalysis {
            frame_difference,
            optical_flow,
            region,
            level,
            trend,
            sample_count: self.motion_history.len(),
        })
    }

    /// Analyze a raw `height x width x 3` BGR byte buffer
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer cannot be converted or analyzed
    pub fn analyze_raw(&mut self, frame: &Array3<u8>, joints: Option<&JointFrame>) -> Result<MotionAnalysis> {
        let mat = array3_u8_to_mat(frame)?;
        self.analyze(&mat, joints)
    }

    /// Check a label against the measured motion
    #[must_use]
    pub fn validate(label: &str, analysis: &MotionAnalysis) -> ValidationResult {
        let level = analysis.level;
        let dynamic = crate::activity::is_dynamic(label);
        let still = crate::activity::is_static(label);
        let mut inconsistencies = Vec::new();

        if dynamic && level.is_minimal() {
            inconsistencies.push(Inconsistency {
                kind: InconsistencyKind::MotionMismatch,
                message: format!("Dynamic activity '{label}' but {level} motion"),
                severity: Severity::High,
                suggestion: "Consider a static activity".to_string(),
            });
        }

        if still && level.is_significant() {
            inconsistencies.push(Inconsistency {
                kind: InconsistencyKind::MotionMismatch,
                message: format!("Static activity '{label}' but {level} motion"),
                severity: Severity::Medium,
                suggestion: "Consider a dynamic activity".to_string(),
            });
        }

        if ActivityCategory::Walking.matches(label) && analysis.optical_flow.avg_magnitude < WALKING_MIN_FLOW {
            inconsistencies.push(Inconsistency {
                kind: InconsistencyKind::WalkingValidation,
                message: "Walking predicted but optical flow is low".to_string(),
                severity: Severity::High,
                suggestion: "Check that the subject is really walking".to_string(),
            });
        }

        if ActivityCategory::Squatting.matches(label) {
            if let Some(region) = analysis.region {
                if region.lower_body < SQUAT_MIN_LOWER_BODY_MOTION {
                    inconsistencies.push(Inconsistency {
                        kind: InconsistencyKind::SquatValidation,
                        message: "Squat predicted but little leg motion".to_string(),
                        severity: Severity::Medium,
                        suggestion: "Check the squat posture".to_string(),
                    });
                }
            }
        }

        let penalty: f64 = inconsistencies.iter().map(|i| i.severity.weight()).sum();

        ValidationResult {
            is_valid: inconsistencies.is_empty(),
            confidence_adjustment: (1.0 - penalty).max(MIN_CONFIDENCE_ADJUSTMENT),
            inconsistencies,
            motion_level: level,
        }
    }

    /// Binary mask of the last frame difference
    #[must_use]
    pub fn diff_mask(&self) -> Option<&Mat> {
        self.last_diff_mask.as_ref()
    }

    /// Recorded motion samples, oldest first
    pub fn motion_history(&self) -> impl Iterator<Item = &MotionSample> + '_ {
        self.motion_history.iter()
    }

    #[must_use]
    pub fn trend(&self) -> MotionTrend {
        MotionTrend::from_history(&self.motion_history)
    }

    /// Number of buffered preprocessed frames
    #[must_use]
    pub fn buffered_frames(&self) -> usize {
        self.gray_history.len()
    }

    /// Forget every buffered frame and sample
    pub fn reset(&mut self) {
        self.gray_history.clear();
        self.flow_previous = None;
        self.flow_points.clear();
        self.motion_history.clear();
        self.last_diff_mask = None;
    }

    /// A resolution change invalidates every buffered frame
    fn drop_history_on_resize(&mut self, gray: &Mat) -> Result<()> {
        let size = gray.size()?;
        let stale = match self.gray_history.latest().or(self.flow_previous.as_ref()) {
            Some(previous) => previous.size()? != size,
            None => false,
        };
        if stale {
            debug!("Frame size changed to {}x{}, dropping motion buffers", size.width, size.height);
            self.gray_history.clear();
            self.flow_previous = None;
            self.flow_points.clear();
            self.last_diff_mask = None;
        }
        Ok(())
    }

    fn difference_against_latest(&mut self, gray: &Mat) -> Result<FrameDifference> {
        let Some(previous) = self.gray_history.latest() else {
            return Ok(FrameDifference::default());
        };

        let mut diff = Mat::default();
        core::absdiff(previous, gray, &mut diff)?;

        let mut thresh = Mat::default();
        imgproc::threshold(&diff, &mut thresh, self.config.diff_threshold, 255.0, imgproc::THRESH_BINARY)?;

        let mut dilated = Mat::default();
        imgproc::dilate(
            &thresh,
            &mut dilated,
            &Mat::default(),
            Point::new(-1, -1),
            self.config.dilate_iterations,
            core::BORDER_CONSTANT,
            imgproc::morphology_default_border_value()?,
        )?;

        let mut contours: Vector<Vector<Point>> = Vector::new();
        imgproc::find_contours(
            &dilated,
            &mut contours,
            imgproc::RETR_EXTERNAL,
            imgproc::CHAIN_APPROX_SIMPLE,
            Point::new(0, 0),
        )?;

        let mut regions = Vec::new();
        for contour in &contours {
            let area = imgproc::contour_area(&contour, false)?;
            if area >= self.config.min_contour_area {
                regions.push(MotionRegion {
                    bbox: imgproc::bounding_rect(&contour)?,
                    area,
                });
            }
        }

        let total_area: f64 = regions.iter().map(|r| r.area).sum();
        let frame_pixels = pixel_count(gray.rows(), gray.cols());
        let motion_percentage = if frame_pixels > 0.0 {
            total_area / frame_pixels * 100.0
        } else {
            0.0
        };

        let motion_intensity = if core::count_non_zero(&dilated)? > 0 {
            core::mean(&diff, &dilated)?[0]
        } else {
            0.0
        };

        self.last_diff_mask = Some(dilated);

        Ok(FrameDifference {
            motion_detected: !regions.is_empty(),
            motion_percentage,
            motion_intensity,
            regions,
        })
    }

    fn track_flow(&mut self, gray: &Mat) -> Result<OpticalFlow> {
        let previous = match self.flow_previous.take() {
            Some(previous) if self.flow_points.len() >= self.config.min_tracked_points => previous,
            _ => {
                self.seed_corners(gray)?;
                self.flow_previous = Some(gray.try_clone()?);
                return Ok(OpticalFlow::default());
            }
        };

        let mut next_points: Vector<Point2f> = Vector::new();
        let mut status: Vector<u8> = Vector::new();
        let mut errors: Vector<f32> = Vector::new();
        let criteria = TermCriteria::new(
            TermCriteria_Type::COUNT as i32 | TermCriteria_Type::EPS as i32,
            self.config.lk_max_iterations,
            self.config.lk_epsilon,
        )?;
        let window = self.config.lk_window_size;

        video::calc_optical_flow_pyr_lk(
            &previous,
            gray,
            &self.flow_points,
            &mut next_points,
            &mut status,
            &mut errors,
            Size::new(window, window),
            self.config.lk_max_level,
            criteria,
            0,
            1e-4,
        )?;

        let mut vectors = Vec::with_capacity(next_points.len());
        let mut survivors: Vector<Point2f> = Vector::new();
        for ((from, to), ok) in self.flow_points.iter().zip(next_points.iter()).zip(status.iter()) {
            if ok != 1 {
                continue;
            }
            let (dx, dy) = (f64::from(to.x - from.x), f64::from(to.y - from.y));
            vectors.push(FlowVector {
                from,
                to,
                magnitude: dx.hypot(dy),
            });
            survivors.push(to);
        }

        let (avg_magnitude, max_magnitude) = if vectors.is_empty() {
            (0.0, 0.0)
        } else {
            let sum: f64 = vectors.iter().map(|v| v.magnitude).sum();
            let max = vectors.iter().map(|v| v.magnitude).fold(0.0, f64::max);
            (sum / vectors.len() as f64, max)
        };

        self.flow_points = survivors;
        self.flow_previous = Some(gray.try_clone()?);

        Ok(OpticalFlow {
            flow_detected: avg_magnitude > FLOW_DETECTED_MAGNITUDE,
            avg_magnitude,
            max_magnitude,
            vectors,
        })
    }

    fn seed_corners(&mut self, gray: &Mat) -> Result<()> {
        let mut corners: Vector<Point2f> = Vector::new();
        imgproc::good_features_to_track(
            gray,
            &mut corners,
            self.config.max_corners,
            self.config.quality_level,
            self.config.min_distance,
            &Mat::default(),
            self.config.block_size,
            false,
            0.04,
        )?;
        debug!("Seeded {} optical flow corners", corners.len());
        self.flow_points = corners;
        Ok(())
    }
}

/// Mean difference intensity above `threshold` inside the convex hull of
/// the upper and lower body joints
///
/// # Errors
///
/// Returns an error if the frames differ in size or `OpenCV` fails
pub fn region_motion_between(
    previous: &Mat,
    current: &Mat,
    joints: &JointFrame,
    threshold: f64,
) -> Result<RegionMotion> {
    let mut diff = Mat::default();
    core::absdiff(previous, current, &mut diff)?;

    let mut above = Mat::default();
    imgproc::threshold(&diff, &mut above, threshold, 255.0, imgproc::THRESH_BINARY)?;

    let upper = hull_intensity(&diff, &above, joints, &Joint::UPPER_BODY)?;
    let lower = hull_intensity(&diff, &above, joints, &Joint::LOWER_BODY)?;

    Ok(RegionMotion::from_intensities(upper, lower))
}

fn hull_intensity(diff: &Mat, above: &Mat, joints: &JointFrame, region: &[Joint]) -> Result<f64> {
    let points = project_joints(joints, region, diff.cols(), diff.rows());
    if points.is_empty() {
        return Ok(0.0);
    }

    let mut hull: Vector<Point> = Vector::new();
    imgproc::convex_hull(&points, &mut hull, false, true)?;

    let mut mask = Mat::zeros(diff.rows(), diff.cols(), CV_8UC1)?.to_mat()?;
    imgproc::fill_convex_poly(&mut mask, &hull, Scalar::all(255.0), imgproc::LINE_8, 0)?;

    let mut moving = Mat::default();
    core::bitwise_and(&mask, above, &mut moving, &Mat::default())?;

    if core::count_non_zero(&moving)? == 0 {
        return Ok(0.0);
    }
    Ok(core::mean(diff, &moving)?[0])
}
