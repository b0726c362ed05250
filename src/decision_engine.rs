//! Per-stream decision engine.
//!
//! Fuses the classifier output with the geometric rules, the temporal
//! history and the measured motion into one label per frame. Every stage
//! may short-circuit; no stage ever aborts the stream.

use crate::{
    activity::ActivityCategory,
    classifier::{ClassifierPipeline, RankedPrediction},
    config::{Config, EngineConfig},
    constants::{
        ANTI_BIAS_CONFIDENCE, CONFIDENCE_FLOOR, CONFIDENCE_GAP, CONFIDENCE_GAP_TOP, FEATURE_WINDOW_CAPACITY,
        MOTIONLESS_CONFIDENCE, PREDICTION_HISTORY_CAPACITY, SMOOTHING_CONFIDENCE, SMOOTHING_WINDOW,
        SQUAT_FORCED_CONFIDENCE, SQUAT_PROMOTED_CONFIDENCE, SQUAT_PROMOTE_BELOW,
    },
    features::EnhancedFeatureVector,
    heuristics,
    history::RingBuffer,
    joints::JointFrame,
    kinematics::{FeatureVector, KinematicFeatureExtractor, ScaleTrend},
    motion_analyzer::{MotionAnalysis, MotionAnalyzer, ValidationResult},
    Error, Result,
};
use log::{debug, error, info, warn};
use opencv::core::Mat;
use std::fmt;

/// Label emitted for a frame: a vocabulary entry or a fixed sentinel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityLabel {
    /// A label from the classifier vocabulary
    Activity(String),
    /// No classifier, or no subject in the frame
    Idle,
    /// The feature window is still filling
    Initializing { remaining: usize },
    /// The frame could not be turned into features
    Processing,
    /// Every joint is still
    Motionless,
    /// The two most likely classes are too close to call
    Uncertain,
    /// Confidence is below the floor
    DetectingPattern,
    /// An internal fault occurred
    Error,
}

impl ActivityLabel {
    /// The vocabulary label, if this is not a sentinel
    #[must_use]
    pub fn activity(&self) -> Option<&str> {
        match self {
            ActivityLabel::Activity(label) => Some(label),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        !matches!(self, ActivityLabel::Activity(_) | ActivityLabel::Motionless)
    }
}

impl fmt::Display for ActivityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityLabel::Activity(label) => f.write_str(label),
            ActivityLabel::Idle => f.write_str("system initializing..."),
            ActivityLabel::Initializing { remaining } => {
                write!(f, "initializing ({remaining} frames remaining)...")
            }
            ActivityLabel::Processing => f.write_str("processing..."),
            ActivityLabel::Motionless => f.write_str("motionless"),
            ActivityLabel::Uncertain => f.write_str("analyzing sequence..."),
            ActivityLabel::DetectingPattern => f.write_str("detecting pattern..."),
            ActivityLabel::Error => f.write_str("processing error..."),
        }
    }
}

/// Final output for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: ActivityLabel,
    /// In `[0, 1]`
    pub confidence: f64,
}

impl Prediction {
    #[must_use]
    pub fn new(label: ActivityLabel, confidence: f64) -> Self {
        Self { label, confidence }
    }

    fn activity(label: String, confidence: f64) -> Self {
        Self::new(ActivityLabel::Activity(label), confidence)
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:.2})", self.label, self.confidence)
    }
}

/// Readiness of an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    /// Constructed without a classifier
    NotReady,
    /// The feature window still needs `remaining` frames
    Initializing { remaining: usize },
    Ready,
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineStatus::NotReady => f.write_str("not ready"),
            EngineStatus::Initializing { remaining } => write!(f, "initializing ({remaining} remaining)"),
            EngineStatus::Ready => f.write_str("ready"),
        }
    }
}

/// Decision engine for a single video stream.
///
/// Every history is owned by the instance; a second stream needs its own
/// engine.
pub struct DecisionEngine {
    settings: EngineConfig,
    classifier: Option<ClassifierPipeline>,
    extractor: KinematicFeatureExtractor,
    motion: Option<MotionAnalyzer>,
    feature_window: RingBuffer<EnhancedFeatureVector>,
    prediction_history: RingBuffer<(String, f64)>,
    last_motion: Option<MotionAnalysis>,
    last_validation: Option<ValidationResult>,
}

impl DecisionEngine {
    /// Create an engine around an already loaded classifier.
    ///
    /// Without a classifier the engine stays [`EngineStatus::NotReady`] and
    /// answers every frame with the idle sentinel.
    #[must_use]
    pub fn new(config: &Config, classifier: Option<ClassifierPipeline>) -> Self {
        if classifier.is_none() {
            warn!("Decision engine created without a classifier");
        }

        let motion = config
            .engine
            .enable_motion_validation
            .then(|| MotionAnalyzer::new(config.motion.clone()));

        info!(
            "Decision engine ready (motion validation: {})",
            config.engine.enable_motion_validation
        );

        Self {
            settings: config.engine.clone(),
            classifier,
            extractor: KinematicFeatureExtractor::new(),
            motion,
            feature_window: RingBuffer::new(FEATURE_WINDOW_CAPACITY),
            prediction_history: RingBuffer::new(PREDICTION_HISTORY_CAPACITY),
            last_motion: None,
            last_validation: None,
        }
    }

    /// Create an engine, loading the classifier named in `config`.
    ///
    /// A classifier that fails to load leaves the engine not ready.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let classifier = match ClassifierPipeline::load(&config.models) {
            Ok(pipeline) => Some(pipeline),
            Err(e) => {
                warn!("Activity classifier unavailable: {e}");
                None
            }
        };
        Self::new(config, classifier)
    }

    #[must_use]
    pub fn status(&self) -> EngineStatus {
        if self.classifier.is_none() {
            EngineStatus::NotReady
        } else if self.feature_window.is_full() {
            EngineStatus::Ready
        } else {
            EngineStatus::Initializing {
                remaining: self.feature_window.remaining(),
            }
        }
    }

    /// Predict the activity for one frame of joints and, optionally, the raw
    /// video frame they were detected in.
    ///
    /// Motion analysis runs on every supplied frame, even when no subject
    /// was detected.
    pub fn predict(&mut self, joints: Option<&JointFrame>, frame: Option<&Mat>) -> Prediction {
        self.last_validation = None;
        self.last_motion = match (self.motion.as_mut(), frame) {
            (Some(motion), Some(frame)) => match motion.analyze(frame, joints) {
                Ok(analysis) => Some(analysis),
                Err(e) => {
                    warn!("Motion analysis failed: {e}");
                    None
                }
            },
            _ => None,
        };

        if self.classifier.is_none() {
            return Prediction::new(ActivityLabel::Idle, 0.0);
        }

        let Some(joints) = joints.filter(|j| !j.is_empty()) else {
            return Prediction::new(ActivityLabel::Idle, 0.0);
        };

        let features = self.extractor.extract_features(joints);
        self.run(&features)
    }

    /// Predict from an externally computed 16-value feature vector
    pub fn predict_features(&mut self, values: &[f64]) -> Prediction {
        self.last_validation = None;

        if self.classifier.is_none() {
            return Prediction::new(ActivityLabel::Idle, 0.0);
        }

        match FeatureVector::try_from(values) {
            Ok(features) => self.run(&features),
            Err(e) => {
                warn!("Rejected frame: {e}");
                Prediction::new(ActivityLabel::Processing, 0.0)
            }
        }
    }

    fn run(&mut self, features: &FeatureVector) -> Prediction {
        match self.decide(features) {
            Ok(prediction) => prediction,
            Err(e) => {
                error!("Prediction failed: {e}");
                Prediction::new(ActivityLabel::Error, 0.0)
            }
        }
    }

    fn decide(&mut self, features: &FeatureVector) -> Result<Prediction> {
        let classifier = self.classifier.as_ref().ok_or(Error::ClassifierUnavailable)?;

        let enhanced = EnhancedFeatureVector::from_features(features);
        self.feature_window.push(enhanced);
        if !self.feature_window.is_full() {
            return Ok(Prediction::new(
                ActivityLabel::Initializing {
                    remaining: self.feature_window.remaining(),
                },
                0.0,
            ));
        }

        if heuristics::is_static(features) {
            debug!("Static filter: no joint is moving");
            return Ok(Prediction::new(ActivityLabel::Motionless, MOTIONLESS_CONFIDENCE));
        }

        let ranked = classifier.rank(&self.feature_window, &enhanced)?;
        let mut label = ranked.label.clone();
        let mut confidence = ranked.confidence;

        // Geometric overrides
        let geometric = if heuristics::is_squatting(features) {
            squat_override(&ranked)
        } else if heuristics::is_bending(features) {
            bend_override(&ranked, features)
        } else {
            None
        };
        let overridden = geometric.is_some();
        if let Some((new_label, new_confidence)) = geometric {
            debug!("Geometric override: {label} -> {new_label} ({new_confidence:.2})");
            label = new_label;
            confidence = new_confidence;
        }

        if let Some((new_label, new_confidence)) = direction_override(&ranked, &label, self.extractor.scale_trend()) {
            debug!("Scale trend correction: {label} -> {new_label}");
            label = new_label;
            confidence = new_confidence;
        }

        if !overridden
            && ranked.confidence_gap() < CONFIDENCE_GAP
            && ranked.top_probability() < CONFIDENCE_GAP_TOP
        {
            debug!("Uncertain prediction, gap {:.3}", ranked.confidence_gap());
            return Ok(Prediction::new(ActivityLabel::Uncertain, confidence));
        }

        if confidence < ANTI_BIAS_CONFIDENCE && self.settings.problematic_labels.contains(&label) {
            if let Some((runner_up, p)) = ranked.get(1) {
                debug!("Anti-bias: {label} -> {runner_up}");
                label = runner_up.to_string();
                confidence = p;
            }
        }

        label = self.smooth(label, confidence);

        if confidence < CONFIDENCE_FLOOR {
            return Ok(Prediction::new(ActivityLabel::DetectingPattern, confidence));
        }

        if self.settings.enable_motion_validation {
            if let Some(analysis) = &self.last_motion {
                let validation = MotionAnalyzer::validate(&label, analysis);
                if !validation.is_valid {
                    let adjusted = confidence * validation.confidence_adjustment;
                    warn!(
                        "Motion validation ({} motion): confidence {:.2} -> {:.2}",
                        validation.motion_level, confidence, adjusted
                    );
                    for inconsistency in validation.inconsistencies.iter().take(2) {
                        warn!("  ! {}", inconsistency.message);
                    }
                    confidence = adjusted;
                }
                self.last_validation = Some(validation);
            }
        }

        Ok(Prediction::activity(label, confidence))
    }

    /// Majority vote over the most recent predictions
    fn smooth(&mut self, label: String, confidence: f64) -> String {
        self.prediction_history.push((label.clone(), confidence));
        if self.prediction_history.len() < SMOOTHING_WINDOW {
            return label;
        }

        let mut counts: Vec<(&str, usize)> = Vec::with_capacity(SMOOTHING_WINDOW);
        for (recent, _) in self.prediction_history.last_n(SMOOTHING_WINDOW) {
            match counts.iter_mut().find(|(l, _)| *l == recent.as_str()) {
                Some((_, count)) => *count += 1,
                None => counts.push((recent.as_str(), 1)),
            }
        }

        let current = counts.iter().find(|(l, _)| *l == label).map_or(0, |(_, c)| *c);
        if current != 1 || confidence >= SMOOTHING_CONFIDENCE {
            return label;
        }

        let majority = counts
            .iter()
            .fold(None, |best: Option<(&str, usize)>, &(l, c)| match best {
                Some((_, best_count)) if best_count >= c => best,
                _ => Some((l, c)),
            });

        match majority {
            Some((majority, count)) if count > 1 => {
                debug!("Temporal smoothing: {label} -> {majority}");
                majority.to_string()
            }
            _ => label,
        }
    }

    /// Analysis of the most recent video frame
    #[must_use]
    pub fn last_motion(&self) -> Option<&MotionAnalysis> {
        self.last_motion.as_ref()
    }

    /// Validation of the most recent emitted label
    #[must_use]
    pub fn last_validation(&self) -> Option<&ValidationResult> {
        self.last_validation.as_ref()
    }

    #[must_use]
    pub fn scale_trend(&self) -> ScaleTrend {
        self.extractor.scale_trend()
    }

    #[must_use]
    pub fn motion_analyzer(&self) -> Option<&MotionAnalyzer> {
        self.motion.as_ref()
    }

    /// Clear every history and start initializing again
    pub fn reset(&mut self) {
        self.extractor.reset();
        self.feature_window.clear();
        self.prediction_history.clear();
        if let Some(motion) = self.motion.as_mut() {
            motion.reset();
        }
        self.last_motion = None;
        self.last_validation = None;
    }
}

/// Promote or force a squat label
fn squat_override(ranked: &RankedPrediction) -> Option<(String, f64)> {
    match ranked.find(ActivityCategory::Squatting) {
        Some((label, p)) => (p < SQUAT_PROMOTE_BELOW).then(|| (label.to_string(), SQUAT_PROMOTED_CONFIDENCE)),
        None => {
            let label = ranked
                .find_any(&[ActivityCategory::Squatting, ActivityCategory::Crouching])
                .map_or_else(
                    || ActivityCategory::Squatting.canonical_label().to_string(),
                    |(label, _)| label.to_string(),
                );
            Some((label, SQUAT_FORCED_CONFIDENCE))
        }
    }
}

/// Promote the bend label matching the body geometry, if the classifier
/// ranked it low
fn bend_override(ranked: &RankedPrediction, features: &FeatureVector) -> Option<(String, f64)> {
    let bend = heuristics::bend_type(features)?;
    let (label, p) = ranked.find_any(&bend.categories())?;
    debug!("Bend detected: {bend}");
    (p < bend.promote_below()).then(|| (label.to_string(), bend.confidence()))
}

/// Swap approaching and retreating labels that contradict the scale trend
fn direction_override(ranked: &RankedPrediction, label: &str, trend: ScaleTrend) -> Option<(String, f64)> {
    let opposite = if ActivityCategory::Approaching.matches(label) {
        (trend == ScaleTrend::MovingAway).then_some(ActivityCategory::Retreating)
    } else if ActivityCategory::Retreating.matches(label) {
        (trend == ScaleTrend::Approaching).then_some(ActivityCategory::Approaching)
    } else {
        None
    };

    ranked
        .find(opposite?)
        .map(|(label, p)| (label.to_string(), p))
}
