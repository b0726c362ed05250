//! Boundary to the externally trained activity classifier.
//!
//! The classifier itself, its feature scaler, its optional feature selector
//! and its label vocabulary are immutable artifacts produced by a separate
//! training pipeline. This module turns the engineered features into the
//! classifier's input row, runs it, and ranks the resulting probabilities.

use crate::{
    activity::{ActivityCategory, DEFAULT_VOCABULARY},
    config::ModelConfig,
    constants::{BASIC_NORMALIZATION_EPSILON, NUM_ENHANCED_FEATURES},
    features::EnhancedFeatureVector,
    history::RingBuffer,
    Error, Result,
};
use log::{debug, info, warn};
use ndarray::{Array2, CowArray};
use ort::{Environment, Session, Value};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Raw classifier output
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Predicted class index into the label vocabulary
    pub index: usize,
    /// Probability per class, in vocabulary order
    pub probabilities: Vec<f64>,
}

/// An activity classifier consuming one feature row
pub trait ActivityClassifier: Send + Sync {
    /// Classify a single row of features
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails or the input has the wrong width
    fn classify(&self, features: &[f64]) -> Result<Classification>;

    /// Classifier name for logging
    fn name(&self) -> &str;
}

/// Per-feature standardisation: `(x - mean) / scale`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// # Errors
    ///
    /// Returns an error if `mean` and `scale` differ in length
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self> {
        if mean.len() != scale.len() {
            return Err(Error::ModelError(format!(
                "Scaler mean has {} entries but scale has {}",
                mean.len(),
                scale.len()
            )));
        }
        Ok(Self { mean, scale })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.mean.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    /// # Errors
    ///
    /// Returns an error if `row` does not have one value per scaler entry
    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.mean.len() {
            return Err(Error::ModelInputError(format!(
                "Scaler expects {} features, got {}",
                self.mean.len(),
                row.len()
            )));
        }

        Ok(row
            .iter()
            .zip(self.mean.iter().zip(self.scale.iter()))
            .map(|(x, (mean, scale))| {
                // A zero scale marks a constant training column
                let scale = if *scale == 0.0 { 1.0 } else { *scale };
                (x - mean) / scale
            })
            .collect())
    }
}

/// Boolean column mask selecting the features the classifier was trained on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSelector {
    pub mask: Vec<bool>,
}

impl FeatureSelector {
    #[must_use]
    pub fn new(mask: Vec<bool>) -> Self {
        Self { mask }
    }

    /// Number of columns kept
    #[must_use]
    pub fn selected_count(&self) -> usize {
        self.mask.iter().filter(|&&keep| keep).count()
    }

    /// # Errors
    ///
    /// Returns an error if `row` is not as wide as the mask
    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.mask.len() {
            return Err(Error::ModelInputError(format!(
                "Feature selector expects {} features, got {}",
                self.mask.len(),
                row.len()
            )));
        }

        Ok(row
            .iter()
            .zip(self.mask.iter())
            .filter_map(|(&x, &keep)| keep.then_some(x))
            .collect())
    }
}

/// Which features the classifier consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    /// The engineered vector of the current frame
    #[default]
    LatestFrame,
    /// The whole feature window, flattened oldest first
    FlattenedWindow,
}

/// Metadata shipped alongside the classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelArtifacts {
    /// Ordered label vocabulary
    pub labels: Vec<String>,
    pub scaler: Option<StandardScaler>,
    pub selector: Option<FeatureSelector>,
    pub input_mode: InputMode,
}

impl Default for ModelArtifacts {
    fn default() -> Self {
        Self {
            labels: DEFAULT_VOCABULARY.iter().map(|s| (*s).to_string()).collect(),
            scaler: None,
            selector: None,
            input_mode: InputMode::LatestFrame,
        }
    }
}

impl ModelArtifacts {
    /// Load artifacts from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::IoError(e.to_string()))?;
        let mut artifacts: Self = serde_yaml::from_str(&content)
            .map_err(|e| Error::ModelError(format!("Failed to parse model artifacts: {e}")))?;

        if artifacts.labels.is_empty() {
            warn!("Model artifacts carry no labels, using the default vocabulary");
            artifacts.labels = Self::default().labels;
        }

        artifacts.validate()?;
        Ok(artifacts)
    }

    /// Width of the row handed to the classifier
    #[must_use]
    pub fn classifier_input_width(&self, window_len: usize) -> usize {
        match self.input_mode {
            InputMode::LatestFrame => self
                .selector
                .as_ref()
                .map_or(NUM_ENHANCED_FEATURES, FeatureSelector::selected_count),
            InputMode::FlattenedWindow => window_len * NUM_ENHANCED_FEATURES,
        }
    }

    /// Check that the transforms fit together
    ///
    /// # Errors
    ///
    /// Returns an error describing the first inconsistency found
    pub fn validate(&self) -> Result<()> {
        if self.labels.is_empty() {
            return Err(Error::ModelError("Label vocabulary is empty".to_string()));
        }

        if let Some(selector) = &self.selector {
            if selector.mask.len() != NUM_ENHANCED_FEATURES {
                return Err(Error::ModelError(format!(
                    "Feature selector mask has {} entries, expected {}",
                    selector.mask.len(),
                    NUM_ENHANCED_FEATURES
                )));
            }
        }

        match (self.input_mode, &self.scaler) {
            (InputMode::FlattenedWindow, None) => Err(Error::ModelError(
                "Flattened window input requires a scaler".to_string(),
            )),
            (InputMode::LatestFrame, Some(scaler)) if scaler.len() != self.classifier_input_width(1) => {
                Err(Error::ModelError(format!(
                    "Scaler has {} entries but the classifier input has {}",
                    scaler.len(),
                    self.classifier_input_width(1)
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Classifier output ranked by probability
#[derive(Debug, Clone, PartialEq)]
pub struct RankedPrediction {
    /// Label of the predicted class
    pub label: String,
    /// Highest class probability
    pub confidence: f64,
    /// Every label with its probability, most likely first
    pub ranked: Vec<(String, f64)>,
}

impl RankedPrediction {
    /// Build from a raw classification and the label vocabulary
    ///
    /// # Errors
    ///
    /// Returns an error if the output does not match the vocabulary
    pub fn from_classification(classification: &Classification, labels: &[String]) -> Result<Self> {
        if classification.probabilities.len() != labels.len() {
            return Err(Error::ModelOutputError(format!(
                "Classifier returned {} probabilities for {} labels",
                classification.probabilities.len(),
                labels.len()
            )));
        }

        let label = labels
            .get(classification.index)
            .ok_or_else(|| {
                Error::ModelOutputError(format!("Class index {} out of range", classification.index))
            })?
            .clone();

        let confidence = classification
            .probabilities
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);

        let mut ranked: Vec<(String, f64)> = labels
            .iter()
            .cloned()
            .zip(classification.probabilities.iter().copied())
            .collect();
        // Stable: ties keep vocabulary order
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        Ok(Self {
            label,
            confidence,
            ranked,
        })
    }

    /// Highest probability in the ranking
    #[must_use]
    pub fn top_probability(&self) -> f64 {
        self.ranked.first().map_or(0.0, |(_, p)| *p)
    }

    /// Second highest probability, 0 when there is a single class
    #[must_use]
    pub fn second_probability(&self) -> f64 {
        self.ranked.get(1).map_or(0.0, |(_, p)| *p)
    }

    /// Gap between the two most likely classes
    #[must_use]
    pub fn confidence_gap(&self) -> f64 {
        self.top_probability() - self.second_probability()
    }

    /// Entry at rank `i`
    #[must_use]
    pub fn get(&self, i: usize) -> Option<(&str, f64)> {
        self.ranked.get(i).map(|(label, p)| (label.as_str(), *p))
    }

    /// Most likely entry matching any of `categories`
    #[must_use]
    pub fn find_any(&self, categories: &[ActivityCategory]) -> Option<(&str, f64)> {
        self.ranked
            .iter()
            .find(|(label, _)| categories.iter().any(|c| c.matches(label)))
            .map(|(label, p)| (label.as_str(), *p))
    }

    /// Most likely entry of `category`
    #[must_use]
    pub fn find(&self, category: ActivityCategory) -> Option<(&str, f64)> {
        self.find_any(&[category])
    }

    /// The most likely entries, for logging
    pub fn top(&self, n: usize) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.ranked.iter().take(n).map(|(label, p)| (label.as_str(), *p))
    }
}

/// Classifier plus the transforms that prepare its input
pub struct ClassifierPipeline {
    classifier: Box<dyn ActivityClassifier>,
    artifacts: ModelArtifacts,
}

impl ClassifierPipeline {
    /// # Errors
    ///
    /// Returns an error if the artifacts are inconsistent
    pub fn new(classifier: Box<dyn ActivityClassifier>, artifacts: ModelArtifacts) -> Result<Self> {
        artifacts.validate()?;
        info!(
            "Classifier '{}' ready with {} labels ({:?} input, scaler: {}, selector: {})",
            classifier.name(),
            artifacts.labels.len(),
            artifacts.input_mode,
            artifacts.scaler.is_some(),
            artifacts.selector.is_some()
        );
        Ok(Self { classifier, artifacts })
    }

    /// Load the ONNX classifier and its artifacts as described by `config`
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be loaded
    pub fn load(config: &ModelConfig) -> Result<Self> {
        let artifacts = ModelArtifacts::from_file(&config.artifacts)?;
        let classifier = OnnxClassifier::new(&config.classifier)?;
        Self::new(Box::new(classifier), artifacts)
    }

    #[must_use]
    pub fn artifacts(&self) -> &ModelArtifacts {
        &self.artifacts
    }

    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.artifacts.labels
    }

    /// Build the classifier input row
    ///
    /// # Errors
    ///
    /// Returns an error if a transform rejects the row
    pub fn prepare_input(
        &self,
        window: &RingBuffer<EnhancedFeatureVector>,
        latest: &EnhancedFeatureVector,
    ) -> Result<Vec<f64>> {
        match self.artifacts.input_mode {
            InputMode::LatestFrame => {
                let row = match &self.artifacts.selector {
                    Some(selector) => selector.transform(latest.as_slice())?,
                    None => latest.as_slice().to_vec(),
                };
                match &self.artifacts.scaler {
                    Some(scaler) => scaler.transform(&row),
                    None => Ok(basic_normalization(&row)),
                }
            }
            InputMode::FlattenedWindow => {
                let flattened: Vec<f64> = window
                    .iter()
                    .flat_map(|features| features.as_slice().iter().copied())
                    .collect();
                let scaler = self.artifacts.scaler.as_ref().ok_or_else(|| {
                    Error::ModelError("Flattened window input requires a scaler".to_string())
                })?;
                scaler.transform(&flattened)
            }
        }
    }

    /// Run the classifier and rank its output
    ///
    /// # Errors
    ///
    /// Returns an error if input preparation or inference fails
    pub fn rank(
        &self,
        window: &RingBuffer<EnhancedFeatureVector>,
        latest: &EnhancedFeatureVector,
    ) -> Result<RankedPrediction> {
        let input = self.prepare_input(window, latest)?;
        let classification = self.classifier.classify(&input)?;
        let ranked = RankedPrediction::from_classification(&classification, &self.artifacts.labels)?;

        for (i, (label, p)) in ranked.top(3).enumerate() {
            debug!("  {}. {}: {:.3}", i + 1, label, p);
        }

        Ok(ranked)
    }
}

/// Standardise a row by its own mean and standard deviation
fn basic_normalization(row: &[f64]) -> Vec<f64> {
    if row.is_empty() {
        return Vec::new();
    }
    let n = row.len() as f64;
    let mean = row.iter().sum::<f64>() / n;
    let std = (row.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n).sqrt();
    row.iter()
        .map(|x| (x - mean) / (std + BASIC_NORMALIZATION_EPSILON))
        .collect()
}

/// Classifier exported to ONNX (scikit-learn, zipmap disabled)
pub struct OnnxClassifier {
    session: Session,
    name: String,
}

impl OnnxClassifier {
    /// Load the classifier from an ONNX model file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The ONNX model file cannot be loaded
    /// - The ONNX runtime environment cannot be created
    /// - The model declares no inputs or outputs
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        info!(
            "Initializing activity classifier with model: {}",
            model_path.as_ref().display()
        );
        let environment = Arc::new(
            Environment::builder()
                .with_name("activity_classifier")
                .with_log_level(ort::LoggingLevel::Warning)
                .build()?,
        );

        let session = ort::SessionBuilder::new(&environment)?
            .with_optimization_level(ort::GraphOptimizationLevel::Level3)?
            .with_model_from_file(model_path.as_ref())?;

        if session.inputs.is_empty() {
            return Err(Error::ModelInputError("Model has no inputs".to_string()));
        }
        if session.outputs.is_empty() {
            return Err(Error::ModelOutputError("Model has no outputs".to_string()));
        }

        let name = model_path
            .as_ref()
            .file_stem()
            .map_or_else(|| "onnx".to_string(), |s| s.to_string_lossy().into_owned());

        Ok(Self { session, name })
    }
}

impl ActivityClassifier for OnnxClassifier {
    #[allow(clippy::cast_possible_truncation)] // the model consumes f32
    fn classify(&self, features: &[f64]) -> Result<Classification> {
        let row: Vec<f32> = features.iter().map(|&x| x as f32).collect();
        let input = Array2::from_shape_vec((1, row.len()), row)
            .map_err(|e| Error::ModelInputError(format!("Failed to create input array: {e}")))?;
        let cow_array = CowArray::from(input.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;

        let outputs = self.session.run(vec![input_tensor])?;

        // Probabilities are the last output; a leading int64 output holds the label
        let probabilities_output = outputs
            .last()
            .ok_or_else(|| Error::ModelOutputError("Model produced no outputs".to_string()))?;
        let probabilities_tensor = probabilities_output.try_extract::<f32>()?;
        let probabilities: Vec<f64> = probabilities_tensor
            .view()
            .iter()
            .map(|&p| f64::from(p))
            .collect();

        if probabilities.is_empty() {
            return Err(Error::ModelOutputError("Empty probability output".to_string()));
        }

        let argmax = probabilities
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, &p)| if p > best.1 { (i, p) } else { best })
            .0;

        let index = if outputs.len() >= 2 {
            outputs[0]
                .try_extract::<i64>()
                .ok()
                .and_then(|labels| labels.view().iter().next().copied())
                .and_then(|label| usize::try_from(label).ok())
                .unwrap_or(argmax)
        } else {
            argmax
        };

        Ok(Classification { index, probabilities })
    }

    fn name(&self) -> &str {
        &self.name
    }
}
