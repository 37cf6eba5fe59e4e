//! Classification facade over a pre-trained model
//!
//! The model is an opaque [`Classifier`]: it maps a feature vector in
//! manifest order to the probability of the positive class (CONFIRMED).
//! [`ClassificationFacade`] owns the manifest, the decision threshold and the
//! missing-value policy, and turns named inputs into a [`PredictionResult`].
//!
//! The shipped model format is a JSON logistic model:
//!
//! ```json
//! { "name": "koi-logreg", "intercept": -0.4, "weights": { "koi_period": 0.02 } }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::features::{FeatureManifest, FeatureVector};
use crate::{Error, Result};

/// Default decision threshold on P(CONFIRMED)
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Default value substituted for missing or non-numeric inputs
pub const DEFAULT_MISSING_VALUE: f64 = 0.0;

/// Read-only binary classifier
///
/// Implementations are shared across sessions without locking.
pub trait Classifier: Send + Sync {
    /// Model identifier (for logs and the leaderboard)
    fn name(&self) -> &str;

    /// Probability of the positive class for a vector in manifest order
    fn predict_proba(&self, features: &FeatureVector) -> f64;
}

/// Predicted class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Label {
    Confirmed,
    FalsePositive,
}

impl Label {
    /// Label for `probability` at `threshold` (inclusive)
    pub fn from_probability(probability: f64, threshold: f64) -> Self {
        if probability >= threshold {
            Label::Confirmed
        } else {
            Label::FalsePositive
        }
    }

    /// Human-readable form used in CSV output
    pub fn display_name(&self) -> &'static str {
        match self {
            Label::Confirmed => "CONFIRMED",
            Label::FalsePositive => "FALSE POSITIVE",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Outcome of one prediction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub label: Label,
    pub probability: f64,
    pub threshold: f64,
    /// Features whose value was replaced by the missing-value default
    pub substituted_features: Vec<String>,
}

/// JSON artifact of a logistic model
#[derive(Debug, Deserialize)]
struct LogisticArtifact {
    #[serde(default = "default_model_name")]
    name: String,
    intercept: f64,
    weights: HashMap<String, f64>,
}

fn default_model_name() -> String {
    "logistic".to_string()
}

/// Logistic regression bound to a manifest: `p = σ(b + Σ wᵢ·xᵢ)`
#[derive(Debug, Clone)]
pub struct LogisticModel {
    name: String,
    intercept: f64,
    coefficients: Vec<f64>,
}

impl LogisticModel {
    /// Parse an artifact and align its weights with `manifest`
    ///
    /// Weights for names outside the manifest are rejected; manifest features
    /// without a weight contribute nothing.
    pub fn from_json(text: &str, manifest: &FeatureManifest) -> Result<Self> {
        let artifact: LogisticArtifact = serde_json::from_str(text)?;

        let mut unknown: Vec<&String> = artifact
            .weights
            .keys()
            .filter(|k| !manifest.contains(k))
            .collect();
        if !unknown.is_empty() {
            unknown.sort();
            return Err(Error::Config(format!(
                "Model weights reference features not in the manifest: {}",
                unknown
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }
        if !artifact.intercept.is_finite() || artifact.weights.values().any(|w| !w.is_finite()) {
            return Err(Error::Config("Model contains non-finite coefficients".to_string()));
        }

        let coefficients = manifest
            .names()
            .iter()
            .map(|name| artifact.weights.get(name).copied().unwrap_or(0.0))
            .collect();

        Ok(Self {
            name: artifact.name,
            intercept: artifact.intercept,
            coefficients,
        })
    }

    pub fn load(path: &Path, manifest: &FeatureManifest) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read model {}: {}", path.display(), e))
        })?;
        Self::from_json(&text, manifest)
    }
}

impl Classifier for LogisticModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict_proba(&self, features: &FeatureVector) -> f64 {
        let z = features
            .values()
            .iter()
            .zip(&self.coefficients)
            .fold(self.intercept, |acc, (x, w)| acc + x * w);
        1.0 / (1.0 + (-z).exp())
    }
}

/// Boundary between request handlers and the model
#[derive(Clone)]
pub struct ClassificationFacade {
    manifest: Arc<FeatureManifest>,
    model: Arc<dyn Classifier>,
    threshold: f64,
    missing_default: f64,
}

impl fmt::Debug for ClassificationFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassificationFacade")
            .field("model", &self.model.name())
            .field("features", &self.manifest.len())
            .field("threshold", &self.threshold)
            .field("missing_default", &self.missing_default)
            .finish()
    }
}

impl ClassificationFacade {
    pub fn new(
        manifest: FeatureManifest,
        model: Arc<dyn Classifier>,
        threshold: f64,
        missing_default: f64,
    ) -> Result<Self> {
        let threshold = validate_threshold(threshold)?;
        if !missing_default.is_finite() {
            return Err(Error::Config("missing_value_default must be finite".to_string()));
        }
        Ok(Self {
            manifest: Arc::new(manifest),
            model,
            threshold,
            missing_default,
        })
    }

    /// Load manifest and logistic model artifact from disk
    pub fn load(
        model_path: &Path,
        features_path: &Path,
        threshold: f64,
        missing_default: f64,
    ) -> Result<Self> {
        let manifest = FeatureManifest::load(features_path)?;
        let model = LogisticModel::load(model_path, &manifest)?;
        tracing::info!(
            model = %model.name(),
            features = manifest.len(),
            threshold,
            "Classifier loaded"
        );
        Self::new(manifest, Arc::new(model), threshold, missing_default)
    }

    pub fn manifest(&self) -> &FeatureManifest {
        &self.manifest
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn missing_default(&self) -> f64 {
        self.missing_default
    }

    /// Resolve named inputs with the configured missing-value policy
    pub fn vectorize(&self, inputs: &HashMap<String, Option<f64>>) -> FeatureVector {
        self.manifest.resolve(inputs, self.missing_default)
    }

    /// P(CONFIRMED), clamped into `[0, 1]`
    pub fn predict_proba(&self, features: &FeatureVector) -> f64 {
        let p = self.model.predict_proba(features);
        if p.is_nan() {
            0.0
        } else {
            p.clamp(0.0, 1.0)
        }
    }

    /// Label at the configured threshold
    pub fn predict(&self, features: &FeatureVector) -> Label {
        Label::from_probability(self.predict_proba(features), self.threshold)
    }

    /// Full result for a resolved vector
    pub fn classify_vector(&self, features: &FeatureVector, threshold: f64) -> PredictionResult {
        let probability = self.predict_proba(features);
        PredictionResult {
            label: Label::from_probability(probability, threshold),
            probability,
            threshold,
            substituted_features: features.substituted().to_vec(),
        }
    }

    /// Classify named inputs, optionally overriding the threshold
    ///
    /// Missing features never fail the call; they are substituted and reported.
    pub fn classify(
        &self,
        inputs: &HashMap<String, Option<f64>>,
        threshold: Option<f64>,
    ) -> Result<PredictionResult> {
        let threshold = match threshold {
            Some(t) => validate_threshold(t)?,
            None => self.threshold,
        };
        let vector = self.vectorize(inputs);
        if vector.has_substitutions() {
            tracing::warn!(
                substituted = ?vector.substituted(),
                default = self.missing_default,
                "Missing or non-numeric features replaced with default"
            );
        }
        Ok(self.classify_vector(&vector, threshold))
    }
}

/// Thresholds must lie in `[0, 1]`
pub fn validate_threshold(threshold: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(threshold)
    } else {
        Err(Error::InvalidInput(format!(
            "threshold must be between 0 and 1, got {}",
            threshold
        )))
    }
}
