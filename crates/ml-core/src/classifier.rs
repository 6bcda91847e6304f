use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{Context, Result, anyhow, bail};
use ndarray::Array2;
use ort::session::Session;
use tracing::debug;

use crate::{features::FeatureVector, registry::ClassRegistry, session};

/// Predicted label plus the full distribution, in registry order.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub label: String,
    pub probabilities: Vec<f32>,
}

impl Classification {
    /// Turn a raw probability row into a classification over `registry`.
    ///
    /// The row is always renormalised to a unit sum. The label is the first
    /// class holding the maximum probability.
    pub fn from_probabilities(registry: &ClassRegistry, row: &[f32]) -> Result<Self> {
        if row.len() != registry.len() {
            bail!(
                "classifier returned {} probabilities for {} known classes",
                row.len(),
                registry.len()
            );
        }
        if let Some(bad) = row.iter().find(|p| !p.is_finite() || **p < 0.0) {
            bail!("classifier returned an invalid probability: {bad}");
        }

        let total: f32 = row.iter().sum();
        if total <= 0.0 {
            bail!("classifier returned an all-zero probability distribution");
        }
        debug!("renormalising probability row with sum {total}");
        let probabilities: Vec<f32> = row.iter().map(|p| p / total).collect();

        let best = argmax(&probabilities).ok_or_else(|| anyhow!("empty probability row"))?;
        let label = registry
            .get(best)
            .ok_or_else(|| anyhow!("class index {best} outside registry"))?
            .to_string();

        Ok(Self {
            label,
            probabilities,
        })
    }

    /// Probability of the predicted label.
    pub fn confidence(&self) -> f32 {
        self.probabilities
            .iter()
            .copied()
            .fold(0.0f32, f32::max)
    }
}

/// Index of the largest value; ties resolve to the lowest index.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (index, &value) in values.iter().enumerate() {
        match best {
            Some((_, current)) if value <= current => {}
            _ => best = Some((index, value)),
        }
    }
    best.map(|(index, _)| index)
}

/// Capability to classify a feature vector against a fixed class registry.
pub trait Classifier: Send + Sync {
    fn classes(&self) -> &ClassRegistry;
    /// Feature length the classifier was built for.
    fn input_len(&self) -> usize;
    fn classify(&self, features: &FeatureVector) -> Result<Classification>;
}

/// Loader options for [`OnnxClassifier`].
#[derive(Debug, Clone)]
pub struct OnnxClassifierConfig {
    pub model_path: PathBuf,
    pub classes_path: PathBuf,
    pub input_len: usize,
    /// Output holding the `[1, classes]` probability tensor.
    pub probability_output: usize,
    pub intra_threads: usize,
}

impl OnnxClassifierConfig {
    pub fn new<P: AsRef<Path>>(model_path: P, input_len: usize) -> Self {
        let model_path = model_path.as_ref().to_path_buf();
        Self {
            classes_path: ClassRegistry::default_path_for(&model_path),
            model_path,
            input_len,
            probability_output: 1,
            intra_threads: 1,
        }
    }
}

/// Pre-trained classifier exported to ONNX.
///
/// Expects a float input of shape `[1, input_len]` and a float probability
/// output (scikit-learn exports need `zipmap=False`).
pub struct OnnxClassifier {
    session: Mutex<Session>,
    registry: ClassRegistry,
    input_len: usize,
    probability_output: usize,
}

impl OnnxClassifier {
    pub fn load(config: &OnnxClassifierConfig) -> Result<Self> {
        if config.input_len == 0 {
            bail!("classifier input length must be positive");
        }
        let registry = ClassRegistry::load(&config.classes_path).with_context(|| {
            format!(
                "Failed to load class labels for {}",
                config.model_path.display()
            )
        })?;
        let session = session::load_session(&config.model_path, config.intra_threads)?;
        Ok(Self {
            session: Mutex::new(session),
            registry,
            input_len: config.input_len,
            probability_output: config.probability_output,
        })
    }
}

impl Classifier for OnnxClassifier {
    fn classes(&self) -> &ClassRegistry {
        &self.registry
    }

    fn input_len(&self) -> usize {
        self.input_len
    }

    fn classify(&self, features: &FeatureVector) -> Result<Classification> {
        if features.len() != self.input_len {
            bail!(
                "feature vector has {} values but the classifier expects {}",
                features.len(),
                self.input_len
            );
        }
        let input = Array2::from_shape_vec((1, features.len()), features.as_slice().to_vec())?;

        let mut guard = self
            .session
            .lock()
            .map_err(|_| anyhow!("classifier session poisoned"))?;
        let mut outputs = session::run_f32(&mut guard, input, &[self.probability_output])?;
        drop(guard);

        let row = outputs.pop().unwrap_or_default();
        Classification::from_probabilities(&self.registry, &row)
    }
}
