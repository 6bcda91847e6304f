use anyhow::{Context, Result};
use ml_core::{Classifier, LandmarkExtractor, OnnxClassifier, OnnxHolisticExtractor};
use tracing::info;

use crate::api::config::ModelConfig;

/// Collaborators loaded once at startup and shared read-only by every request.
pub(crate) struct Models {
    pub(crate) extractor: Box<dyn LandmarkExtractor>,
    pub(crate) classifier: Box<dyn Classifier>,
}

impl Models {
    pub(crate) fn new(
        extractor: impl LandmarkExtractor + 'static,
        classifier: impl Classifier + 'static,
    ) -> Self {
        Self {
            extractor: Box::new(extractor),
            classifier: Box::new(classifier),
        }
    }

    /// Load the classifier and landmark models; any failure is fatal.
    pub(crate) fn load(config: &ModelConfig) -> Result<Self> {
        let classifier = OnnxClassifier::load(&config.classifier).with_context(|| {
            format!(
                "Failed to load classifier {}",
                config.classifier.model_path.display()
            )
        })?;
        info!(
            model = %config.classifier.model_path.display(),
            classes = classifier.classes().len(),
            input_len = config.classifier.input_len,
            "classifier loaded"
        );

        let extractor = OnnxHolisticExtractor::load(&config.holistic)
            .context("Failed to load landmark models")?;
        info!(
            pose_model = %config.holistic.pose_model_path.display(),
            face_model = %config.holistic.face_model_path.display(),
            "landmark models loaded"
        );

        Ok(Self::new(extractor, classifier))
    }
}
