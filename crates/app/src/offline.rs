//! One-shot commands that reuse the inference pipeline without the HTTP layer.

use anyhow::{Context, Result};
use ml_core::ClassRegistry;
use tracing::info;

use crate::{
    api::{self, ImageSource, ModelCliArgs, ModelConfig, Models, PredictionResponse},
    cli::PredictCliArgs,
};

/// Classify one image file and print the response body the API would return.
pub fn run_prediction(args: PredictCliArgs) -> Result<()> {
    let image_path = args.image;
    let config = ModelConfig::try_from(args.models)?;
    let models = Models::load(&config)?;

    let bytes = std::fs::read(&image_path)
        .with_context(|| format!("Failed to read image {}", image_path.display()))?;
    info!(image = %image_path.display(), bytes = bytes.len(), "classifying image");

    let result = api::predict(&models, ImageSource::Upload(bytes))?;
    let response = PredictionResponse::new(&result, models.classifier.classes());
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

/// Print the class labels without loading any ONNX model.
pub fn print_classes(args: ModelCliArgs) -> Result<()> {
    let config = ModelConfig::try_from(args)?;
    let path = &config.classifier.classes_path;
    let registry = ClassRegistry::load(path)
        .with_context(|| format!("Failed to load class labels from {}", path.display()))?;
    for label in registry.labels() {
        println!("{label}");
    }
    Ok(())
}
