//! Synchronous inference path for one request: decode, detect, flatten, classify.

use std::time::Instant;

use image::RgbImage;
use ml_core::{Classification, FeatureVector};
use tracing::debug;

use crate::api::{error::ApiError, intake::ImageSource, models::Models};

/// Run the full pipeline over one image source.
pub(crate) fn predict(models: &Models, source: ImageSource) -> Result<Classification, ApiError> {
    let bytes = source.into_bytes()?;

    let image = timed("decode", || {
        tracing::info_span!("predict.decode", bytes = bytes.len()).in_scope(|| decode_image(&bytes))
    })?;

    let landmarks = timed("detect", || {
        tracing::info_span!(
            "predict.detect",
            width = image.width(),
            height = image.height()
        )
        .in_scope(|| models.extractor.extract(&image))
    })
    .map_err(ApiError::Image)?;

    let Some((pose, face)) = landmarks.both() else {
        debug!(
            pose = landmarks.pose.is_some(),
            face = landmarks.face.is_some(),
            "incomplete holistic detection"
        );
        return Err(ApiError::NoLandmarks);
    };

    timed("classify", || {
        tracing::info_span!("predict.classify").in_scope(|| {
            let features = FeatureVector::build_for(pose, face, models.classifier.input_len())
                .map_err(|err| ApiError::Landmarks(err.into()))?;
            models
                .classifier
                .classify(&features)
                .map_err(ApiError::Landmarks)
        })
    })
}

/// Decode any format the `image` crate recognises into RGB.
pub(crate) fn decode_image(bytes: &[u8]) -> Result<RgbImage, ApiError> {
    image::load_from_memory(bytes)
        .map(|image| image.to_rgb8())
        .map_err(ApiError::Decode)
}

fn timed<T>(stage: &'static str, f: impl FnOnce() -> T) -> T {
    let started = Instant::now();
    let out = f();
    metrics::histogram!("body_language_stage_latency_seconds", "stage" => stage)
        .record(started.elapsed().as_secs_f64());
    out
}
