//! CLI arguments and the validated configuration built from them.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Args;
use ml_core::{HOLISTIC_FEATURE_LEN, HolisticConfig, OnnxClassifierConfig};

const DEFAULT_MAX_PAYLOAD_MB: usize = 16;

/// Model locations and inference knobs shared by every subcommand.
#[derive(Debug, Args)]
pub struct ModelCliArgs {
    /// Pre-trained classifier exported to ONNX.
    #[arg(long = "model", value_name = "PATH", default_value = "body_language.onnx")]
    pub model: PathBuf,
    /// JSON array of class labels (defaults to `<model>.classes.json`).
    #[arg(long = "classes", value_name = "PATH")]
    pub classes: Option<PathBuf>,
    /// MediaPipe pose landmark model exported to ONNX.
    #[arg(long = "pose-model", value_name = "PATH", default_value = "pose_landmark.onnx")]
    pub pose_model: PathBuf,
    /// MediaPipe face mesh model exported to ONNX.
    #[arg(long = "face-model", value_name = "PATH", default_value = "face_landmark.onnx")]
    pub face_model: PathBuf,
    /// Minimum presence score for a pose or face to count as detected.
    #[arg(long = "min-detection-confidence", value_name = "P")]
    pub min_detection_confidence: Option<f32>,
    /// Square input edge of the pose model.
    #[arg(long = "pose-input-size", value_name = "PX")]
    pub pose_input_size: Option<u32>,
    /// Square input edge of the face model.
    #[arg(long = "face-input-size", value_name = "PX")]
    pub face_input_size: Option<u32>,
    /// Classifier output holding the probability tensor.
    #[arg(long = "probability-output", value_name = "INDEX")]
    pub probability_output: Option<usize>,
    /// Feature length the classifier was trained on.
    #[arg(long = "feature-len", value_name = "N")]
    pub feature_len: Option<usize>,
    /// Threads per ONNX session.
    #[arg(long = "intra-threads", value_name = "N")]
    pub intra_threads: Option<usize>,
}

/// CLI arguments accepted by the `serve` subcommand.
#[derive(Debug, Args)]
pub struct ServeCliArgs {
    #[command(flatten)]
    pub models: ModelCliArgs,
    /// Address to bind.
    #[arg(long = "host", value_name = "ADDR", default_value = "0.0.0.0")]
    pub host: String,
    /// Port to bind.
    #[arg(long = "port", value_name = "PORT", default_value_t = 5001)]
    pub port: u16,
    /// HTTP worker threads (defaults to the number of CPUs).
    #[arg(long = "workers", value_name = "N")]
    pub workers: Option<usize>,
    /// Largest accepted request body, in MiB.
    #[arg(long = "max-payload-mb", value_name = "MB")]
    pub max_payload_mb: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub classifier: OnnxClassifierConfig,
    pub holistic: HolisticConfig,
}

#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
    pub max_payload_bytes: usize,
    pub models: ModelConfig,
}

impl TryFrom<ModelCliArgs> for ModelConfig {
    type Error = anyhow::Error;

    fn try_from(args: ModelCliArgs) -> Result<Self> {
        let feature_len = args.feature_len.unwrap_or(HOLISTIC_FEATURE_LEN);
        if feature_len == 0 {
            bail!("--feature-len must be at least 1");
        }
        let intra_threads = args.intra_threads.unwrap_or(1);
        if intra_threads == 0 {
            bail!("--intra-threads must be at least 1");
        }

        let mut classifier = OnnxClassifierConfig::new(&args.model, feature_len);
        if let Some(classes) = args.classes {
            classifier.classes_path = classes;
        }
        if let Some(index) = args.probability_output {
            classifier.probability_output = index;
        }
        classifier.intra_threads = intra_threads;

        let mut holistic = HolisticConfig::new(args.pose_model, args.face_model);
        if let Some(confidence) = args.min_detection_confidence {
            if !(0.0..=1.0).contains(&confidence) {
                bail!("--min-detection-confidence must be between 0 and 1");
            }
            holistic.min_detection_confidence = confidence;
        }
        match args.pose_input_size {
            Some(0) => bail!("--pose-input-size must be a positive integer"),
            Some(size) => holistic.pose_input_size = size,
            None => {}
        }
        match args.face_input_size {
            Some(0) => bail!("--face-input-size must be a positive integer"),
            Some(size) => holistic.face_input_size = size,
            None => {}
        }
        holistic.intra_threads = intra_threads;

        Ok(Self {
            classifier,
            holistic,
        })
    }
}

impl TryFrom<ServeCliArgs> for ServeConfig {
    type Error = anyhow::Error;

    fn try_from(args: ServeCliArgs) -> Result<Self> {
        if args.workers == Some(0) {
            bail!("--workers must be at least 1");
        }
        let max_payload_mb = args.max_payload_mb.unwrap_or(DEFAULT_MAX_PAYLOAD_MB);
        if max_payload_mb == 0 {
            bail!("--max-payload-mb must be at least 1");
        }

        Ok(Self {
            host: args.host,
            port: args.port,
            workers: args.workers,
            max_payload_bytes: max_payload_mb * 1024 * 1024,
            models: ModelConfig::try_from(args.models)?,
        })
    }
}
