//! HTTP inference service that classifies body language from a single image.
//!
//! The module is split into focused submodules:
//! - `config`: CLI arguments and validated server/model configuration.
//! - `intake`: Locates the image in multipart or JSON request bodies.
//! - `pipeline`: Decode, landmark detection, and classification for one image.
//! - `models`: Loads the ONNX collaborators shared by every request.
//! - `server`: Actix Web routes and the listener.
//! - `telemetry`: Tracing subscriber and Prometheus recorder setup.
//! - `data`: JSON response bodies.
//! - `error`: Request failures and their HTTP mapping.

/// Re-export CLI arguments so the command layer can build configs directly.
pub use config::{ModelCliArgs, ServeCliArgs};
pub(crate) use config::{ModelConfig, ServeConfig};
pub(crate) use data::PredictionResponse;
pub(crate) use intake::ImageSource;
pub(crate) use models::Models;
pub(crate) use pipeline::predict;
/// Start the HTTP service with a ready-made configuration.
pub(crate) use server::run;
pub(crate) use telemetry::init_tracing;

mod config;
mod data;
mod error;
mod intake;
mod models;
mod pipeline;
mod server;
mod telemetry;

#[cfg(test)]
mod testing;
