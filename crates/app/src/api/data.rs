use indexmap::IndexMap;
use ml_core::{ClassRegistry, Classification};
use serde::Serialize;

pub(crate) const HEALTH_MESSAGE: &str = "Body Language API is running";

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) status: &'static str,
    pub(crate) message: &'static str,
}

impl HealthResponse {
    pub(crate) fn online() -> Self {
        Self {
            status: "online",
            message: HEALTH_MESSAGE,
        }
    }
}

#[derive(Serialize, Debug, PartialEq)]
pub(crate) struct PredictionResponse {
    pub(crate) status: &'static str,
    pub(crate) prediction: String,
    /// Probability of `prediction`, as a percentage.
    pub(crate) confidence: f64,
    /// Every known class in registry order, as percentages.
    pub(crate) class_probabilities: IndexMap<String, f64>,
}

impl PredictionResponse {
    pub(crate) fn new(result: &Classification, registry: &ClassRegistry) -> Self {
        let class_probabilities = registry
            .labels()
            .iter()
            .zip(&result.probabilities)
            .map(|(label, &p)| (label.clone(), round_percent(p)))
            .collect();
        Self {
            status: "success",
            prediction: result.label.clone(),
            confidence: round_percent(result.confidence()),
            class_probabilities,
        }
    }
}

#[derive(Serialize)]
pub(crate) struct ClassesResponse<'a> {
    pub(crate) status: &'static str,
    pub(crate) classes: &'a [String],
}

impl<'a> ClassesResponse<'a> {
    pub(crate) fn new(classes: &'a [String]) -> Self {
        Self {
            status: "success",
            classes,
        }
    }
}

#[derive(Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) status: &'static str,
    pub(crate) message: String,
}

impl ErrorResponse {
    pub(crate) fn new(message: String) -> Self {
        Self {
            status: "error",
            message,
        }
    }
}

/// Probability in `[0, 1]` as a percentage rounded to two decimals.
pub(crate) fn round_percent(probability: f32) -> f64 {
    (probability as f64 * 100.0 * 100.0).round() / 100.0
}
