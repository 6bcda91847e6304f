use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use thiserror::Error;

use crate::api::data::ErrorResponse;

/// Every way a request can fail, mapped to a status and a JSON error body.
#[derive(Error, Debug)]
pub(crate) enum ApiError {
    #[error(
        "No image provided. Please upload an image file or provide a base64 encoded image."
    )]
    MissingImage,
    #[error(
        "No body landmarks detected in the image. Please use a clearer image with a person visible."
    )]
    NoLandmarks,
    #[error("Invalid request payload: {0}")]
    InvalidPayload(String),
    #[error("Image payload exceeds the {limit} byte limit.")]
    PayloadTooLarge { limit: usize },
    #[error("Error processing image: invalid base64 image data: {0}")]
    InvalidBase64(#[source] base64::DecodeError),
    #[error("Error processing image: unable to decode image data: {0}")]
    Decode(#[source] image::ImageError),
    #[error("Error processing image: {0:#}")]
    Image(anyhow::Error),
    #[error("Error processing landmarks: {0:#}")]
    Landmarks(anyhow::Error),
    #[error("Error retrieving classes: {0}")]
    Classes(String),
}

impl ApiError {
    /// Metric label for the failure kind.
    pub(crate) fn outcome(&self) -> &'static str {
        match self {
            ApiError::MissingImage => "missing_image",
            ApiError::NoLandmarks => "no_landmarks",
            ApiError::InvalidPayload(_) => "invalid_payload",
            ApiError::PayloadTooLarge { .. } => "payload_too_large",
            ApiError::InvalidBase64(_) | ApiError::Decode(_) => "undecodable_image",
            ApiError::Image(_) => "image_error",
            ApiError::Landmarks(_) => "landmark_error",
            ApiError::Classes(_) => "classes_error",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingImage | ApiError::NoLandmarks | ApiError::InvalidPayload(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::InvalidBase64(_)
            | ApiError::Decode(_)
            | ApiError::Image(_)
            | ApiError::Landmarks(_)
            | ApiError::Classes(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse::new(self.to_string()))
    }
}
