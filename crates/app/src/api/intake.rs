//! Request intake: locate the image in a multipart upload or a JSON body.

use actix_multipart::{Field, Multipart};
use actix_web::{HttpRequest, http::header, web};
use base64::{Engine, engine::general_purpose::STANDARD};
use futures::TryStreamExt;
use serde::Deserialize;
use tracing::debug;

use crate::api::error::ApiError;

/// Multipart file field carrying raw image bytes.
pub(crate) const IMAGE_FIELD: &str = "image";
/// JSON (or multipart text) field carrying base64 image data.
pub(crate) const IMAGE_BASE64_FIELD: &str = "image_base64";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ImageSource {
    Upload(Vec<u8>),
    Base64(String),
}

impl ImageSource {
    /// Raw encoded image bytes, base64-decoding when needed.
    pub(crate) fn into_bytes(self) -> Result<Vec<u8>, ApiError> {
        match self {
            ImageSource::Upload(bytes) => Ok(bytes),
            ImageSource::Base64(text) => decode_base64(&text),
        }
    }
}

#[derive(Deserialize)]
struct PredictRequest {
    image_base64: Option<String>,
}

/// Pull the image source out of a predict request.
pub(crate) async fn read_image_source(
    req: &HttpRequest,
    payload: web::Payload,
    limit: usize,
) -> Result<ImageSource, ApiError> {
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        read_multipart(Multipart::new(req.headers(), payload), limit).await
    } else {
        let body = read_body(payload, limit).await?;
        source_from_json(&body)
    }
}

async fn read_multipart(mut multipart: Multipart, limit: usize) -> Result<ImageSource, ApiError> {
    let mut received = 0;
    let mut base64_text = None;
    while let Some(field) = multipart
        .try_next()
        .await
        .map_err(|err| ApiError::InvalidPayload(err.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let is_file = field
            .content_disposition()
            .and_then(|disposition| disposition.get_filename())
            .is_some();
        let data = read_field(field, &mut received, limit).await?;
        match name.as_str() {
            IMAGE_FIELD if is_file => return Ok(ImageSource::Upload(data)),
            IMAGE_BASE64_FIELD => {
                base64_text = Some(String::from_utf8_lossy(&data).into_owned());
            }
            other => debug!("ignoring multipart field {other:?} (file: {is_file})"),
        }
    }
    base64_text
        .map(ImageSource::Base64)
        .ok_or(ApiError::MissingImage)
}

/// Read one field, counting its bytes against the whole request's budget.
async fn read_field(
    mut field: Field,
    received: &mut usize,
    limit: usize,
) -> Result<Vec<u8>, ApiError> {
    let mut data = Vec::new();
    while let Some(chunk) = field
        .try_next()
        .await
        .map_err(|err| ApiError::InvalidPayload(err.to_string()))?
    {
        *received += chunk.len();
        if *received > limit {
            return Err(ApiError::PayloadTooLarge { limit });
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

async fn read_body(mut payload: web::Payload, limit: usize) -> Result<Vec<u8>, ApiError> {
    let mut body = Vec::new();
    while let Some(chunk) = payload
        .try_next()
        .await
        .map_err(|err| ApiError::InvalidPayload(err.to_string()))?
    {
        if body.len() + chunk.len() > limit {
            return Err(ApiError::PayloadTooLarge { limit });
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// Any body without a string `image_base64` field counts as "no image".
pub(crate) fn source_from_json(body: &[u8]) -> Result<ImageSource, ApiError> {
    match serde_json::from_slice::<PredictRequest>(body) {
        Ok(PredictRequest {
            image_base64: Some(text),
        }) => Ok(ImageSource::Base64(text)),
        Ok(_) => Err(ApiError::MissingImage),
        Err(err) => {
            debug!("predict body is not a usable JSON object: {err}");
            Err(ApiError::MissingImage)
        }
    }
}

/// Standard base64, tolerating a `data:` URL prefix and embedded whitespace.
pub(crate) fn decode_base64(text: &str) -> Result<Vec<u8>, ApiError> {
    let text = text.trim();
    let encoded = match text.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => text,
    };
    let cleaned: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    STANDARD.decode(cleaned).map_err(ApiError::InvalidBase64)
}
