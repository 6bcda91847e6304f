//! Actix Web server exposing health, prediction, class listing, and metrics.
//!
//! Model inference is synchronous and CPU bound, so each prediction runs on the
//! blocking pool via `web::block` and never stalls the async workers.

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, middleware, web};
use anyhow::{Context, Result, anyhow};
use tracing::{error, info, warn};

use crate::api::{
    config::ServeConfig,
    data::{ClassesResponse, HealthResponse, PredictionResponse},
    error::ApiError,
    intake::read_image_source,
    models::Models,
    pipeline, telemetry,
};

/// Shared state backing HTTP handlers.
pub(crate) struct ServerState {
    pub(crate) models: Arc<Models>,
    pub(crate) max_payload_bytes: usize,
}

/// Register every route on an app or test service.
pub(crate) fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(health_handler))
            .route("/predict", web::post().to(predict_handler))
            .route("/classes", web::get().to(classes_handler)),
    )
    .route("/metrics", web::get().to(metrics_handler));
}

/// Load the models, bind the listener, and serve until shutdown.
pub(crate) fn run(config: ServeConfig) -> Result<()> {
    telemetry::init_metrics_recorder()?;
    let models = Arc::new(Models::load(&config.models)?);

    let ServeConfig {
        host,
        port,
        workers,
        max_payload_bytes,
        ..
    } = config;
    info!(%host, port, max_payload_bytes, "starting body language API");

    actix_web::rt::System::new().block_on(async move {
        let mut server = HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(ServerState {
                    models: Arc::clone(&models),
                    max_payload_bytes,
                }))
                .wrap(Cors::permissive())
                .wrap(middleware::Logger::default())
                .configure(configure)
        });
        if let Some(workers) = workers {
            server = server.workers(workers);
        }
        server
            .bind((host.as_str(), port))
            .with_context(|| format!("Failed to bind {host}:{port}"))?
            .run()
            .await
            .context("HTTP server error")
    })
}

async fn health_handler() -> HttpResponse {
    record_request("health", "ok");
    HttpResponse::Ok().json(HealthResponse::online())
}

async fn predict_handler(
    req: HttpRequest,
    payload: web::Payload,
    state: web::Data<ServerState>,
) -> Result<HttpResponse, ApiError> {
    match predict(&req, payload, &state).await {
        Ok(response) => {
            record_request("predict", "ok");
            metrics::counter!(
                "body_language_predictions_total",
                "class" => response.prediction.clone()
            )
            .increment(1);
            Ok(HttpResponse::Ok().json(response))
        }
        Err(err) => {
            record_request("predict", err.outcome());
            match &err {
                ApiError::MissingImage
                | ApiError::NoLandmarks
                | ApiError::InvalidPayload(_)
                | ApiError::PayloadTooLarge { .. } => warn!("prediction rejected: {err}"),
                _ => error!("prediction failed: {err}"),
            }
            Err(err)
        }
    }
}

async fn predict(
    req: &HttpRequest,
    payload: web::Payload,
    state: &ServerState,
) -> Result<PredictionResponse, ApiError> {
    let source = read_image_source(req, payload, state.max_payload_bytes).await?;
    let models = Arc::clone(&state.models);
    let response = web::block(move || {
        pipeline::predict(&models, source)
            .map(|result| PredictionResponse::new(&result, models.classifier.classes()))
    })
    .await
    .map_err(|err| ApiError::Image(anyhow!("inference task failed: {err}")))??;
    Ok(response)
}

async fn classes_handler(state: web::Data<ServerState>) -> Result<HttpResponse, ApiError> {
    let labels = state.models.classifier.classes().labels();
    if labels.is_empty() {
        record_request("classes", "classes_error");
        return Err(ApiError::Classes("no classes loaded".into()));
    }
    record_request("classes", "ok");
    Ok(HttpResponse::Ok().json(ClassesResponse::new(labels)))
}

async fn metrics_handler() -> HttpResponse {
    match telemetry::prometheus_handle() {
        Some(handle) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(handle.render()),
        None => HttpResponse::NoContent().finish(),
    }
}

fn record_request(route: &'static str, outcome: &'static str) {
    metrics::counter!(
        "body_language_requests_total",
        "route" => route,
        "outcome" => outcome
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use actix_web::{
        http::{StatusCode, header},
        test,
    };
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde_json::{Value, json};

    use super::*;
    use crate::api::testing::{FakeExtractor, encode_png, models, models_with_input_len};

    const BOUNDARY: &str = "body-language-boundary";

    fn state_with(models: Models, max_payload_bytes: usize) -> web::Data<ServerState> {
        web::Data::new(ServerState {
            models: Arc::new(models),
            max_payload_bytes,
        })
    }

    fn state() -> web::Data<ServerState> {
        state_with(models(), 1024 * 1024)
    }

    macro_rules! service {
        ($state:expr) => {
            test::init_service(App::new().app_data($state).configure(configure)).await
        };
    }

    fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, filename, data) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match filename {
                Some(filename) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn multipart_request(body: Vec<u8>) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/api/predict")
            .insert_header((
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ))
            .set_payload(body)
    }

    fn assert_success(body: &Value) {
        assert_eq!(body["status"], "success");
        assert_eq!(body["prediction"], "Sad");
        let probabilities = body["class_probabilities"].as_object().unwrap();
        let keys: Vec<&str> = probabilities.keys().map(String::as_str).collect();
        assert_eq!(keys, ["Happy", "Sad", "Victorious"]);
        let total: f64 = probabilities.values().map(|v| v.as_f64().unwrap()).sum();
        assert!((total - 100.0).abs() <= 0.02, "sum was {total}");
        let max = probabilities
            .values()
            .map(|v| v.as_f64().unwrap())
            .fold(f64::MIN, f64::max);
        assert_eq!(body["confidence"].as_f64().unwrap(), max);
    }

    #[actix_web::test]
    async fn health_reports_online() {
        let app = service!(state());
        let resp = test::call_service(&app, test::TestRequest::get().uri("/api/health").to_request())
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(
            body,
            json!({"status": "online", "message": "Body Language API is running"})
        );
    }

    #[actix_web::test]
    async fn classes_are_stable_across_calls() {
        let app = service!(state());
        let mut seen = Vec::new();
        for _ in 0..3 {
            let req = test::TestRequest::get().uri("/api/classes").to_request();
            let body: Value = test::call_and_read_body_json(&app, req).await;
            seen.push(body);
        }
        assert_eq!(
            seen[0],
            json!({"status": "success", "classes": ["Happy", "Sad", "Victorious"]})
        );
        assert!(seen.iter().all(|body| body == &seen[0]));
    }

    #[actix_web::test]
    async fn predicts_from_json_base64() {
        let app = service!(state());
        let encoded = STANDARD.encode(encode_png(FakeExtractor::FULL));
        let req = test::TestRequest::post()
            .uri("/api/predict")
            .set_json(json!({ "image_base64": encoded }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_success(&body);
        assert_eq!(body["confidence"].as_f64().unwrap(), 65.43);
    }

    #[actix_web::test]
    async fn predicts_from_multipart_upload() {
        let app = service!(state());
        let png = encode_png(FakeExtractor::FULL);
        let body = multipart_body(&[("image", Some("person.png"), &png[..])]);
        let resp = test::call_service(&app, multipart_request(body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_success(&body);
    }

    #[actix_web::test]
    async fn multipart_file_wins_over_base64_field() {
        let app = service!(state());
        let png = encode_png(FakeExtractor::FULL);
        let body = multipart_body(&[
            ("image_base64", None, &b"@@not base64@@"[..]),
            ("image", Some("person.png"), &png[..]),
        ]);
        let resp = test::call_service(&app, multipart_request(body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn missing_image_is_a_bad_request() {
        let app = service!(state());
        let requests = vec![
            test::TestRequest::post()
                .uri("/api/predict")
                .set_json(json!({})),
            test::TestRequest::post()
                .uri("/api/predict")
                .set_json(json!({"foo": 1})),
            test::TestRequest::post().uri("/api/predict"),
            multipart_request(multipart_body(&[("other", None, &b"x"[..])])),
        ];
        for req in requests {
            let resp = test::call_service(&app, req.to_request()).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            let body: Value = test::read_body_json(resp).await;
            assert_eq!(body["status"], "error");
            assert_eq!(
                body["message"],
                "No image provided. Please upload an image file or provide a base64 encoded image."
            );
        }
    }

    #[actix_web::test]
    async fn incomplete_detection_is_a_bad_request() {
        let app = service!(state());
        for shade in [FakeExtractor::NOTHING, FakeExtractor::POSE_ONLY] {
            let encoded = STANDARD.encode(encode_png(shade));
            let req = test::TestRequest::post()
                .uri("/api/predict")
                .set_json(json!({ "image_base64": encoded }))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            let body: Value = test::read_body_json(resp).await;
            assert_eq!(
                body["message"],
                "No body landmarks detected in the image. Please use a clearer image with a person visible."
            );
        }
    }

    #[actix_web::test]
    async fn undecodable_images_are_server_errors() {
        let app = service!(state());
        let payloads = [
            json!({"image_base64": "@@not base64@@"}),
            json!({"image_base64": STANDARD.encode(b"plain text, not pixels")}),
        ];
        for payload in payloads {
            let req = test::TestRequest::post()
                .uri("/api/predict")
                .set_json(payload)
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
            let body: Value = test::read_body_json(resp).await;
            assert_eq!(body["status"], "error");
            assert!(
                body["message"]
                    .as_str()
                    .unwrap()
                    .starts_with("Error processing image: ")
            );
        }
    }

    #[actix_web::test]
    async fn oversized_payloads_are_rejected() {
        let app = service!(state_with(models(), 64));
        let req = test::TestRequest::post()
            .uri("/api/predict")
            .set_json(json!({"image_base64": "A".repeat(256)}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[actix_web::test]
    async fn feature_length_mismatch_is_a_landmark_error() {
        let app = service!(state_with(models_with_input_len(132), 1024 * 1024));
        let encoded = STANDARD.encode(encode_png(FakeExtractor::FULL));
        let req = test::TestRequest::post()
            .uri("/api/predict")
            .set_json(json!({ "image_base64": encoded }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert!(
            body["message"]
                .as_str()
                .unwrap()
                .starts_with("Error processing landmarks: ")
        );
    }

    #[actix_web::test]
    async fn multipart_base64_field_is_used_without_a_file() {
        let app = service!(state());
        let encoded = STANDARD.encode(encode_png(FakeExtractor::FULL));
        let body = multipart_body(&[("image_base64", None, encoded.as_bytes())]);
        let resp = test::call_service(&app, multipart_request(body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_success(&body);
    }

    #[actix_web::test]
    async fn multipart_image_must_be_a_file_part() {
        let app = service!(state());
        let png = encode_png(FakeExtractor::FULL);
        let body = multipart_body(&[("image", None, &png[..])]);
        let resp = test::call_service(&app, multipart_request(body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(
            body["message"],
            "No image provided. Please upload an image file or provide a base64 encoded image."
        );
    }

    #[actix_web::test]
    async fn multipart_fields_share_one_payload_budget() {
        let app = service!(state_with(models(), 200));
        let filler = [b'x'; 150];
        let body = multipart_body(&[
            ("note1", None, &filler[..]),
            ("note2", None, &filler[..]),
            ("note3", None, &filler[..]),
            ("image_base64", None, &b"aGVsbG8="[..]),
        ]);
        let resp = test::call_service(&app, multipart_request(body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "error");
    }

    #[actix_web::test]
    async fn oversized_multipart_file_is_rejected() {
        let app = service!(state_with(models(), 32));
        let png = encode_png(FakeExtractor::FULL);
        assert!(png.len() > 32);
        let body = multipart_body(&[("image", Some("person.png"), &png[..])]);
        let resp = test::call_service(&app, multipart_request(body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[actix_web::test]
    async fn metrics_are_empty_without_a_recorder() {
        let app = service!(state());
        let req = test::TestRequest::get().uri("/metrics").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }
}
