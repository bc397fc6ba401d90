//! End-to-end tests for `POST /process_image`
//!
//! Requests are driven through the router in-process with `oneshot`, so no
//! socket is bound.

mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use common::{encode, gradient_image, noise_image, FormBuilder};
use image::{GenericImageView, ImageFormat};
use resizer_server::{
    router, AppState, ImageProcessor, MockBackend, ProcessorConfig, PROCESS_IMAGE_PATH,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

const LIMIT: usize = 8 * 1024 * 1024;

fn app() -> Router {
    let processor = ImageProcessor::new(ProcessorConfig::default()).expect("processor");
    router(AppState::new(Arc::new(processor), LIMIT))
}

fn app_with_mock_model() -> Router {
    let processor = ImageProcessor::with_backend(ProcessorConfig::default(), MockBackend::with_size(64))
        .expect("processor with mock backend");
    router(AppState::new(Arc::new(processor), LIMIT))
}

fn post(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(PROCESS_IMAGE_PATH)
        .header(header::CONTENT_TYPE, FormBuilder::content_type())
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, String, Vec<u8>) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, content_type, body.to_vec())
}

fn error_message(body: &[u8]) -> String {
    let json: Value = serde_json::from_slice(body).expect("error body is JSON");
    json["error"].as_str().expect("error field").to_string()
}

fn png_upload() -> Vec<u8> {
    encode(&gradient_image(120, 90), ImageFormat::Png)
}

#[tokio::test]
async fn test_resize_jpeg_to_exact_dimensions() {
    let input = encode(&gradient_image(1000, 1000), ImageFormat::Jpeg);
    let body = FormBuilder::new()
        .file("image", "photo.jpg", "image/jpeg", &input)
        .text("width", "800")
        .text("height", "600")
        .text("format", "jpeg")
        .build();

    let (status, content_type, bytes) = send(app(), post(body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type, "image/jpeg");
    let output = image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg).unwrap();
    assert_eq!(output.dimensions(), (800, 600));
}

#[tokio::test]
async fn test_size_budget_is_respected() {
    let input = encode(&gradient_image(1000, 1000), ImageFormat::Jpeg);
    let body = FormBuilder::new()
        .file("image", "photo.jpg", "image/jpeg", &input)
        .text("width", "800")
        .text("height", "600")
        .text("format", "jpeg")
        .text("size_kb", "50")
        .build();

    let (status, _, bytes) = send(app(), post(body)).await;

    assert_eq!(status, StatusCode::OK);
    assert!(bytes.len() <= 50 * 1024, "got {} bytes", bytes.len());
}

#[tokio::test]
async fn test_each_output_format_has_matching_mime_type() {
    let cases = [
        ("png", "image/png", ImageFormat::Png),
        ("bmp", "image/bmp", ImageFormat::Bmp),
        ("tiff", "image/tiff", ImageFormat::Tiff),
        ("jpg", "image/jpeg", ImageFormat::Jpeg),
    ];

    for (format, mime, image_format) in cases {
        let body = FormBuilder::new()
            .file("image", "in.png", "image/png", &png_upload())
            .text("width", "33")
            .text("height", "17")
            .text("format", format)
            .build();

        let (status, content_type, bytes) = send(app(), post(body)).await;

        assert_eq!(status, StatusCode::OK, "format {format}");
        assert_eq!(content_type, mime);
        let output = image::load_from_memory_with_format(&bytes, image_format).unwrap();
        assert_eq!(output.dimensions(), (33, 17));
    }
}

#[cfg(feature = "webp-support")]
#[tokio::test]
async fn test_webp_output() {
    let body = FormBuilder::new()
        .file("image", "in.png", "image/png", &png_upload())
        .text("width", "64")
        .text("height", "48")
        .text("format", "webp")
        .text("size_kb", "20")
        .build();

    let (status, content_type, bytes) = send(app(), post(body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type, "image/webp");
    assert_eq!(&bytes[..4], b"RIFF");
    assert_eq!(&bytes[8..12], b"WEBP");
}

#[tokio::test]
async fn test_remove_bg_produces_transparent_png() {
    let body = FormBuilder::new()
        .file("image", "in.png", "image/png", &png_upload())
        .text("width", "60")
        .text("height", "60")
        .text("format", "png")
        .text("remove_bg", "true")
        .build();

    let (status, content_type, bytes) = send(app_with_mock_model(), post(body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type, "image/png");
    let output = image::load_from_memory_with_format(&bytes, ImageFormat::Png)
        .unwrap()
        .to_rgba8();
    assert_eq!(output.dimensions(), (60, 60));
    assert!(output.pixels().any(|p| p[3] < 255), "expected transparent pixels");
    assert!(output.get_pixel(30, 30)[3] > 0, "center should stay visible");
}

#[tokio::test]
async fn test_remove_bg_other_than_true_is_ignored() {
    let body = FormBuilder::new()
        .file("image", "in.png", "image/png", &png_upload())
        .text("width", "20")
        .text("height", "20")
        .text("format", "png")
        .text("remove_bg", "yes")
        .build();

    // No model is loaded, so a truthy flag would be a 503
    let (status, _, _) = send(app(), post(body)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_remove_bg_without_model_is_unavailable() {
    let body = FormBuilder::new()
        .file("image", "in.png", "image/png", &png_upload())
        .text("width", "20")
        .text("height", "20")
        .text("format", "png")
        .text("remove_bg", "true")
        .build();

    let (status, content_type, bytes) = send(app(), post(body)).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(content_type, "application/json");
    assert!(error_message(&bytes).contains("Background removal"));
}

#[tokio::test]
async fn test_missing_image_is_rejected() {
    let body = FormBuilder::new()
        .text("width", "20")
        .text("height", "20")
        .text("format", "png")
        .build();

    let (status, _, bytes) = send(app(), post(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json, serde_json::json!({ "error": "No image file provided" }));
}

#[tokio::test]
async fn test_invalid_fields_are_client_errors() {
    let cases: [(&str, &str, &str); 5] = [
        ("abc", "20", "png"),
        ("0", "20", "png"),
        ("20", "-5", "png"),
        ("20", "20", "gif"),
        ("20", "20", ""),
    ];

    for (width, height, format) in cases {
        let body = FormBuilder::new()
            .file("image", "in.png", "image/png", &png_upload())
            .text("width", width)
            .text("height", height)
            .text("format", format)
            .build();

        let (status, _, bytes) = send(app(), post(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "case {width}x{height} {format}");
        assert!(!error_message(&bytes).is_empty());
    }
}

#[tokio::test]
async fn test_missing_width_is_rejected() {
    let body = FormBuilder::new()
        .file("image", "in.png", "image/png", &png_upload())
        .text("height", "20")
        .text("format", "png")
        .build();

    let (status, _, bytes) = send(app(), post(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error_message(&bytes).contains("width"));
}

#[tokio::test]
async fn test_undecodable_upload_is_rejected() {
    let body = FormBuilder::new()
        .file("image", "notes.txt", "text/plain", b"definitely not an image")
        .text("width", "20")
        .text("height", "20")
        .text("format", "png")
        .build();

    let (status, _, bytes) = send(app(), post(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error_message(&bytes).contains("decode"));
}

#[tokio::test]
async fn test_unreachable_budget_is_reported() {
    let input = encode(&noise_image(128, 128), ImageFormat::Png);
    let body = FormBuilder::new()
        .file("image", "noise.png", "image/png", &input)
        .text("width", "128")
        .text("height", "128")
        .text("format", "png")
        .text("size_kb", "1")
        .build();

    let (status, _, bytes) = send(app(), post(body)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(error_message(&bytes).contains("1024 bytes"));
}

#[tokio::test]
async fn test_non_positive_size_kb_is_unconstrained() {
    for size_kb in ["0", "-3", "lots"] {
        let body = FormBuilder::new()
            .file("image", "in.png", "image/png", &png_upload())
            .text("width", "40")
            .text("height", "40")
            .text("format", "bmp")
            .text("size_kb", size_kb)
            .build();

        let (status, _, bytes) = send(app(), post(body)).await;

        assert_eq!(status, StatusCode::OK, "size_kb={size_kb}");
        assert_eq!(&bytes[..2], b"BM");
    }
}

#[tokio::test]
async fn test_non_multipart_request_has_no_image() {
    let bodies = [
        ("application/x-www-form-urlencoded", "width=10&height=10&format=png"),
        ("multipart/form-data", "width=10"),
        ("application/json", "{}"),
    ];

    for (content_type, body) in bodies {
        let request = Request::builder()
            .method(Method::POST)
            .uri(PROCESS_IMAGE_PATH)
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap();

        let (status, _, bytes) = send(app(), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "content type {content_type}");
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json, serde_json::json!({ "error": "No image file provided" }));
    }
}

#[tokio::test]
async fn test_request_without_content_type_has_no_image() {
    let request = Request::builder()
        .method(Method::POST)
        .uri(PROCESS_IMAGE_PATH)
        .body(Body::empty())
        .unwrap();

    let (status, _, bytes) = send(app(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_message(&bytes), "No image file provided");
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let processor = ImageProcessor::new(ProcessorConfig::default()).unwrap();
    let app = router(AppState::new(Arc::new(processor), 4 * 1024));

    let input = encode(&noise_image(64, 64), ImageFormat::Png);
    assert!(input.len() > 4 * 1024);
    let body = FormBuilder::new()
        .file("image", "big.png", "image/png", &input)
        .text("width", "10")
        .text("height", "10")
        .text("format", "png")
        .build();

    let (status, _, bytes) = send(app, post(body)).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(error_message(&bytes).contains("4096"));
}

#[tokio::test]
async fn test_cors_preflight_allows_any_origin() {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri(PROCESS_IMAGE_PATH)
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();

    let response = app().oneshot(request).await.unwrap();

    assert!(response.status().is_success());
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

#[tokio::test]
async fn test_cors_headers_on_responses() {
    let body = FormBuilder::new()
        .file("image", "in.png", "image/png", &png_upload())
        .text("width", "10")
        .text("height", "10")
        .text("format", "png")
        .build();
    let mut request = post(body);
    request
        .headers_mut()
        .insert(header::ORIGIN, "http://example.com".parse().unwrap());

    let response = app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/resize")
        .body(Body::empty())
        .unwrap();

    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
