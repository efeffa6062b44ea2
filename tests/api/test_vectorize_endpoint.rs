// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! POST /vectorize tests
//!
//! Drive the real router with a stub model behind the local backend:
//! - URL and base64 inputs end to end
//! - 400 for missing, conflicting or malformed input
//! - 429 for overlapping requests, slot freed afterwards
//! - 500 for fetch and decode failures, 504 for timeouts

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::common::{png_base64, spawn_image_server, Gate, TestApp, STUB_EMBEDDING};

#[tokio::test]
async fn test_vectorize_remote_url_end_to_end() {
    let app = TestApp::new();
    let base = spawn_image_server().await;

    let (status, body) = app
        .post_json("/vectorize", json!({ "image_url": format!("{}/wide.png", base) }))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "embedding": [0.1, 0.2, 0.3, 0.4] }));
    assert_eq!(app.loader.loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_vectorize_jpeg_url() {
    let app = TestApp::new();
    let base = spawn_image_server().await;

    let (status, body) = app
        .post_json("/vectorize", json!({ "image_url": format!("{}/photo.jpg", base) }))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["embedding"].as_array().unwrap().len(), STUB_EMBEDDING.len());
}

#[tokio::test]
async fn test_vectorize_base64_with_and_without_prefix() {
    let app = TestApp::new();
    let raw = png_base64(320, 200);

    let (plain_status, plain) = app
        .post_json("/vectorize", json!({ "image_base64": raw }))
        .await;
    let (prefixed_status, prefixed) = app
        .post_json(
            "/vectorize",
            json!({ "image_base64": format!("data:image/png;base64,{}", raw) }),
        )
        .await;

    assert_eq!(plain_status, StatusCode::OK);
    assert_eq!(prefixed_status, StatusCode::OK);
    assert_eq!(plain, prefixed);
}

#[tokio::test]
async fn test_model_loaded_once_across_requests() {
    let app = TestApp::new();

    for _ in 0..3 {
        let (status, _) = app
            .post_json("/vectorize", json!({ "image_base64": png_base64(50, 50) }))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    assert_eq!(app.loader.loads.load(Ordering::SeqCst), 1);
    assert_eq!(app.manager.load_attempts(), 1);
    // Probe plus three requests
    assert_eq!(app.model.forwards.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_empty_body_object_is_bad_request() {
    let app = TestApp::new();

    let (status, body) = app.post_json("/vectorize", json!({})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], "invalid_input");
    assert!(body["error"].as_str().unwrap().contains("No image provided"));
    assert!(body["request_id"].is_string());
    // Rejected before the model is touched
    assert_eq!(app.loader.loads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_both_fields_is_bad_request() {
    let app = TestApp::new();

    let (status, body) = app
        .post_json(
            "/vectorize",
            json!({ "image_url": "https://example.com/a.png", "image_base64": png_base64(4, 4) }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], "invalid_input");
}

#[tokio::test]
async fn test_malformed_url_is_bad_request() {
    let app = TestApp::new();

    for url in ["not a url", "ftp://example.com/a.png", "file:///etc/passwd"] {
        let (status, _) = app.post_json("/vectorize", json!({ "image_url": url })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "url {:?}", url);
    }
}

#[tokio::test]
async fn test_non_json_body_is_bad_request() {
    let app = TestApp::new();

    let request = Request::post("/vectorize")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], "invalid_input");
}

#[tokio::test]
async fn test_unreachable_image_is_server_error() {
    let app = TestApp::new();
    let base = spawn_image_server().await;

    let (status, body) = app
        .post_json("/vectorize", json!({ "image_url": format!("{}/missing.png", base) }))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error_type"], "fetch_error");
    assert!(!app.vectorizer.is_busy());
}

#[tokio::test]
async fn test_non_image_payload_is_server_error() {
    let app = TestApp::new();
    let base = spawn_image_server().await;

    let (status, body) = app
        .post_json("/vectorize", json!({ "image_url": format!("{}/text", base) }))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error_type"], "decode_error");
    assert!(!app.vectorizer.is_busy());
}

#[tokio::test]
async fn test_overlapping_requests_one_rejected_with_429() {
    let gate = Arc::new(Gate::default());
    let app = TestApp::with_gate(gate.clone());
    let body = json!({ "image_base64": png_base64(64, 64) });

    let first = app.post_json("/vectorize", body.clone());
    let second = async {
        // Wait until the first request is inside the model load
        gate.entered.notified().await;
        let result = app.post_json("/vectorize", body.clone()).await;
        gate.release.notify_one();
        result
    };

    let ((first_status, first_body), (second_status, second_body)) = tokio::join!(first, second);

    assert_eq!(first_status, StatusCode::OK);
    assert_eq!(first_body["embedding"].as_array().unwrap().len(), 4);
    assert_eq!(second_status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(second_body["error_type"], "busy");
    assert_eq!(second_body["retry_after"], 1);

    // Slot is free again
    let (status, _) = app.post_json("/vectorize", body).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_busy_response_has_retry_after_header() {
    let app = TestApp::new();
    let _held = app.vectorizer.admission().try_acquire().unwrap();

    let request = Request::post("/vectorize")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "image_base64": png_base64(8, 8) }).to_string()))
        .unwrap();
    let response = tower::ServiceExt::oneshot(app.router.clone(), request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()[header::RETRY_AFTER], "1");
}

#[tokio::test]
async fn test_inference_failure_releases_slot() {
    let app = TestApp::new();
    let body = json!({ "image_base64": png_base64(32, 32) });

    // Load succeeds, then every forward pass fails
    app.manager.ensure_loaded().await.unwrap();
    app.model.fail.store(true, Ordering::SeqCst);

    let (status, error) = app.post_json("/vectorize", body.clone()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error["error_type"], "inference_error");
    assert!(!app.vectorizer.is_busy());

    app.model.fail.store(false, Ordering::SeqCst);
    let (status, _) = app.post_json("/vectorize", body).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_timeout_returns_504_and_recovers() {
    let app = TestApp::with_timeout(Duration::from_millis(300));
    let body = json!({ "image_base64": png_base64(32, 32) });

    app.manager.ensure_loaded().await.unwrap();
    app.model.slow.store(true, Ordering::SeqCst);

    let (status, error) = app.post_json("/vectorize", body.clone()).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(error["error_type"], "inference_timeout");
    assert!(!app.vectorizer.is_busy());

    app.model.slow.store(false, Ordering::SeqCst);
    let (status, _) = app.post_json("/vectorize", body).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let app = TestApp::new();
    let huge = "A".repeat(crate::common::BODY_LIMIT + 1024);

    let (status, body) = app
        .post_json("/vectorize", json!({ "image_base64": huge }))
        .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error_type"], "payload_too_large");
}
