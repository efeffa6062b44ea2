// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! GET /, /health and /test-hf

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

use crate::common::{png_base64, spawn_image_server, TestApp};

#[tokio::test]
async fn test_root_is_static_html() {
    let app = TestApp::new();

    let response = app
        .router
        .clone()
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains("<h1>"));
}

#[tokio::test]
async fn test_health_reports_lazy_model() {
    let app = TestApp::new();

    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["backend"], "local");
    assert_eq!(body["model_loaded"], false);
    assert_eq!(body["busy"], false);
    assert!(body["version"].is_string());

    let (status, _) = app
        .post_json("/vectorize", json!({ "image_base64": png_base64(16, 16) }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get("/health").await;
    assert_eq!(body["model_loaded"], true);
}

#[tokio::test]
async fn test_health_shows_busy_slot() {
    let app = TestApp::new();
    let held = app.vectorizer.admission().try_acquire().unwrap();

    let (_, body) = app.get("/health").await;
    assert_eq!(body["busy"], true);

    held.release();
    let (_, body) = app.get("/health").await;
    assert_eq!(body["busy"], false);
}

#[tokio::test]
async fn test_self_test_runs_full_pipeline() {
    let base = spawn_image_server().await;
    let app = TestApp::with_test_image(&format!("{}/wide.png", base));

    let (status, body) = app.get("/test-hf").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["dimensions"], 4);
    assert_eq!(body["preview"], json!([0.1, 0.2, 0.3, 0.4]));
}

#[tokio::test]
async fn test_self_test_reports_fetch_error() {
    let base = spawn_image_server().await;
    let app = TestApp::with_test_image(&format!("{}/gone.jpg", base));

    let (status, body) = app.get("/test-hf").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error_type"], "fetch_error");
}
