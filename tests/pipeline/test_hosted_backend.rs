// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Hosted backend against a local stand-in for the feature-extraction router

use axum::{
    http::{header, HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use clip_vectorizer::{
    backend::{EmbeddingBackend, HostedBackend, HostedConfig},
    vectorizer::Vectorizer,
    vision::{ImageFetcher, ImageNormalizer, NormalizedImage},
    VectorizeError,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::common::{gradient_image, png_base64, spawn_router, stub_contract, BODY_LIMIT};

const TOKEN: &str = "hf_test_token";

async fn feature_extraction(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some("Bearer hf_test_token");
    if !authorized {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Invalid credentials" })));
    }

    let image = body["inputs"]["image"].as_str().unwrap_or_default();
    if body["model"] != "openai/clip-vit-base-patch32" || !image.starts_with("data:image/png;base64,") {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "bad request" })));
    }

    // Router answers with a batch of one
    (StatusCode::OK, Json(json!([[0.25, -0.5, 0.75, 1.0]])))
}

async fn spawn_stub_router() -> String {
    let app = Router::new().route("/feature_extraction", post(feature_extraction));
    format!("{}/feature_extraction", spawn_router(app).await)
}

fn backend(router_url: String, token: Option<&str>) -> HostedBackend {
    HostedBackend::new(
        HostedConfig {
            router_url,
            token: token.map(str::to_string),
            timeout: Duration::from_secs(5),
            ..HostedConfig::default()
        },
        stub_contract(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_hosted_embedding_is_flattened() {
    let backend = backend(spawn_stub_router().await, Some(TOKEN));
    backend.ensure_ready().await.unwrap();

    let image = NormalizedImage::from_image(&gradient_image(500, 300));
    let embedding = backend.embed(&image).await.unwrap();

    assert_eq!(embedding, vec![0.25, -0.5, 0.75, 1.0]);
}

#[tokio::test]
async fn test_rejected_token_is_inference_error() {
    let backend = backend(spawn_stub_router().await, Some("hf_wrong"));

    let image = NormalizedImage::from_image(&gradient_image(64, 64));
    let err = backend.embed(&image).await.unwrap_err();

    assert!(matches!(err, VectorizeError::Inference(ref m) if m.contains("401") && m.contains("Invalid credentials")));
}

#[tokio::test]
async fn test_hosted_backend_through_vectorizer() {
    let hosted = Arc::new(backend(spawn_stub_router().await, Some(TOKEN)));
    let fetcher = ImageFetcher::new(Duration::from_secs(5), BODY_LIMIT).unwrap();
    let vectorizer = Vectorizer::new(hosted, ImageNormalizer::new(fetcher), Duration::from_secs(10));

    let embedding = vectorizer
        .vectorize_fields(None, Some(&png_base64(800, 600)))
        .await
        .unwrap();

    assert_eq!(embedding.len(), 4);
    assert!(!vectorizer.is_busy());
}

#[tokio::test]
async fn test_missing_token_fails_before_any_request() {
    let hosted = Arc::new(backend("http://127.0.0.1:9/feature_extraction".to_string(), None));
    let fetcher = ImageFetcher::new(Duration::from_secs(5), BODY_LIMIT).unwrap();
    let vectorizer = Vectorizer::new(hosted, ImageNormalizer::new(fetcher), Duration::from_secs(10));

    let err = vectorizer
        .vectorize_fields(None, Some(&png_base64(16, 16)))
        .await
        .unwrap_err();

    assert!(matches!(err, VectorizeError::ModelLoad(_)));
    assert_eq!(err.status_code(), 500);
}
