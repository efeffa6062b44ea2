// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Liveness, health and end-to-end self test

use axum::{extract::State, response::Html, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, Instrument};

use super::errors::ApiError;
use super::http_server::AppState;
use super::new_request_id;
use crate::backend::BackendKind;
use crate::version::VERSION_NUMBER;
use crate::vision::ImageSource;

/// Number of leading values echoed by GET /test-hf
pub const PREVIEW_LEN: usize = 8;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub backend: BackendKind,
    /// Model loaded (local) or page live (browser)
    pub model_loaded: bool,
    pub busy: bool,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestHfResponse {
    pub status: String,
    pub dimensions: usize,
    pub preview: Vec<f32>,
}

/// GET / - static liveness page
pub async fn root_handler() -> Html<&'static str> {
    Html("<h1>CLIP vectorizer is running</h1>")
}

/// GET /health - never touches the model or the slot
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let vectorizer = &state.vectorizer;
    Json(HealthResponse {
        status: "ok".to_string(),
        backend: vectorizer.backend_kind(),
        model_loaded: vectorizer.backend_ready(),
        busy: vectorizer.is_busy(),
        version: VERSION_NUMBER.to_string(),
    })
}

/// GET /test-hf - run the full pipeline on the configured test image
///
/// Goes through admission like any other request, so it can return 429.
pub async fn test_hf_handler(State(state): State<AppState>) -> Result<Json<TestHfResponse>, ApiError> {
    let request_id = new_request_id();
    let span = info_span!("test_hf", request_id = %request_id);

    async move {
        info!("Self test against {}", state.test_image_url);

        let source = ImageSource::from_url(&state.test_image_url)
            .map_err(|e| ApiError::from_vectorize(&e, Some(request_id.clone())))?;
        let embedding = state
            .vectorizer
            .vectorize(&source)
            .await
            .map_err(|e| ApiError::from_vectorize(&e, Some(request_id.clone())))?;

        Ok(Json(TestHfResponse {
            status: "ok".to_string(),
            dimensions: embedding.len(),
            preview: embedding.iter().take(PREVIEW_LEN).copied().collect(),
        }))
    }
    .instrument(span)
    .await
}
