// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vectorize endpoint handler

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use tracing::{info, info_span, warn, Instrument};

use super::request::VectorizeRequest;
use super::response::VectorizeResponse;
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::api::new_request_id;

/// POST /vectorize - Turn one image into an embedding
///
/// # Request Body
/// ```json
/// { "image_url": "https://..." }
/// ```
/// or
/// ```json
/// { "image_base64": "data:image/jpeg;base64,/9j/4AAQ..." }
/// ```
///
/// # Response Body
/// ```json
/// { "embedding": [0.0123, -0.0456, ...] }
/// ```
///
/// Overlapping requests get 429 with `Retry-After`; there is no queue.
pub async fn vectorize_handler(
    State(state): State<AppState>,
    payload: Result<Json<VectorizeRequest>, JsonRejection>,
) -> Result<Json<VectorizeResponse>, ApiError> {
    let request_id = new_request_id();
    let span = info_span!("vectorize", request_id = %request_id);

    async move {
        let Json(request) = payload.map_err(|rejection| {
            warn!("Unreadable request body: {}", rejection.body_text());
            ApiError::from_rejection(&rejection, Some(request_id.clone()))
        })?;

        info!(
            "Vectorize request (url: {}, base64: {})",
            request.image_url.is_some(),
            request.image_base64.is_some()
        );

        let embedding = state
            .vectorizer
            .vectorize_fields(request.image_url.as_deref(), request.image_base64.as_deref())
            .await
            .map_err(|e| ApiError::from_vectorize(&e, Some(request_id.clone())))?;

        Ok(Json(VectorizeResponse { embedding }))
    }
    .instrument(span)
    .await
}
