// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::rejection::JsonRejection,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::VectorizeError;

/// Seconds a busy client is told to wait before retrying
pub const BUSY_RETRY_AFTER_SECS: u64 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
    pub error_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

/// Error half of every handler result
#[derive(Debug, Clone)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    pub fn from_vectorize(error: &VectorizeError, request_id: Option<String>) -> Self {
        let status =
            StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let retry_after = matches!(error, VectorizeError::Busy).then_some(BUSY_RETRY_AFTER_SECS);

        Self {
            status,
            body: ErrorResponse {
                error: error.to_string(),
                error_type: error.error_type().to_string(),
                request_id,
                retry_after,
            },
        }
    }

    /// Body that could not be read as a request. Oversized bodies keep 413,
    /// every other rejection is a plain 400.
    pub fn from_rejection(rejection: &JsonRejection, request_id: Option<String>) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return Self {
                status: StatusCode::PAYLOAD_TOO_LARGE,
                body: ErrorResponse {
                    error: rejection.body_text(),
                    error_type: "payload_too_large".to_string(),
                    request_id,
                    retry_after: None,
                },
            };
        }

        let error = VectorizeError::InvalidInput(format!(
            "Request body must be JSON with image_url or image_base64: {}",
            rejection.body_text()
        ));
        Self::from_vectorize(&error, request_id)
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &ErrorResponse {
        &self.body
    }
}

impl From<VectorizeError> for ApiError {
    fn from(error: VectorizeError) -> Self {
        Self::from_vectorize(&error, None)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let retry_after = self.body.retry_after;
        let mut response = (self.status, Json(self.body)).into_response();

        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
