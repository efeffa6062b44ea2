// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error taxonomy of the vectorize pipeline

use std::time::Duration;
use thiserror::Error;

use crate::vision::ImageError;

/// Every way a vectorize request can fail
///
/// Client faults map to 4xx, everything else to 5xx. `Busy` and
/// `InferenceTimeout` are retryable by the caller.
#[derive(Debug, Error)]
pub enum VectorizeError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Server busy, try again in a moment")]
    Busy,

    #[error("Failed to fetch image: {0}")]
    Fetch(String),

    #[error(transparent)]
    Decode(#[from] ImageError),

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Inference timed out after {0:?}")]
    InferenceTimeout(Duration),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl VectorizeError {
    /// Wrap an `anyhow` chain from model initialisation
    pub fn model_load(err: anyhow::Error) -> Self {
        Self::ModelLoad(format!("{:#}", err))
    }

    /// Wrap an `anyhow` chain from a forward pass
    pub fn inference(err: anyhow::Error) -> Self {
        Self::Inference(format!("{:#}", err))
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) => 400,
            Self::Busy => 429,
            Self::InferenceTimeout(_) => 504,
            Self::Fetch(_)
            | Self::Decode(_)
            | Self::ModelLoad(_)
            | Self::Inference(_)
            | Self::Internal(_) => 500,
        }
    }

    /// Stable machine-readable tag for error bodies
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::Busy => "busy",
            Self::Fetch(_) => "fetch_error",
            Self::Decode(_) => "decode_error",
            Self::ModelLoad(_) => "model_load_error",
            Self::Inference(_) => "inference_error",
            Self::InferenceTimeout(_) => "inference_timeout",
            Self::Internal(_) => "internal_error",
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy | Self::InferenceTimeout(_))
    }
}
