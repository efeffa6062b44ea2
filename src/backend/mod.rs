// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Embedding backends
//!
//! The orchestrator only talks to `EmbeddingBackend`. Which implementation sits
//! behind it is decided once at startup from configuration.

pub mod browser;
pub mod hosted;
pub mod local;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::embeddings::Embedding;
use crate::errors::VectorizeError;
use crate::vision::NormalizedImage;

pub use browser::{BrowserBackend, BrowserConfig};
pub use hosted::{HostedBackend, HostedConfig};
pub use local::LocalBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process ONNX model
    Local,
    /// Headless browser page running the extraction script
    Browser,
    /// Hosted feature-extraction API
    Hosted,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Browser => write!(f, "browser"),
            Self::Hosted => write!(f, "hosted"),
        }
    }
}

/// Something that turns a normalized image into an embedding
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Whether the expensive resource (model, page) is already initialised
    fn is_ready(&self) -> bool;

    /// Initialise the backend if needed. Cheap once ready.
    async fn ensure_ready(&self) -> Result<(), VectorizeError>;

    async fn embed(&self, image: &NormalizedImage) -> Result<Embedding, VectorizeError>;
}
