// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Resolving the model file on disk
//!
//! Either an explicit local path, or a file inside a Hugging Face Hub repo that
//! is downloaded on first use and served from the hub cache afterwards.

use anyhow::{Context, Result};
use hf_hub::api::tokio::ApiBuilder;
use std::path::PathBuf;
use tracing::info;

/// Default repo holding the ONNX exports of CLIP ViT-B/32
pub const DEFAULT_MODEL_REPO: &str = "Xenova/clip-vit-base-patch32";

/// Quantized vision tower inside the default repo
pub const DEFAULT_MODEL_FILE: &str = "onnx/vision_model_quantized.onnx";

#[derive(Debug, Clone, PartialEq)]
pub enum ModelSource {
    /// Pre-provisioned file, never downloaded
    Local(PathBuf),
    /// File inside a hub repo
    Hub {
        repo: String,
        file: String,
        cache_dir: Option<PathBuf>,
        token: Option<String>,
    },
}

impl ModelSource {
    pub fn hub(repo: impl Into<String>, file: impl Into<String>) -> Self {
        Self::Hub {
            repo: repo.into(),
            file: file.into(),
            cache_dir: None,
            token: None,
        }
    }

    /// Human readable label for logs
    pub fn label(&self) -> String {
        match self {
            Self::Local(path) => path.display().to_string(),
            Self::Hub { repo, file, .. } => format!("{}/{}", repo, file),
        }
    }

    /// Return a local path to the model file, downloading it if needed
    pub async fn resolve(&self) -> Result<PathBuf> {
        match self {
            Self::Local(path) => {
                if !path.exists() {
                    anyhow::bail!("Model file not found: {}", path.display());
                }
                Ok(path.clone())
            }
            Self::Hub {
                repo,
                file,
                cache_dir,
                token,
            } => {
                let mut builder = ApiBuilder::new().with_progress(false);
                if let Some(dir) = cache_dir {
                    builder = builder.with_cache_dir(dir.clone());
                }
                if token.is_some() {
                    builder = builder.with_token(token.clone());
                }
                let api = builder
                    .build()
                    .context("Failed to initialise Hugging Face Hub client")?;

                info!("Fetching {}/{} (cached after first download)", repo, file);
                let path = api
                    .model(repo.clone())
                    .get(file)
                    .await
                    .with_context(|| format!("Failed to download {} from {}", file, repo))?;

                Ok(path)
            }
        }
    }
}
