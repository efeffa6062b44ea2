// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Hosted feature-extraction backend (Hugging Face router compatible)

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{BackendKind, EmbeddingBackend};
use crate::embeddings::{Embedding, ModelOutput, OutputContract};
use crate::errors::VectorizeError;
use crate::vision::NormalizedImage;

pub const DEFAULT_ROUTER_URL: &str = "https://router.huggingface.co/feature_extraction";
pub const DEFAULT_HOSTED_MODEL: &str = "openai/clip-vit-base-patch32";

/// Upstream error bodies are cut to this many characters in our errors
const MAX_ERROR_BODY: usize = 300;

// --- Router request ---

#[derive(serde::Serialize)]
struct FeatureExtractionRequest<'a> {
    model: &'a str,
    inputs: FeatureExtractionInputs<'a>,
}

#[derive(serde::Serialize)]
struct FeatureExtractionInputs<'a> {
    image: &'a str,
}

#[derive(Debug, Clone)]
pub struct HostedConfig {
    pub router_url: String,
    pub model: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl Default for HostedConfig {
    fn default() -> Self {
        Self {
            router_url: DEFAULT_ROUTER_URL.to_string(),
            model: DEFAULT_HOSTED_MODEL.to_string(),
            token: None,
            timeout: Duration::from_secs(120),
        }
    }
}

/// Client for a hosted embedding API
pub struct HostedBackend {
    client: Client,
    router_url: String,
    model: String,
    token: Option<String>,
    contract: OutputContract,
}

impl HostedBackend {
    pub fn new(config: HostedConfig, contract: OutputContract) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;

        info!(
            "Hosted backend configured: endpoint={}, model={}, token={}",
            config.router_url,
            config.model,
            match &config.token {
                Some(t) => format!("OK ({} chars)", t.len()),
                None => "MISSING".to_string(),
            }
        );

        Ok(Self {
            client,
            router_url: config.router_url,
            model: config.model,
            token: config.token,
            contract,
        })
    }

    fn token(&self) -> Result<&str, VectorizeError> {
        self.token.as_deref().ok_or_else(|| {
            VectorizeError::ModelLoad("hosted backend has no API token (set HF_TOKEN)".to_string())
        })
    }
}

#[async_trait]
impl EmbeddingBackend for HostedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Hosted
    }

    fn is_ready(&self) -> bool {
        self.token.is_some()
    }

    async fn ensure_ready(&self) -> Result<(), VectorizeError> {
        self.token().map(|_| ())
    }

    async fn embed(&self, image: &NormalizedImage) -> Result<Embedding, VectorizeError> {
        let token = self.token()?;
        let start = Instant::now();
        let data_url = image.to_data_url()?;

        let request = FeatureExtractionRequest {
            model: &self.model,
            inputs: FeatureExtractionInputs { image: &data_url },
        };

        let response = self
            .client
            .post(&self.router_url)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .map_err(|e| VectorizeError::Inference(format!("hosted API unreachable: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| VectorizeError::Inference(format!("hosted API body: {}", e)))?;

        if !status.is_success() {
            warn!("Hosted API returned {}: {}", status, truncate(&text));
            return Err(VectorizeError::Inference(format!(
                "hosted API returned {}: {}",
                status,
                truncate(&text)
            )));
        }

        let value: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
            VectorizeError::Inference(format!("hosted API returned invalid JSON: {}", e))
        })?;
        let output = ModelOutput::from_json(&value)
            .map_err(|e| VectorizeError::Inference(format!("hosted API output: {}", e)))?;

        debug!(
            "Hosted embedding shape {:?} in {}ms",
            output.shape,
            start.elapsed().as_millis()
        );

        self.contract
            .apply(output)
            .map_err(|e| VectorizeError::Inference(format!("unexpected output: {}", e)))
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_ERROR_BODY {
        return text.to_string();
    }
    let cut: String = text.chars().take(MAX_ERROR_BODY).collect();
    format!("{}…", cut)
}
