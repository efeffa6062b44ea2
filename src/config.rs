// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Service configuration
//!
//! Every option is a CLI flag with an environment variable fallback, so the
//! service runs unchanged from a `.env` file, a container env or the shell.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{
    BackendKind, BrowserBackend, BrowserConfig, EmbeddingBackend, HostedBackend, HostedConfig,
    LocalBackend,
};
use crate::embeddings::download::{DEFAULT_MODEL_FILE, DEFAULT_MODEL_REPO};
use crate::embeddings::{ModelManager, ModelSource, OnnxModelLoader, OutputContract, OutputLayout};
use crate::vectorizer::Vectorizer;
use crate::vision::{ImageFetcher, ImageNormalizer};

pub const DEFAULT_TEST_IMAGE_URL: &str =
    "https://www.kisasacraft.co.ke/cdn/shop/files/IMG_3491.jpg?v=1761125454&width=360";

/// CLIP image embedding HTTP service
#[derive(Parser, Debug, Clone)]
#[command(name = "clip-vectorizer")]
#[command(version)]
#[command(about = "Turns images into CLIP embedding vectors over HTTP", long_about = None)]
pub struct VectorizerConfig {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Where embeddings are computed
    #[arg(long, env = "VECTORIZER_BACKEND", value_enum, default_value_t = BackendKind::Local)]
    pub backend: BackendKind,

    /// Hugging Face Hub repo holding the ONNX model
    #[arg(long, env = "MODEL_REPO", default_value = DEFAULT_MODEL_REPO)]
    pub model_repo: String,

    /// File inside the repo
    #[arg(long, env = "MODEL_FILE", default_value = DEFAULT_MODEL_FILE)]
    pub model_file: String,

    /// Local model file; skips the hub when set
    #[arg(long, env = "MODEL_PATH")]
    pub model_path: Option<PathBuf>,

    /// Hub cache directory (defaults to the hf-hub cache)
    #[arg(long, env = "MODEL_CACHE_DIR")]
    pub model_cache_dir: Option<PathBuf>,

    /// Model output holding the embedding (first output when empty)
    #[arg(long, env = "MODEL_OUTPUT_NAME", default_value = "image_embeds")]
    pub model_output_name: String,

    /// Shape of that output
    #[arg(long, env = "MODEL_OUTPUT_LAYOUT", value_enum, default_value_t = OutputLayout::Pooled)]
    pub model_output_layout: OutputLayout,

    /// Embedding length
    #[arg(long, env = "EMBEDDING_DIM", default_value_t = 512)]
    pub embedding_dim: usize,

    /// ONNX Runtime intra-op threads
    #[arg(long, env = "INTRA_THREADS", default_value_t = 1)]
    pub intra_threads: usize,

    /// Budget for model readiness, preprocessing and inference per request
    #[arg(long, env = "INFERENCE_TIMEOUT_SECS", default_value_t = 120)]
    pub inference_timeout_secs: u64,

    /// Remote image download timeout
    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value_t = 30)]
    pub fetch_timeout_secs: u64,

    /// Request body limit
    #[arg(long, env = "MAX_BODY_BYTES", default_value_t = 15 * 1024 * 1024)]
    pub max_body_bytes: usize,

    /// Largest accepted image payload
    #[arg(long, env = "MAX_IMAGE_BYTES", default_value_t = 15 * 1024 * 1024)]
    pub max_image_bytes: usize,

    /// Image used by GET /test-hf
    #[arg(long, env = "TEST_IMAGE_URL", default_value = DEFAULT_TEST_IMAGE_URL)]
    pub test_image_url: String,

    /// Load the model (or launch the page) before accepting requests
    #[arg(long, env = "PRELOAD_MODEL")]
    pub preload: bool,

    /// Hugging Face token: hub downloads and the hosted backend
    #[arg(long, env = "HF_TOKEN", hide_env_values = true)]
    pub hf_token: Option<String>,

    #[arg(long, env = "HF_ROUTER_URL", default_value = crate::backend::hosted::DEFAULT_ROUTER_URL)]
    pub hf_router_url: String,

    #[arg(long, env = "HF_MODEL", default_value = crate::backend::hosted::DEFAULT_HOSTED_MODEL)]
    pub hf_model: String,

    /// Chrome or Chromium executable for the browser backend
    #[arg(long, env = "CHROME_PATH", default_value = "chromium")]
    pub chrome_path: String,

    /// Page that installs the extraction function
    #[arg(long, env = "BROWSER_PAGE_URL")]
    pub browser_page_url: Option<String>,

    /// Name of the extraction function on `window`
    #[arg(long, env = "BROWSER_FUNCTION", default_value = crate::backend::browser::DEFAULT_BROWSER_FUNCTION)]
    pub browser_function: String,

    #[arg(long, env = "BROWSER_DEBUG_PORT", default_value_t = crate::backend::browser::DEFAULT_DEBUG_PORT)]
    pub browser_debug_port: u16,

    #[arg(long, env = "BROWSER_READY_TIMEOUT_SECS", default_value_t = 120)]
    pub browser_ready_timeout_secs: u64,
}

impl VectorizerConfig {
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_secs(self.inference_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn model_source(&self) -> ModelSource {
        match &self.model_path {
            Some(path) => ModelSource::Local(path.clone()),
            None => ModelSource::Hub {
                repo: self.model_repo.clone(),
                file: self.model_file.clone(),
                cache_dir: self.model_cache_dir.clone(),
                token: self.hf_token.clone(),
            },
        }
    }

    pub fn output_contract(&self) -> OutputContract {
        let name = self.model_output_name.trim();
        OutputContract::new(
            (!name.is_empty()).then(|| name.to_string()),
            self.model_output_layout,
            self.embedding_dim,
        )
    }

    pub fn hosted_config(&self) -> HostedConfig {
        HostedConfig {
            router_url: self.hf_router_url.clone(),
            model: self.hf_model.clone(),
            token: self.hf_token.clone(),
            timeout: self.inference_timeout(),
        }
    }

    pub fn browser_config(&self) -> Result<BrowserConfig> {
        let page_url = self
            .browser_page_url
            .clone()
            .context("BROWSER_PAGE_URL is required for the browser backend")?;

        Ok(BrowserConfig {
            chrome_path: self.chrome_path.clone(),
            page_url,
            function: self.browser_function.clone(),
            debug_port: self.browser_debug_port,
            ready_timeout: Duration::from_secs(self.browser_ready_timeout_secs),
        })
    }

    /// Instantiate the configured backend. Nothing heavy happens here.
    pub fn build_backend(&self) -> Result<Arc<dyn EmbeddingBackend>> {
        let contract = self.output_contract();
        let backend: Arc<dyn EmbeddingBackend> = match self.backend {
            BackendKind::Local => {
                let loader =
                    OnnxModelLoader::new(self.model_source(), &contract, self.intra_threads);
                let manager = ModelManager::new(Arc::new(loader), contract);
                Arc::new(LocalBackend::new(Arc::new(manager)))
            }
            BackendKind::Browser => {
                Arc::new(BrowserBackend::chrome(self.browser_config()?, contract)?)
            }
            BackendKind::Hosted => Arc::new(HostedBackend::new(self.hosted_config(), contract)?),
        };
        Ok(backend)
    }

    pub fn build_normalizer(&self) -> Result<ImageNormalizer> {
        let fetcher = ImageFetcher::new(self.fetch_timeout(), self.max_image_bytes)?;
        Ok(ImageNormalizer::new(fetcher))
    }

    pub fn build_vectorizer(&self) -> Result<Vectorizer> {
        Ok(Vectorizer::new(
            self.build_backend()?,
            self.build_normalizer()?,
            self.inference_timeout(),
        ))
    }
}
