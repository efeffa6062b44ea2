// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Embedding Model Manager
//!
//! Owns the single vision model of the process. The model is not loaded at
//! startup: the first request that needs it triggers the load, every later
//! request gets the cached handle. A failed load is not cached, so the next
//! request starts over (useful when the first download hit a network blip).

use async_trait::async_trait;
use ndarray::Array4;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{error, info};

use super::{ClipVisionModel, ModelHandle, ModelSource, OutputContract};
use crate::errors::VectorizeError;
use crate::vision::TARGET_SIZE;

/// Produces a fresh model instance
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self) -> anyhow::Result<ModelHandle>;
}

/// Loads `ClipVisionModel` from a local file or the hub
#[derive(Debug, Clone)]
pub struct OnnxModelLoader {
    source: ModelSource,
    output_name: Option<String>,
    intra_threads: usize,
}

impl OnnxModelLoader {
    pub fn new(source: ModelSource, contract: &OutputContract, intra_threads: usize) -> Self {
        Self {
            source,
            output_name: contract.output_name.clone(),
            intra_threads,
        }
    }
}

#[async_trait]
impl ModelLoader for OnnxModelLoader {
    async fn load(&self) -> anyhow::Result<ModelHandle> {
        let path = self.source.resolve().await?;
        let name = self.source.label();
        let output_name = self.output_name.clone();
        let intra_threads = self.intra_threads;

        let model = tokio::task::spawn_blocking(move || {
            ClipVisionModel::load(name, path, output_name.as_deref(), intra_threads)
        })
        .await??;

        Ok(Arc::new(model))
    }
}

/// Lazy, load-once owner of the process model
pub struct ModelManager {
    loader: Arc<dyn ModelLoader>,
    contract: OutputContract,
    model: OnceCell<ModelHandle>,
    load_attempts: AtomicUsize,
}

impl std::fmt::Debug for ModelManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelManager")
            .field("contract", &self.contract)
            .field("loaded", &self.is_loaded())
            .field("load_attempts", &self.load_attempts())
            .finish_non_exhaustive()
    }
}

impl ModelManager {
    pub fn new(loader: Arc<dyn ModelLoader>, contract: OutputContract) -> Self {
        Self {
            loader,
            contract,
            model: OnceCell::new(),
            load_attempts: AtomicUsize::new(0),
        }
    }

    /// Return the model, loading it on first use
    ///
    /// Idempotent: once a load succeeds every call returns the same instance.
    /// Concurrent first callers share one load.
    pub async fn ensure_loaded(&self) -> Result<ModelHandle, VectorizeError> {
        self.model
            .get_or_try_init(|| self.load_and_validate())
            .await
            .cloned()
    }

    async fn load_and_validate(&self) -> Result<ModelHandle, VectorizeError> {
        let attempt = self.load_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        info!("Loading embedding model (attempt {})", attempt);
        let start = Instant::now();

        let model = self.loader.load().await.map_err(|e| {
            error!("✗ Failed to load embedding model: {:#}", e);
            VectorizeError::model_load(e)
        })?;

        // Probe once so a model whose output does not fit the contract is
        // rejected here instead of producing mis-shaped embeddings later
        let probe = model.clone();
        let size = TARGET_SIZE as usize;
        let output = tokio::task::spawn_blocking(move || {
            probe.forward(Array4::zeros((1, 3, size, size)))
        })
        .await
        .map_err(|e| VectorizeError::Internal(format!("model probe task failed: {}", e)))?
        .map_err(|e| VectorizeError::ModelLoad(format!("probe inference failed: {:#}", e)))?;

        self.contract.validate(&output).map_err(|e| {
            error!("✗ Model {} violates its output contract: {}", model.name(), e);
            VectorizeError::ModelLoad(format!("output contract violated: {}", e))
        })?;

        info!(
            "✓ Loaded embedding model {} ({} dimensions) in {:?}",
            model.name(),
            self.contract.dimension,
            start.elapsed()
        );
        Ok(model)
    }

    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    /// Number of times the loader has been invoked
    pub fn load_attempts(&self) -> usize {
        self.load_attempts.load(Ordering::SeqCst)
    }

    pub fn contract(&self) -> &OutputContract {
        &self.contract
    }
}
