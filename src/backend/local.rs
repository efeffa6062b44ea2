// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! In-process model backend

use async_trait::async_trait;
use std::sync::Arc;

use super::{BackendKind, EmbeddingBackend};
use crate::embeddings::{Embedding, EmbeddingExtractor, ModelManager};
use crate::errors::VectorizeError;
use crate::vision::NormalizedImage;

/// Runs the lazily loaded `ModelManager` model in this process
#[derive(Debug, Clone)]
pub struct LocalBackend {
    manager: Arc<ModelManager>,
    extractor: EmbeddingExtractor,
}

impl LocalBackend {
    pub fn new(manager: Arc<ModelManager>) -> Self {
        let extractor = EmbeddingExtractor::new(manager.contract().clone());
        Self { manager, extractor }
    }

    pub fn manager(&self) -> &Arc<ModelManager> {
        &self.manager
    }
}

#[async_trait]
impl EmbeddingBackend for LocalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn is_ready(&self) -> bool {
        self.manager.is_loaded()
    }

    async fn ensure_ready(&self) -> Result<(), VectorizeError> {
        self.manager.ensure_loaded().await.map(|_| ())
    }

    async fn embed(&self, image: &NormalizedImage) -> Result<Embedding, VectorizeError> {
        let model = self.manager.ensure_loaded().await?;
        self.extractor.extract(&model, image).await
    }
}
