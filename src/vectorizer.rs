// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Request orchestration
//!
//! `Vectorizer` sequences one request: admission, backend readiness,
//! normalization, embedding. The in-flight slot is held for the whole
//! sequence and given back on every exit path.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::admission::AdmissionController;
use crate::backend::{BackendKind, EmbeddingBackend};
use crate::embeddings::Embedding;
use crate::errors::VectorizeError;
use crate::vision::{ImageNormalizer, ImageSource};

pub const DEFAULT_INFERENCE_TIMEOUT: Duration = Duration::from_secs(120);

pub struct Vectorizer {
    backend: Arc<dyn EmbeddingBackend>,
    normalizer: ImageNormalizer,
    admission: AdmissionController,
    inference_timeout: Duration,
}

impl Vectorizer {
    pub fn new(
        backend: Arc<dyn EmbeddingBackend>,
        normalizer: ImageNormalizer,
        inference_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            normalizer,
            admission: AdmissionController::new(),
            inference_timeout,
        }
    }

    /// Validate the two request fields and run the pipeline
    pub async fn vectorize_fields(
        &self,
        image_url: Option<&str>,
        image_base64: Option<&str>,
    ) -> Result<Embedding, VectorizeError> {
        let source = ImageSource::from_fields(image_url, image_base64, self.max_image_bytes())?;
        self.vectorize(&source).await
    }

    /// Run one source through the pipeline
    ///
    /// # Returns
    ///
    /// * `Busy` if another request holds the slot
    /// * `InferenceTimeout` if readiness, normalization and embedding together
    ///   exceed the configured timeout
    pub async fn vectorize(&self, source: &ImageSource) -> Result<Embedding, VectorizeError> {
        let Some(permit) = self.admission.try_acquire() else {
            warn!("Rejecting {}: another request is in flight", source.describe());
            return Err(VectorizeError::Busy);
        };

        let start = Instant::now();
        let result = tokio::time::timeout(self.inference_timeout, self.run(source)).await;
        permit.release();

        match result {
            Ok(Ok(embedding)) => {
                info!(
                    "✅ Vectorized {} -> {} dims in {}ms",
                    source.describe(),
                    embedding.len(),
                    start.elapsed().as_millis()
                );
                Ok(embedding)
            }
            Ok(Err(e)) => {
                warn!("✗ Vectorize {} failed: {}", source.describe(), e);
                Err(e)
            }
            Err(_) => {
                warn!(
                    "✗ Vectorize {} timed out after {:?}",
                    source.describe(),
                    self.inference_timeout
                );
                Err(VectorizeError::InferenceTimeout(self.inference_timeout))
            }
        }
    }

    async fn run(&self, source: &ImageSource) -> Result<Embedding, VectorizeError> {
        self.backend.ensure_ready().await?;

        let image = self.normalizer.normalize(source).await?;
        debug!(
            "Normalized {:?} -> {:?} (crop {:?})",
            image.source_dimensions(),
            image.shape(),
            image.crop()
        );

        self.backend.embed(&image).await
    }

    /// Warm the backend before serving
    pub async fn preload(&self) -> Result<(), VectorizeError> {
        let start = Instant::now();
        self.backend.ensure_ready().await?;
        info!(
            "✓ {} backend ready in {}ms",
            self.backend.kind(),
            start.elapsed().as_millis()
        );
        Ok(())
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn backend_ready(&self) -> bool {
        self.backend.is_ready()
    }

    pub fn is_busy(&self) -> bool {
        self.admission.is_busy()
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    pub fn inference_timeout(&self) -> Duration {
        self.inference_timeout
    }

    pub fn max_image_bytes(&self) -> usize {
        self.normalizer.max_bytes()
    }
}
