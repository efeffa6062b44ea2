// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Forward pass plus output contract

use tracing::debug;

use super::{Embedding, ModelHandle, OutputContract};
use crate::errors::VectorizeError;
use crate::vision::NormalizedImage;

#[derive(Debug, Clone)]
pub struct EmbeddingExtractor {
    contract: OutputContract,
}

impl EmbeddingExtractor {
    pub fn new(contract: OutputContract) -> Self {
        Self { contract }
    }

    /// Run `image` through `model` and cut the embedding out of the raw output
    ///
    /// Every failure inside the forward pass, including an output that no
    /// longer fits the contract, is an `Inference` error.
    pub async fn extract(
        &self,
        model: &ModelHandle,
        image: &NormalizedImage,
    ) -> Result<Embedding, VectorizeError> {
        let tensor = image.to_tensor();
        let model = model.clone();

        let output = tokio::task::spawn_blocking(move || model.forward(tensor))
            .await
            .map_err(|e| VectorizeError::Internal(format!("inference task failed: {}", e)))?
            .map_err(VectorizeError::inference)?;

        debug!("Raw model output shape {:?}", output.shape);

        self.contract
            .apply(output)
            .map_err(|e| VectorizeError::Inference(format!("unexpected output: {}", e)))
    }

    pub fn contract(&self) -> &OutputContract {
        &self.contract
    }
}
