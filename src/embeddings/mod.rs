// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Image embedding models
//!
//! - `VisionModel`: a loaded model that maps a pixel tensor to a raw output
//! - `ModelManager`: lazy, load-once ownership of the process model
//! - `EmbeddingExtractor`: forward pass plus output contract
//! - `ClipVisionModel`: ONNX Runtime implementation (quantized CLIP ViT-B/32)

pub mod download;
pub mod extractor;
pub mod model_manager;
pub mod onnx_model;
pub mod output;

use ndarray::Array4;
use std::sync::Arc;

pub use download::ModelSource;
pub use extractor::EmbeddingExtractor;
pub use model_manager::{ModelLoader, ModelManager, OnnxModelLoader};
pub use onnx_model::ClipVisionModel;
pub use output::{ModelOutput, OutputContract, OutputLayout, OutputShapeError};

/// A fixed-length image embedding
pub type Embedding = Vec<f32>;

/// Shared handle to the loaded model
pub type ModelHandle = Arc<dyn VisionModel>;

/// A loaded vision model
///
/// `forward` is synchronous and CPU bound; callers run it on the blocking pool.
pub trait VisionModel: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    /// Run one forward pass over a `[1, 3, H, W]` pixel tensor
    fn forward(&self, pixel_values: Array4<f32>) -> anyhow::Result<ModelOutput>;
}
