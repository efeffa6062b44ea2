// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! ONNX CLIP Vision Model Wrapper
//!
//! Wraps ONNX Runtime to run the vision tower of CLIP ViT-B/32 in its
//! quantized (int8) export. CPU only: the service targets small hosts without
//! a GPU, and the quantized graph keeps resident memory low.
//!
//! Features:
//! - ONNX model loading from disk
//! - Output selection by name (`image_embeds` for the projection head)
//! - Single image forward pass over a `[1, 3, 224, 224]` tensor

use anyhow::{anyhow, Context, Result};
use ndarray::Array4;
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::{ModelOutput, VisionModel};

/// ONNX-based CLIP vision model
///
/// # Thread Safety
/// The session sits behind a `Mutex` because `Session::run` needs `&mut`.
/// Admission control already guarantees a single caller.
#[derive(Clone)]
pub struct ClipVisionModel {
    /// ONNX Runtime session
    session: Arc<Mutex<Session>>,

    /// Model name (e.g., "Xenova/clip-vit-base-patch32")
    model_name: String,

    /// Name of the pixel input (usually "pixel_values")
    input_name: String,

    /// Index into the session outputs of the embedding output
    output_index: usize,

    /// Name of the selected output
    output_name: String,
}

impl std::fmt::Debug for ClipVisionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipVisionModel")
            .field("model_name", &self.model_name)
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .finish_non_exhaustive()
    }
}

impl ClipVisionModel {
    /// Load a model from an ONNX file
    ///
    /// # Arguments
    /// - `model_name`: Label used in logs and health output
    /// - `model_path`: Path to the `.onnx` file
    /// - `output_name`: Output to read; the first output when `None`
    /// - `intra_threads`: ONNX Runtime intra-op thread count
    ///
    /// # Errors
    /// Returns error if:
    /// - Model file not found or invalid
    /// - ONNX Runtime initialization fails
    /// - The requested output does not exist
    ///
    /// Blocking: graph optimisation can take seconds, call from `spawn_blocking`.
    pub fn load<P: AsRef<Path>>(
        model_name: impl Into<String>,
        model_path: P,
        output_name: Option<&str>,
        intra_threads: usize,
    ) -> Result<Self> {
        let model_name = model_name.into();
        let model_path = model_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("ONNX model file not found: {}", model_path.display());
        }

        info!("Loading ONNX vision model from {}", model_path.display());

        let session = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .context("Failed to set CPU execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(intra_threads.max(1))
            .context("Failed to set intra threads")?
            .commit_from_file(model_path)
            .context(format!(
                "Failed to load ONNX model from {}",
                model_path.display()
            ))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "pixel_values".to_string());

        let available: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        let output_index = match output_name {
            Some(wanted) => available.iter().position(|n| n == wanted).ok_or_else(|| {
                anyhow!(
                    "Model has no output named '{}' (available: {:?})",
                    wanted,
                    available
                )
            })?,
            None if available.is_empty() => anyhow::bail!("Model declares no outputs"),
            None => 0,
        };
        let output_name = available[output_index].clone();

        debug!(
            "Vision model loaded - input: {}, output: {} (#{})",
            input_name, output_name, output_index
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            model_name,
            input_name,
            output_index,
            output_name,
        })
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }
}

impl VisionModel for ClipVisionModel {
    fn name(&self) -> &str {
        &self.model_name
    }

    fn forward(&self, pixel_values: Array4<f32>) -> Result<ModelOutput> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow!("ONNX session lock poisoned"))?;

        let outputs = session.run(ort::inputs![
            self.input_name.as_str() => Value::from_array(pixel_values)?
        ])?;

        let output = outputs[self.output_index]
            .try_extract_array::<f32>()
            .context("Failed to extract output tensor")?;

        let shape = output.shape().to_vec();
        let data: Vec<f32> = output.iter().copied().collect();

        ModelOutput::new(shape, data).map_err(|e| anyhow!("Malformed model output: {}", e))
    }
}
