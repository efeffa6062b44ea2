// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Output contracts
//!
//! Vision models disagree on what they return: projection heads emit one pooled
//! vector, plain encoders emit one vector per patch token. Instead of sniffing
//! the shape of every response, each model family declares its layout up
//! front. The contract is checked once against a probe inference at load time
//! and then applied to every response, so a model whose output does not match
//! fails loudly rather than producing mis-shaped embeddings.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// How the embedding sits inside the raw model output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OutputLayout {
    /// `[D]` or `[1, D]`: the output already is the embedding
    Pooled,
    /// `[1, T, D]` or `[T, D]`: per-token vectors, the first (CLS) token is the embedding
    FirstToken,
}

#[derive(Debug, Error, PartialEq)]
pub enum OutputShapeError {
    #[error("output shape {shape:?} does not fit the {layout:?} layout")]
    LayoutMismatch {
        layout: OutputLayout,
        shape: Vec<usize>,
    },

    #[error("embedding dimension {actual} does not match expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("shape {shape:?} needs {expected} values but {actual} were given")]
    DataLength {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    #[error("nested output arrays have inconsistent lengths")]
    Ragged,

    #[error("output contains a non-numeric or out-of-range value")]
    NonNumeric,

    #[error("output is empty")]
    Empty,
}

/// Raw tensor produced by a backend
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutput {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl ModelOutput {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self, OutputShapeError> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(OutputShapeError::DataLength {
                shape,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// Interpret a (possibly nested) JSON array as a dense tensor
    ///
    /// Used for backends that return JSON: the browser page and hosted APIs.
    /// Numbers are rounded to the nearest `f32`, the element type of every
    /// `Embedding` regardless of backend.
    pub fn from_json(value: &Value) -> Result<Self, OutputShapeError> {
        let mut shape = Vec::new();
        let mut cursor = value;
        while let Value::Array(items) = cursor {
            let first = items.first().ok_or(OutputShapeError::Empty)?;
            shape.push(items.len());
            cursor = first;
        }
        if shape.is_empty() {
            return Err(OutputShapeError::Empty);
        }

        let mut data = Vec::with_capacity(shape.iter().product());
        flatten_into(value, &shape, &mut data)?;
        Ok(Self { shape, data })
    }
}

fn flatten_into(value: &Value, shape: &[usize], out: &mut Vec<f32>) -> Result<(), OutputShapeError> {
    match (value, shape.split_first()) {
        (Value::Array(items), Some((&len, rest))) => {
            if items.len() != len {
                return Err(OutputShapeError::Ragged);
            }
            items.iter().try_for_each(|item| flatten_into(item, rest, out))
        }
        (Value::Number(n), None) => {
            let v = n.as_f64().ok_or(OutputShapeError::NonNumeric)? as f32;
            if !v.is_finite() {
                return Err(OutputShapeError::NonNumeric);
            }
            out.push(v);
            Ok(())
        }
        (Value::Array(_), None) | (Value::Number(_), Some(_)) => Err(OutputShapeError::Ragged),
        _ => Err(OutputShapeError::NonNumeric),
    }
}

/// Declared output of one model family
#[derive(Debug, Clone, PartialEq)]
pub struct OutputContract {
    /// Name of the ONNX output holding the embedding; first output if `None`
    pub output_name: Option<String>,
    pub layout: OutputLayout,
    pub dimension: usize,
}

impl OutputContract {
    pub fn new(output_name: Option<String>, layout: OutputLayout, dimension: usize) -> Self {
        Self {
            output_name,
            layout,
            dimension,
        }
    }

    /// CLIP ViT-B/32 with projection head: `image_embeds`, `[1, 512]`
    pub fn clip_image_embeds() -> Self {
        Self::new(Some("image_embeds".to_string()), OutputLayout::Pooled, 512)
    }

    /// Check a probe output without keeping the result
    pub fn validate(&self, output: &ModelOutput) -> Result<(), OutputShapeError> {
        self.locate(&output.shape).map(|_| ())
    }

    /// Extract the embedding from a raw output
    pub fn apply(&self, output: ModelOutput) -> Result<Vec<f32>, OutputShapeError> {
        let dim = self.locate(&output.shape)?;
        let mut data = output.data;
        data.truncate(dim);
        Ok(data)
    }

    /// Returns the embedding length once the shape is known to fit
    fn locate(&self, shape: &[usize]) -> Result<usize, OutputShapeError> {
        let dim = match (self.layout, shape) {
            (OutputLayout::Pooled, [d]) | (OutputLayout::Pooled, [1, d]) => *d,
            (OutputLayout::FirstToken, [1, t, d]) | (OutputLayout::FirstToken, [t, d])
                if *t >= 1 =>
            {
                *d
            }
            _ => {
                return Err(OutputShapeError::LayoutMismatch {
                    layout: self.layout,
                    shape: shape.to_vec(),
                })
            }
        };

        if dim != self.dimension {
            return Err(OutputShapeError::DimensionMismatch {
                expected: self.dimension,
                actual: dim,
            });
        }
        Ok(dim)
    }
}
