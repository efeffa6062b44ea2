// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vectorize response types

use serde::{Deserialize, Serialize};

/// Response body of a successful POST /vectorize
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorizeResponse {
    pub embedding: Vec<f32>,
}
