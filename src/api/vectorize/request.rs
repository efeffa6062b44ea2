// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vectorize request types

use serde::{Deserialize, Serialize};

/// Request body of POST /vectorize
///
/// Exactly one of the two fields must be set. The check lives in
/// `ImageSource::from_fields` so every entry point shares it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VectorizeRequest {
    /// HTTP(S) URL of the image
    #[serde(default)]
    pub image_url: Option<String>,

    /// Base64 image bytes, optionally with a `data:<mime>;base64,` prefix
    #[serde(default)]
    pub image_base64: Option<String>,
}
