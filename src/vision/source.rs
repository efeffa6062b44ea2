// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Where an input image comes from

use bytes::Bytes;
use url::Url;

use super::image_utils::decode_base64_payload;
use crate::errors::VectorizeError;

/// An image to vectorize: either a URL to fetch or inline bytes
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    /// HTTP(S) URL fetched at normalization time
    RemoteUrl(String),
    /// Decoded bytes from a base64 payload
    InlineData {
        bytes: Bytes,
        /// MIME type declared by a `data:` prefix, informational only
        mime: Option<String>,
    },
}

impl ImageSource {
    /// Build a source from the two optional request fields
    ///
    /// Exactly one of `image_url` / `image_base64` must be non-empty.
    pub fn from_fields(
        image_url: Option<&str>,
        image_base64: Option<&str>,
        max_bytes: usize,
    ) -> Result<Self, VectorizeError> {
        let image_url = image_url.map(str::trim).filter(|s| !s.is_empty());
        let image_base64 = image_base64.map(str::trim).filter(|s| !s.is_empty());

        match (image_url, image_base64) {
            (None, None) => Err(VectorizeError::InvalidInput(
                "No image provided: set image_url or image_base64".to_string(),
            )),
            (Some(_), Some(_)) => Err(VectorizeError::InvalidInput(
                "Provide only one of image_url or image_base64".to_string(),
            )),
            (Some(url), None) => Self::from_url(url),
            (None, Some(data)) => Self::from_base64(data, max_bytes),
        }
    }

    /// Validate and wrap a remote URL. Only http and https are fetched.
    pub fn from_url(raw: &str) -> Result<Self, VectorizeError> {
        let url = Url::parse(raw)
            .map_err(|e| VectorizeError::InvalidInput(format!("Invalid image_url: {}", e)))?;

        match url.scheme() {
            "http" | "https" => Ok(Self::RemoteUrl(url.to_string())),
            other => Err(VectorizeError::InvalidInput(format!(
                "Unsupported image_url scheme '{}'",
                other
            ))),
        }
    }

    /// Decode a base64 payload, with or without a `data:<mime>;base64,` prefix
    pub fn from_base64(data: &str, max_bytes: usize) -> Result<Self, VectorizeError> {
        let (bytes, mime) = decode_base64_payload(data, max_bytes)?;
        Ok(Self::InlineData {
            bytes: Bytes::from(bytes),
            mime,
        })
    }

    /// Short label for logs; never includes payload bytes
    pub fn describe(&self) -> String {
        match self {
            Self::RemoteUrl(url) => format!("url {}", url),
            Self::InlineData { bytes, mime } => format!(
                "inline {} bytes ({})",
                bytes.len(),
                mime.as_deref().unwrap_or("no declared type")
            ),
        }
    }
}
