// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP retrieval of remote images

use anyhow::Result;
use bytes::{Bytes, BytesMut};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::image_utils::ImageError;
use crate::errors::VectorizeError;

/// Fetches `RemoteUrl` sources with a timeout and a body size cap
#[derive(Debug, Clone)]
pub struct ImageFetcher {
    client: Client,
    max_bytes: usize,
}

impl ImageFetcher {
    pub fn new(timeout: Duration, max_bytes: usize) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("clip-vectorizer/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, max_bytes })
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Download the body at `url`
    ///
    /// Non-2xx statuses and transport failures are `Fetch` errors; a body over
    /// the size cap is a `Decode` error so it reports like an oversized upload.
    pub async fn fetch(&self, url: &str) -> Result<Bytes, VectorizeError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| VectorizeError::Fetch(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VectorizeError::Fetch(format!(
                "{} returned HTTP {}",
                url, status
            )));
        }

        if let Some(len) = response.content_length() {
            if len as usize > self.max_bytes {
                return Err(ImageError::TooLarge(len as usize, self.max_bytes).into());
            }
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| VectorizeError::Fetch(format!("{}: {}", url, e)))?
        {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(ImageError::TooLarge(body.len() + chunk.len(), self.max_bytes).into());
            }
            body.extend_from_slice(&chunk);
        }

        debug!("Fetched {} bytes from {}", body.len(), url);
        Ok(body.freeze())
    }
}
