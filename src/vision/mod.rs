// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image acquisition and preprocessing
//!
//! This module provides:
//! - Input parsing (URL or base64 with optional data URL prefix)
//! - HTTP fetching of remote images
//! - Deterministic 70% center crop and resize to the 224x224 model input

pub mod fetch;
pub mod image_utils;
pub mod normalizer;
pub mod source;

pub use fetch::ImageFetcher;
pub use image_utils::{decode_base64_payload, decode_image_bytes, detect_format, ImageError, ImageInfo};
pub use normalizer::{CropRegion, ImageNormalizer, NormalizedImage, CROP_RATIO, TARGET_SIZE};
pub use source::ImageSource;
