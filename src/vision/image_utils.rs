// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image loading and utility functions for the vectorize pipeline

use base64::{
    alphabet,
    engine::{general_purpose, DecodePaddingMode, GeneralPurpose},
    Engine as _,
};
use image::{DynamicImage, ImageFormat};
use thiserror::Error;

/// Default maximum image size (15MB, matches the default JSON body limit)
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 15 * 1024 * 1024;

/// Standard alphabet, padding optional. Clients routinely strip the trailing `=`.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    general_purpose::PAD.with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Custom error types for image processing
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Image data is too large: {0} bytes (max: {1} bytes)")]
    TooLarge(usize, usize),

    #[error("Invalid base64 encoding: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Unsupported image format")]
    UnsupportedFormat,

    #[error("Failed to decode image: {0}")]
    DecodeFailed(String),

    #[error("Failed to encode image: {0}")]
    EncodeFailed(String),

    #[error("Image data is empty")]
    EmptyData,
}

/// Image information extracted during loading
#[derive(Debug, Clone)]
pub struct ImageInfo {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Detected format
    pub format: ImageFormat,
    /// Size in bytes
    pub size_bytes: usize,
}

/// Split an optional `data:<mime>;base64,` prefix off a base64 payload
///
/// Returns the declared MIME type (if any) and the bare payload. Input without
/// a prefix is returned unchanged with no MIME type.
///
/// # Example
/// ```ignore
/// let (mime, payload) = split_data_url("data:image/png;base64,iVBORw0KGgo=");
/// assert_eq!(mime, Some("image/png"));
/// assert_eq!(payload, "iVBORw0KGgo=");
/// ```
pub fn split_data_url(input: &str) -> (Option<&str>, &str) {
    let input = input.trim();
    match input.find("base64,") {
        Some(idx) => {
            let mime = input[..idx]
                .strip_prefix("data:")
                .map(|m| m.trim_end_matches(';'))
                .filter(|m| !m.is_empty());
            (mime, &input[idx + "base64,".len()..])
        }
        None => (None, input),
    }
}

/// Decode a base64 payload (with or without a data URL prefix) into raw bytes
///
/// # Returns
/// * `Ok((bytes, mime))` - Decoded bytes and the declared MIME type, if any
/// * `Err(ImageError)` - If the payload is empty, malformed or oversized
pub fn decode_base64_payload(
    input: &str,
    max_bytes: usize,
) -> Result<(Vec<u8>, Option<String>), ImageError> {
    let (mime, payload) = split_data_url(input);
    if payload.is_empty() {
        return Err(ImageError::EmptyData);
    }

    // Line-wrapped base64 (MIME style) is common in pasted payloads
    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = LENIENT_BASE64.decode(compact.as_bytes())?;

    if bytes.is_empty() {
        return Err(ImageError::EmptyData);
    }
    if bytes.len() > max_bytes {
        return Err(ImageError::TooLarge(bytes.len(), max_bytes));
    }

    Ok((bytes, mime.map(str::to_string)))
}

/// Decode raw image bytes into pixels
///
/// # Arguments
/// * `bytes` - Raw image bytes
/// * `max_bytes` - Size limit applied before decoding
///
/// # Returns
/// * `Ok((DynamicImage, ImageInfo))` - The decoded image and metadata
/// * `Err(ImageError)` - If decoding fails
pub fn decode_image_bytes(
    bytes: &[u8],
    max_bytes: usize,
) -> Result<(DynamicImage, ImageInfo), ImageError> {
    if bytes.len() > max_bytes {
        return Err(ImageError::TooLarge(bytes.len(), max_bytes));
    }

    if bytes.is_empty() {
        return Err(ImageError::EmptyData);
    }

    // Detect format from magic bytes
    let format = detect_format(bytes)?;

    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| ImageError::DecodeFailed(e.to_string()))?;

    if img.width() == 0 || img.height() == 0 {
        return Err(ImageError::DecodeFailed("image has zero area".to_string()));
    }

    let info = ImageInfo {
        width: img.width(),
        height: img.height(),
        format,
        size_bytes: bytes.len(),
    };

    Ok((img, info))
}

/// Detect image format from magic bytes
///
/// # Returns
/// * `Ok(ImageFormat)` - Detected format
/// * `Err(ImageError::UnsupportedFormat)` - If format cannot be detected
pub fn detect_format(bytes: &[u8]) -> Result<ImageFormat, ImageError> {
    if bytes.len() < 4 {
        return Err(ImageError::UnsupportedFormat);
    }

    match bytes {
        // PNG: 89 50 4E 47 (0x89 P N G)
        [0x89, 0x50, 0x4E, 0x47, ..] => Ok(ImageFormat::Png),

        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Ok(ImageFormat::Jpeg),

        // WebP: RIFF .... WEBP
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Ok(ImageFormat::WebP),

        // GIF: GIF87a or GIF89a
        [0x47, 0x49, 0x46, 0x38, x, ..] if *x == 0x37 || *x == 0x39 => Ok(ImageFormat::Gif),

        // BMP: BM
        [0x42, 0x4D, ..] => Ok(ImageFormat::Bmp),

        // TIFF: II (little-endian) or MM (big-endian)
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => Ok(ImageFormat::Tiff),

        _ => Err(ImageError::UnsupportedFormat),
    }
}
