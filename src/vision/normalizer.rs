// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Deterministic image normalization: 70% center crop, then resize to 224x224

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageFormat, RgbImage};
use ndarray::Array4;
use std::io::Cursor;

use super::fetch::ImageFetcher;
use super::image_utils::{decode_image_bytes, ImageError};
use super::source::ImageSource;
use crate::errors::VectorizeError;

/// Side length of the square model input
pub const TARGET_SIZE: u32 = 224;

/// Fraction of width and height kept by the center crop
pub const CROP_RATIO: f64 = 0.70;

/// CLIP normalization mean values
pub const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];

/// CLIP normalization std values
pub const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_11];

/// Rectangle extracted from the source image before resizing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRegion {
    /// Center crop keeping `ratio` of each dimension
    ///
    /// `width = round(ratio * W)`, `left = round((W - width) / 2)`, and the same
    /// for height. Always at least one pixel and always inside the image.
    pub fn centered(width: u32, height: u32, ratio: f64) -> Self {
        let (left, crop_w) = centered_span(width, ratio);
        let (top, crop_h) = centered_span(height, ratio);
        Self {
            left,
            top,
            width: crop_w,
            height: crop_h,
        }
    }
}

fn centered_span(extent: u32, ratio: f64) -> (u32, u32) {
    let len = ((extent as f64 * ratio).round() as u32).min(extent).max(1);
    let offset = ((extent.saturating_sub(len)) as f64 / 2.0).round() as u32;
    (offset.min(extent.saturating_sub(len)), len)
}

/// A 224x224 RGB image ready for the model
///
/// Pixels are kept uncompressed. Backends that need an encoded image get a PNG,
/// never a lossy format, so the embedding only depends on the source pixels.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pixels: RgbImage,
    crop: CropRegion,
    source_dimensions: (u32, u32),
}

impl NormalizedImage {
    /// Crop and resize a decoded image
    pub fn from_image(image: &DynamicImage) -> Self {
        let (width, height) = image.dimensions();
        let crop = CropRegion::centered(width, height, CROP_RATIO);

        let pixels = image
            .crop_imm(crop.left, crop.top, crop.width, crop.height)
            .resize_exact(TARGET_SIZE, TARGET_SIZE, FilterType::Lanczos3)
            .to_rgb8();

        Self {
            pixels,
            crop,
            source_dimensions: (width, height),
        }
    }

    /// Decode raw bytes and normalize them
    pub fn from_bytes(bytes: &[u8], max_bytes: usize) -> Result<Self, ImageError> {
        let (image, _info) = decode_image_bytes(bytes, max_bytes)?;
        Ok(Self::from_image(&image))
    }

    /// Tensor shape as (height, width, channels)
    pub fn shape(&self) -> (usize, usize, usize) {
        (
            self.pixels.height() as usize,
            self.pixels.width() as usize,
            3,
        )
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    pub fn crop(&self) -> CropRegion {
        self.crop
    }

    pub fn source_dimensions(&self) -> (u32, u32) {
        self.source_dimensions
    }

    /// CLIP-normalized NCHW tensor `[1, 3, 224, 224]`
    pub fn to_tensor(&self) -> Array4<f32> {
        let size = TARGET_SIZE as usize;
        let mut tensor = Array4::zeros((1, 3, size, size));

        for (x, y, pixel) in self.pixels.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] =
                    (pixel[c] as f32 / 255.0 - CLIP_MEAN[c]) / CLIP_STD[c];
            }
        }

        tensor
    }

    /// Lossless PNG encoding of the normalized pixels
    pub fn to_png(&self) -> Result<Vec<u8>, ImageError> {
        let mut buffer = Cursor::new(Vec::new());
        self.pixels
            .write_to(&mut buffer, ImageFormat::Png)
            .map_err(|e| ImageError::EncodeFailed(e.to_string()))?;
        Ok(buffer.into_inner())
    }

    /// `data:image/png;base64,...` form for out-of-process backends
    pub fn to_data_url(&self) -> Result<String, ImageError> {
        Ok(format!("data:image/png;base64,{}", STANDARD.encode(self.to_png()?)))
    }
}

/// Turns any `ImageSource` into a `NormalizedImage`
#[derive(Debug, Clone)]
pub struct ImageNormalizer {
    fetcher: ImageFetcher,
}

impl ImageNormalizer {
    pub fn new(fetcher: ImageFetcher) -> Self {
        Self { fetcher }
    }

    /// Cap on fetched and decoded image payloads
    pub fn max_bytes(&self) -> usize {
        self.fetcher.max_bytes()
    }

    /// Fetch (if remote), decode, crop and resize
    ///
    /// Decoding and resampling run on the blocking pool so they never stall the
    /// runtime thread that also answers health checks.
    pub async fn normalize(&self, source: &ImageSource) -> Result<NormalizedImage, VectorizeError> {
        let bytes = match source {
            ImageSource::RemoteUrl(url) => self.fetcher.fetch(url).await?,
            ImageSource::InlineData { bytes, .. } => bytes.clone(),
        };

        let max_bytes = self.fetcher.max_bytes();
        let normalized = tokio::task::spawn_blocking(move || {
            NormalizedImage::from_bytes(&bytes, max_bytes)
        })
        .await
        .map_err(|e| VectorizeError::Internal(format!("image normalization task failed: {}", e)))??;

        Ok(normalized)
    }
}
