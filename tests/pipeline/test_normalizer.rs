// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Image normalization: fixed output shape and the 70% center crop

use bytes::Bytes;
use clip_vectorizer::vision::{CropRegion, ImageFetcher, ImageNormalizer, ImageSource, NormalizedImage};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::time::Duration;

use crate::common::{encode, gradient_image, png_bytes, spawn_image_server, BODY_LIMIT};

fn normalizer() -> ImageNormalizer {
    ImageNormalizer::new(ImageFetcher::new(Duration::from_secs(5), BODY_LIMIT).unwrap())
}

fn inline(bytes: Vec<u8>) -> ImageSource {
    ImageSource::InlineData {
        bytes: Bytes::from(bytes),
        mime: None,
    }
}

#[tokio::test]
async fn test_any_input_size_gives_fixed_shape() {
    let normalizer = normalizer();

    for (w, h) in [(1, 1), (2, 3), (224, 224), (1000, 500), (3000, 20), (20, 3000)] {
        let image = normalizer.normalize(&inline(png_bytes(w, h))).await.unwrap();
        assert_eq!(image.shape(), (224, 224, 3), "input {}x{}", w, h);
        assert_eq!(image.source_dimensions(), (w, h));
        assert_eq!(image.to_tensor().shape(), &[1, 3, 224, 224]);
    }
}

#[tokio::test]
async fn test_formats_normalize_alike() {
    let normalizer = normalizer();
    let source = gradient_image(300, 200);

    for format in [ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::Bmp] {
        let image = normalizer
            .normalize(&inline(encode(&source, format)))
            .await
            .unwrap();
        assert_eq!(image.shape(), (224, 224, 3), "{:?}", format);
        assert_eq!(image.crop(), CropRegion::centered(300, 200, 0.70));
    }
}

#[tokio::test]
async fn test_border_outside_crop_is_discarded() {
    // 15% red frame on each side, green center: exactly the part the crop keeps
    let (w, h) = (1000u32, 500u32);
    let framed = RgbImage::from_fn(w, h, |x, y| {
        let inside = (150..850).contains(&x) && (75..425).contains(&y);
        if inside {
            Rgb([0, 255, 0])
        } else {
            Rgb([255, 0, 0])
        }
    });
    let bytes = encode(&DynamicImage::ImageRgb8(framed), ImageFormat::Png);

    let image = normalizer().normalize(&inline(bytes)).await.unwrap();

    assert_eq!(
        image.crop(),
        CropRegion {
            left: 150,
            top: 75,
            width: 700,
            height: 350
        }
    );
    for pixel in image.pixels().pixels() {
        assert!(pixel[0] <= 2 && pixel[1] >= 253, "border leaked: {:?}", pixel);
    }
}

#[tokio::test]
async fn test_normalization_is_deterministic() {
    let bytes = png_bytes(640, 360);

    let a = NormalizedImage::from_bytes(&bytes, BODY_LIMIT).unwrap();
    let b = normalizer().normalize(&inline(bytes)).await.unwrap();

    assert_eq!(a.pixels(), b.pixels());
    assert_eq!(a.to_png().unwrap(), b.to_png().unwrap());
}

#[tokio::test]
async fn test_remote_image_is_fetched_and_cropped() {
    let base = spawn_image_server().await;
    let source = ImageSource::from_url(&format!("{}/wide.png", base)).unwrap();

    let image = normalizer().normalize(&source).await.unwrap();

    assert_eq!(image.source_dimensions(), (1000, 500));
    assert_eq!(image.crop().width, 700);
    assert_eq!(image.crop().height, 350);
}

#[tokio::test]
async fn test_fetch_respects_size_cap() {
    let base = spawn_image_server().await;
    let tiny_cap = ImageNormalizer::new(ImageFetcher::new(Duration::from_secs(5), 64).unwrap());
    let source = ImageSource::from_url(&format!("{}/wide.png", base)).unwrap();

    let err = tiny_cap.normalize(&source).await.unwrap_err();
    assert_eq!(err.error_type(), "decode_error");
}
