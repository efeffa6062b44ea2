// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use clap::Parser;
use clip_vectorizer::{
    api::{start_server, AppState},
    config::VectorizerConfig,
    version,
};
use std::{env, sync::Arc};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("🚀 Starting CLIP Vectorizer...\n");
    println!("📦 BUILD VERSION: {}", version::VERSION);
    println!("📅 Build Date: {}", version::BUILD_DATE);
    println!("🧩 Features: {}", version::FEATURES.join(", "));
    println!();

    let config = VectorizerConfig::parse();
    info!("{}", version::get_version_string());
    let addr = config.listen_addr()?;

    println!("🧠 Backend: {}", config.backend);
    let vectorizer = Arc::new(config.build_vectorizer()?);
    info!(
        "Inference timeout {:?}, image limit {} bytes, body limit {} bytes",
        vectorizer.inference_timeout(),
        vectorizer.max_image_bytes(),
        config.max_body_bytes
    );

    if config.preload {
        println!("⏳ Preloading backend...");
        match vectorizer.preload().await {
            Ok(()) => println!("✅ Backend ready"),
            Err(e) => warn!("⚠️ Preload failed, first request will retry: {}", e),
        }
    } else {
        println!("💤 Backend loads on first request");
    }

    let state = AppState::new(vectorizer, config.test_image_url.as_str());

    println!("🌐 Listening on http://{}", addr);
    start_server(addr, state, config.max_body_bytes).await
}
