// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::DefaultBodyLimit,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::{any::Any, net::SocketAddr, sync::Arc};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any as AnyOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

use super::diagnostics::{health_handler, root_handler, test_hf_handler};
use super::errors::ApiError;
use super::vectorize::vectorize_handler;
use crate::errors::VectorizeError;
use crate::vectorizer::Vectorizer;

#[derive(Clone)]
pub struct AppState {
    pub vectorizer: Arc<Vectorizer>,
    /// Image run by GET /test-hf
    pub test_image_url: Arc<str>,
}

impl AppState {
    pub fn new(vectorizer: Arc<Vectorizer>, test_image_url: impl Into<Arc<str>>) -> Self {
        Self {
            vectorizer,
            test_image_url: test_image_url.into(),
        }
    }
}

pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/test-hf", get(test_hf_handler))
        .route("/vectorize", post(vectorize_handler))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(AnyOrigin)
                .allow_methods(AnyOrigin)
                .allow_headers(AnyOrigin),
        )
        .with_state(state)
}

pub async fn start_server(
    addr: SocketAddr,
    state: AppState,
    max_body_bytes: usize,
) -> anyhow::Result<()> {
    let app = build_router(state, max_body_bytes);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("API server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

// The in-flight permit is dropped during unwinding, so the slot is free again
// by the time this runs.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!("Handler panicked: {}", detail);

    ApiError::from(VectorizeError::Internal("request handler panicked".to_string())).into_response()
}
