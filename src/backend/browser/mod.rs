// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Headless browser backend
//!
//! A browser page that already carries the extraction script is driven over
//! the DevTools protocol. The page is launched on first use and kept for the
//! life of the process; if it dies it is relaunched, at most once per request.

pub mod cdp;
pub mod chrome;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::{BackendKind, EmbeddingBackend};
use crate::embeddings::{Embedding, ModelOutput, OutputContract};
use crate::errors::VectorizeError;
use crate::vision::NormalizedImage;

pub use chrome::ChromeLauncher;

pub const DEFAULT_BROWSER_FUNCTION: &str = "extractEmbedding";
pub const DEFAULT_DEBUG_PORT: u16 = 9222;

#[derive(Debug, Error)]
pub enum PageError {
    #[error("failed to launch page: {0}")]
    Launch(String),

    #[error("page disconnected: {0}")]
    Disconnected(String),

    #[error("DevTools protocol error: {0}")]
    Protocol(String),

    #[error("script error: {0}")]
    Script(String),

    #[error("page not ready after {0:?}")]
    Timeout(Duration),
}

/// A live page that can run the extraction function
#[async_trait]
pub trait PageSession: Send + Sync {
    /// Call `window[function](argument)` and return its by-value result
    async fn call_function(&self, function: &str, argument: &str) -> Result<Value, PageError>;

    fn is_alive(&self) -> bool;

    /// Tear the page down for good; called before a replacement is launched
    async fn close(&self) {}
}

/// Starts a browser and opens a ready page
#[async_trait]
pub trait PageLauncher: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn PageSession>, PageError>;
}

#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Chrome or Chromium executable
    pub chrome_path: String,
    /// Page that installs the extraction function on `window`
    pub page_url: String,
    pub function: String,
    pub debug_port: u16,
    /// Budget for browser start plus page ready (model download included)
    pub ready_timeout: Duration,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: "chromium".to_string(),
            page_url: "about:blank".to_string(),
            function: DEFAULT_BROWSER_FUNCTION.to_string(),
            debug_port: DEFAULT_DEBUG_PORT,
            ready_timeout: Duration::from_secs(120),
        }
    }
}

/// Page slot guarded by one lock
#[derive(Default)]
struct PageSlot {
    page: Option<Arc<dyn PageSession>>,
    /// Set when `ensure_ready` launched the current page; the next `embed`
    /// counts that launch as its one re-initialisation
    launched_by_ensure: bool,
}

pub struct BrowserBackend {
    launcher: Arc<dyn PageLauncher>,
    function: String,
    contract: OutputContract,
    slot: Mutex<PageSlot>,
    launches: AtomicUsize,
}

impl BrowserBackend {
    pub fn new(launcher: Arc<dyn PageLauncher>, function: String, contract: OutputContract) -> Self {
        Self {
            launcher,
            function,
            contract,
            slot: Mutex::new(PageSlot::default()),
            launches: AtomicUsize::new(0),
        }
    }

    /// Backend driving a local Chrome through `ChromeLauncher`
    pub fn chrome(config: BrowserConfig, contract: OutputContract) -> anyhow::Result<Self> {
        let function = config.function.clone();
        let launcher = ChromeLauncher::new(config)?;
        Ok(Self::new(Arc::new(launcher), function, contract))
    }

    /// Number of page launches attempted so far
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// Current page, launching one if there is none or it died.
    /// The flag is `true` when this call did the launch.
    async fn page(&self, slot: &mut PageSlot) -> Result<(Arc<dyn PageSession>, bool), VectorizeError> {
        if let Some(page) = slot.page.as_ref() {
            if page.is_alive() {
                return Ok((page.clone(), false));
            }
            warn!("⚠️ Browser page lost, re-initialising");
            if let Some(lost) = slot.page.take() {
                lost.close().await;
            }
        }

        let attempt = self.launches.fetch_add(1, Ordering::SeqCst) + 1;
        info!("Launching browser page (attempt #{})", attempt);
        let start = Instant::now();

        let page = self.launcher.launch().await.map_err(|e| {
            error!("✗ Browser page failed to start: {}", e);
            VectorizeError::ModelLoad(format!("browser page unavailable: {}", e))
        })?;

        info!("✓ Browser page ready in {}ms", start.elapsed().as_millis());
        slot.page = Some(page.clone());
        Ok((page, true))
    }

    /// Drop the slot's page if it is still `lost`, and shut it down
    async fn discard(&self, slot: &mut PageSlot, lost: Arc<dyn PageSession>) {
        if slot.page.as_ref().is_some_and(|page| Arc::ptr_eq(page, &lost)) {
            slot.page = None;
        }
        lost.close().await;
    }
}

fn page_failure(err: PageError) -> VectorizeError {
    match err {
        PageError::Launch(_) | PageError::Timeout(_) => {
            VectorizeError::ModelLoad(format!("browser page unavailable: {}", err))
        }
        other => VectorizeError::Inference(format!("browser extraction failed: {}", other)),
    }
}

#[async_trait]
impl EmbeddingBackend for BrowserBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Browser
    }

    fn is_ready(&self) -> bool {
        match self.slot.try_lock() {
            Ok(slot) => slot.page.as_ref().is_some_and(|page| page.is_alive()),
            // Locked means a launch is in progress
            Err(_) => false,
        }
    }

    async fn ensure_ready(&self) -> Result<(), VectorizeError> {
        let mut slot = self.slot.lock().await;
        slot.launched_by_ensure = false;
        let (_, launched) = self.page(&mut slot).await?;
        slot.launched_by_ensure = launched;
        Ok(())
    }

    async fn embed(&self, image: &NormalizedImage) -> Result<Embedding, VectorizeError> {
        let data_url = image.to_data_url()?;

        let (page, fresh) = {
            let mut slot = self.slot.lock().await;
            let (page, launched) = self.page(&mut slot).await?;
            (page, launched || std::mem::take(&mut slot.launched_by_ensure))
        };

        let value = match page.call_function(&self.function, &data_url).await {
            Ok(value) => value,
            Err(PageError::Disconnected(reason)) if !fresh => {
                warn!("⚠️ Browser page disconnected ({}), retrying on a new page", reason);
                let page = {
                    let mut slot = self.slot.lock().await;
                    self.discard(&mut slot, page).await;
                    self.page(&mut slot).await?.0
                };

                match page.call_function(&self.function, &data_url).await {
                    Ok(value) => value,
                    Err(e) => {
                        if matches!(e, PageError::Disconnected(_)) {
                            error!("✗ Relaunched browser page disconnected too");
                            self.discard(&mut *self.slot.lock().await, page).await;
                        }
                        return Err(page_failure(e));
                    }
                }
            }
            Err(e) => {
                if matches!(e, PageError::Disconnected(_)) {
                    self.discard(&mut *self.slot.lock().await, page).await;
                }
                return Err(page_failure(e));
            }
        };

        let output = ModelOutput::from_json(&value)
            .map_err(|e| VectorizeError::Inference(format!("browser output: {}", e)))?;
        debug!("Browser embedding shape {:?}", output.shape);

        self.contract
            .apply(output)
            .map_err(|e| VectorizeError::Inference(format!("unexpected output: {}", e)))
    }
}
