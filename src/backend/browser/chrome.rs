// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Launches headless Chrome and opens the extraction page

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::cdp::{function_call_expression, function_ready_expression, CdpConnection};
use super::{BrowserConfig, PageError, PageLauncher, PageSession};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetInfo {
    id: String,
    web_socket_debugger_url: String,
}

pub struct ChromeLauncher {
    config: BrowserConfig,
    http: reqwest::Client,
}

impl ChromeLauncher {
    pub fn new(config: BrowserConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self { config, http })
    }

    fn devtools_base(&self) -> String {
        format!("http://127.0.0.1:{}", self.config.debug_port)
    }

    fn spawn(&self) -> Result<Child, PageError> {
        let profile_dir =
            std::env::temp_dir().join(format!("clip-vectorizer-chrome-{}", self.config.debug_port));

        Command::new(&self.config.chrome_path)
            .args([
                "--headless=new",
                "--disable-gpu",
                "--no-sandbox",
                "--disable-dev-shm-usage",
                "--no-first-run",
                "--no-default-browser-check",
                "--mute-audio",
            ])
            .arg(format!("--remote-debugging-port={}", self.config.debug_port))
            .arg(format!("--user-data-dir={}", profile_dir.display()))
            .arg("about:blank")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                PageError::Launch(format!("failed to start {}: {}", self.config.chrome_path, e))
            })
    }

    async fn wait_for_devtools(&self, child: &mut Child, deadline: Instant) -> Result<(), PageError> {
        let url = format!("{}/json/version", self.devtools_base());
        loop {
            if let Ok(response) = self.http.get(&url).send().await {
                if response.status().is_success() {
                    return Ok(());
                }
            }

            if let Ok(Some(status)) = child.try_wait() {
                return Err(PageError::Launch(format!("browser exited early with {}", status)));
            }
            if Instant::now() >= deadline {
                return Err(PageError::Timeout(self.config.ready_timeout));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn open_target(&self) -> Result<TargetInfo, PageError> {
        // Recent Chrome only accepts PUT here
        let url = format!("{}/json/new?{}", self.devtools_base(), self.config.page_url);
        let response = self
            .http
            .put(&url)
            .send()
            .await
            .map_err(|e| PageError::Launch(format!("open page: {}", e)))?;

        if !response.status().is_success() {
            return Err(PageError::Launch(format!(
                "open page returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| PageError::Launch(format!("open page response: {}", e)))
    }

    async fn wait_for_function(
        &self,
        connection: &CdpConnection,
        deadline: Instant,
    ) -> Result<(), PageError> {
        let probe = function_ready_expression(&self.config.function);
        loop {
            match connection.evaluate(&probe).await {
                Ok(Value::Bool(true)) => return Ok(()),
                // Navigation in progress destroys the context; keep polling
                Ok(_) | Err(PageError::Protocol(_)) | Err(PageError::Script(_)) => {}
                Err(e) => return Err(e),
            }

            if Instant::now() >= deadline {
                return Err(PageError::Timeout(self.config.ready_timeout));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl PageLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<Arc<dyn PageSession>, PageError> {
        let deadline = Instant::now() + self.config.ready_timeout;

        info!(
            "Starting {} (DevTools port {})",
            self.config.chrome_path, self.config.debug_port
        );
        let mut child = self.spawn()?;

        self.wait_for_devtools(&mut child, deadline).await?;
        let target = self.open_target().await?;
        debug!("Opened target {} at {}", target.id, self.config.page_url);

        let connection = CdpConnection::connect(&target.web_socket_debugger_url).await?;
        self.wait_for_function(&connection, deadline).await?;

        Ok(Arc::new(ChromePage {
            connection,
            process: Mutex::new(child),
        }))
    }
}

/// Page plus the browser process that owns it; dropping it kills the browser
struct ChromePage {
    connection: CdpConnection,
    process: Mutex<Child>,
}

#[async_trait]
impl PageSession for ChromePage {
    async fn call_function(&self, function: &str, argument: &str) -> Result<Value, PageError> {
        self.connection
            .evaluate(&function_call_expression(function, argument))
            .await
    }

    fn is_alive(&self) -> bool {
        self.connection.is_alive()
    }

    /// Kill the browser and wait for it so the DevTools port and profile
    /// are free before the next launch
    async fn close(&self) {
        let mut child = self.process.lock().await;
        if let Err(e) = child.start_kill() {
            debug!("Browser already gone: {}", e);
        }
        match child.wait().await {
            Ok(status) => info!("Browser process exited with {}", status),
            Err(e) => warn!("Failed to reap browser process: {}", e),
        }
    }
}
