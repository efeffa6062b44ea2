// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Minimal Chrome DevTools Protocol client
//!
//! Only what the backend needs: send a command over the page WebSocket and
//! wait for the reply with the matching id. Events are skipped.

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use super::PageError;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct CdpConnection {
    socket: Mutex<Socket>,
    next_id: AtomicU64,
    alive: AtomicBool,
}

impl CdpConnection {
    pub async fn connect(ws_url: &str) -> Result<Self, PageError> {
        let (socket, _response) = connect_async(ws_url)
            .await
            .map_err(|e| PageError::Launch(format!("DevTools connect to {}: {}", ws_url, e)))?;

        debug!("Connected to DevTools target {}", ws_url);
        Ok(Self {
            socket: Mutex::new(socket),
            next_id: AtomicU64::new(1),
            alive: AtomicBool::new(true),
        })
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Send one command and wait for its reply
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, PageError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = json!({ "id": id, "method": method, "params": params });

        let mut socket = self.socket.lock().await;
        if let Err(e) = socket.send(Message::Text(request.to_string())).await {
            return Err(self.lost(e.to_string()));
        }

        loop {
            let text = match socket.next().await {
                Some(Ok(Message::Text(text))) => text,
                Some(Ok(Message::Close(_))) | None => {
                    return Err(self.lost("DevTools socket closed".to_string()))
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(self.lost(e.to_string())),
            };

            if let Some(reply) = match_reply(id, &text) {
                return reply;
            }
        }
    }

    /// `Runtime.evaluate` with promise awaiting and by-value results
    pub async fn evaluate(&self, expression: &str) -> Result<Value, PageError> {
        let result = self
            .call(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "awaitPromise": true,
                    "returnByValue": true,
                }),
            )
            .await?;
        evaluation_value(result)
    }

    fn lost(&self, reason: String) -> PageError {
        self.alive.store(false, Ordering::SeqCst);
        PageError::Disconnected(reason)
    }
}

/// JS expression calling `window[function](argument)`
///
/// JSON string literals are valid JS string literals, so both names and
/// payload are embedded through `serde_json` quoting.
pub fn function_call_expression(function: &str, argument: &str) -> String {
    format!(
        "window[{}]({})",
        Value::String(function.to_string()),
        Value::String(argument.to_string())
    )
}

/// JS expression that is `true` once the extraction function is installed
pub fn function_ready_expression(function: &str) -> String {
    format!(
        "typeof window[{}] === 'function'",
        Value::String(function.to_string())
    )
}

/// `None` for events and replies to other commands
fn match_reply(id: u64, text: &str) -> Option<Result<Value, PageError>> {
    let message: Value = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => return Some(Err(PageError::Protocol(format!("bad DevTools frame: {}", e)))),
    };

    if message.get("id").and_then(Value::as_u64) != Some(id) {
        return None;
    }

    if let Some(error) = message.get("error") {
        let reason = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown DevTools error");
        return Some(Err(PageError::Protocol(reason.to_string())));
    }

    Some(Ok(message.get("result").cloned().unwrap_or(Value::Null)))
}

fn evaluation_value(result: Value) -> Result<Value, PageError> {
    if let Some(details) = result.get("exceptionDetails") {
        let description = details
            .pointer("/exception/description")
            .and_then(Value::as_str)
            .or_else(|| details.get("text").and_then(Value::as_str))
            .unwrap_or("script threw");
        return Err(PageError::Script(description.to_string()));
    }

    Ok(result.pointer("/result/value").cloned().unwrap_or(Value::Null))
}
