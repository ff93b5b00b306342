// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket connector over tokio-tungstenite.
//!
//! Each opened socket runs in its own task which forwards queued frames to
//! the server and reports inbound text frames, hang-ups and errors back to
//! the session. Cancelling the link closes the socket silently.

use std::sync::Once;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::{Connector, Link, SocketEvent, SocketEvents};

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider so `wss://` endpoints work.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Opens real WebSocket connections to a fixed endpoint.
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: &str) -> Self {
        ensure_crypto();
        Self { url: build_ws_url(url) }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Connector for WsConnector {
    fn open(&self, generation: u64, events: SocketEvents) -> Link {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        tokio::spawn(run_socket(self.url.clone(), generation, events, rx, cancel.clone()));
        Link::new(tx, cancel)
    }
}

async fn run_socket(
    url: String,
    generation: u64,
    events: SocketEvents,
    mut outbound: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
) {
    let connected = tokio::select! {
        _ = cancel.cancelled() => return,
        res = tokio_tungstenite::connect_async(url.as_str()) => res,
    };
    let ws_stream = match connected {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            tracing::debug!(generation, url = %url, err = %e, "chat socket connect failed");
            let _ = events.send((generation, SocketEvent::Failed(e.to_string())));
            return;
        }
    };
    let _ = events.send((generation, SocketEvent::Opened));

    let (mut write, mut read) = ws_stream.split();

    let ended = loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                return;
            }
            frame = outbound.recv() => {
                let Some(text) = frame else {
                    let _ = write.send(Message::Close(None)).await;
                    return;
                };
                if let Err(e) = write.send(Message::Text(text.into())).await {
                    break SocketEvent::Failed(e.to_string());
                }
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let _ = events.send((generation, SocketEvent::Frame(text.to_string())));
                    }
                    Some(Ok(Message::Close(_))) | None => break SocketEvent::Closed,
                    Some(Ok(_)) => {} // Ignore binary, ping, pong.
                    Some(Err(e)) => break SocketEvent::Failed(e.to_string()),
                }
            }
        }
    };

    tracing::debug!(generation, event = ?ended, "chat socket ended");
    let _ = events.send((generation, ended));
}

/// Build a WebSocket URL, accepting `http(s)://` bases as well.
pub fn build_ws_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if base.starts_with("ws://") || base.starts_with("wss://") {
        base.to_owned()
    } else {
        format!("ws://{base}")
    }
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
