// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory [`Connector`] for driving the runtime without a network.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::transport::{Connector, Link, SocketEvent, SocketEvents};

/// Records every socket the transport asks for.
#[derive(Clone, Default)]
pub struct FakeConnector {
    sockets: Arc<Mutex<Vec<FakeSocket>>>,
    opened: Arc<AtomicU64>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of connection attempts so far.
    pub fn opened(&self) -> u64 {
        self.opened.load(Ordering::SeqCst)
    }

    /// Remove and return the most recently opened socket.
    pub fn take_latest(&self) -> Option<FakeSocket> {
        self.sockets.lock().pop()
    }
}

impl Connector for FakeConnector {
    fn open(&self, generation: u64, events: SocketEvents) -> Link {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.sockets.lock().push(FakeSocket {
            generation,
            events,
            outbound: rx,
            cancel: cancel.clone(),
        });
        Link::new(tx, cancel)
    }
}

/// The server side of one fake socket.
pub struct FakeSocket {
    pub generation: u64,
    events: SocketEvents,
    outbound: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
}

impl FakeSocket {
    pub fn accept(&self) {
        self.emit(SocketEvent::Opened);
    }

    /// Deliver a server frame.
    pub fn push(&self, frame: Value) {
        self.emit(SocketEvent::Frame(frame.to_string()));
    }

    pub fn push_raw(&self, frame: &str) {
        self.emit(SocketEvent::Frame(frame.to_owned()));
    }

    pub fn hang_up(&self) {
        self.emit(SocketEvent::Closed);
    }

    pub fn fail(&self, reason: &str) {
        self.emit(SocketEvent::Failed(reason.to_owned()));
    }

    pub fn emit(&self, event: SocketEvent) {
        let _ = self.events.send((self.generation, event));
    }

    /// Drain frames the client has written so far.
    pub fn sent(&mut self) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(text) = self.outbound.try_recv() {
            if let Ok(value) = serde_json::from_str(&text) {
                frames.push(value);
            }
        }
        frames
    }

    /// Drain written frames and return just their `type` tags.
    pub fn sent_types(&mut self) -> Vec<String> {
        self.sent()
            .iter()
            .filter_map(|v| v.get("type").and_then(Value::as_str).map(str::to_owned))
            .collect()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
#[path = "test_support_tests.rs"]
mod tests;
