// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport session: owns the single chat socket.
//!
//! The [`Transport`] is a plain state machine driven by the session task. It
//! opens sockets through a [`Connector`], tracks `connecting → connected →
//! disconnected`, and keeps the reconnect deadline. Each socket is tagged
//! with a generation so events from a replaced socket are ignored.

pub mod ws;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::ClientError;
use crate::protocol::{encode_frame, ClientMessage};

/// Connection state as shown to the UI.
///
/// The transport itself only produces `Connecting`, `Connected` and
/// `Disconnected`; `Authenticated` is derived by the store once the
/// handshake is confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SocketState {
    Connecting,
    Connected,
    Authenticated,
    Disconnected,
}

impl SocketState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Authenticated => "authenticated",
            Self::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for SocketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw events reported by a socket task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Opened,
    Frame(String),
    Closed,
    Failed(String),
}

/// Channel socket tasks report on, tagged with their generation.
pub type SocketEvents = mpsc::UnboundedSender<(u64, SocketEvent)>;

/// Opens sockets. The production implementation is [`ws::WsConnector`].
pub trait Connector: Send + Sync + 'static {
    /// Start opening a socket. Progress is reported on `events`; frames
    /// pushed into the returned link's sender are written as text.
    fn open(&self, generation: u64, events: SocketEvents) -> Link;
}

/// Handle to one socket. Dropping it tears the socket down.
pub struct Link {
    outbound: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
}

impl Link {
    pub fn new(outbound: mpsc::UnboundedSender<String>, cancel: CancellationToken) -> Self {
        Self { outbound, cancel }
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// What the session needs to react to after a socket event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Opened,
    Frame(String),
    Down { reason: String },
}

pub struct Transport {
    connector: Arc<dyn Connector>,
    events: SocketEvents,
    link: Option<Link>,
    open: bool,
    generation: u64,
    state: SocketState,
    retry_delay: Duration,
    retry_at: Option<Instant>,
}

impl Transport {
    pub fn new(connector: Arc<dyn Connector>, events: SocketEvents, retry_delay: Duration) -> Self {
        Self {
            connector,
            events,
            link: None,
            open: false,
            generation: 0,
            state: SocketState::Disconnected,
            retry_delay,
            retry_at: None,
        }
    }

    pub fn state(&self) -> SocketState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Open a fresh socket, replacing any existing one.
    pub fn connect(&mut self) {
        self.retry_at = None;
        self.link = None;
        self.open = false;
        self.generation += 1;
        self.state = SocketState::Connecting;
        tracing::info!(generation = self.generation, "connecting chat socket");
        self.link = Some(self.connector.open(self.generation, self.events.clone()));
    }

    /// Tear the socket down without scheduling a retry.
    pub fn close(&mut self) {
        self.retry_at = None;
        if self.link.take().is_some() {
            tracing::info!(generation = self.generation, "chat socket closed");
        }
        self.open = false;
        self.state = SocketState::Disconnected;
    }

    /// Write one serialized frame.
    pub fn send(&self, raw: String) -> Result<(), ClientError> {
        match (&self.link, self.open) {
            (Some(link), true) => link.outbound.send(raw).map_err(|_| ClientError::NotConnected),
            _ => Err(ClientError::NotConnected),
        }
    }

    pub fn send_message(&self, msg: &ClientMessage) -> Result<(), ClientError> {
        self.send(encode_frame(msg, None)?)
    }

    /// Apply a socket event. Returns `None` for stale or collapsed events.
    pub fn handle_event(&mut self, generation: u64, event: SocketEvent) -> Option<Transition> {
        if generation != self.generation {
            tracing::debug!(generation, current = self.generation, "ignoring stale socket event");
            return None;
        }
        match event {
            SocketEvent::Opened => {
                self.open = true;
                self.state = SocketState::Connected;
                tracing::info!(generation, "chat socket connected");
                if let Err(e) = self.send_message(&ClientMessage::Ping) {
                    tracing::warn!(err = %e, "failed to send ping");
                }
                Some(Transition::Opened)
            }
            SocketEvent::Frame(text) => self.open.then_some(Transition::Frame(text)),
            SocketEvent::Closed => self.signal_disconnect("connection closed".to_owned()),
            SocketEvent::Failed(reason) => self.signal_disconnect(reason),
        }
    }

    /// Mark the socket lost and schedule a reconnect.
    ///
    /// Only the first signal after a live or connecting socket changes
    /// state; later ones fold into the already scheduled retry. Signals
    /// after an explicit close are ignored.
    pub fn signal_disconnect(&mut self, reason: String) -> Option<Transition> {
        if self.link.take().is_none() {
            return None;
        }
        self.open = false;
        self.state = SocketState::Disconnected;
        self.schedule_retry();
        tracing::warn!(generation = self.generation, reason = %reason, "chat socket lost");
        Some(Transition::Down { reason })
    }

    /// Schedule a reconnect at `retry_delay` from now unless one is pending.
    pub fn schedule_retry(&mut self) -> bool {
        if self.retry_at.is_some() {
            return false;
        }
        self.retry_at = Some(Instant::now() + self.retry_delay);
        tracing::debug!(delay_ms = self.retry_delay.as_millis() as u64, "reconnect scheduled");
        true
    }

    pub fn retry_deadline(&self) -> Option<Instant> {
        self.retry_at
    }

    /// Run the pending reconnect, if any.
    pub fn fire_retry(&mut self) -> bool {
        if self.retry_at.take().is_none() {
            return false;
        }
        self.connect();
        true
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
