// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request/response correlation over the fire-and-forget socket.
//!
//! Requests are stamped with a random `request_id`; the server echoes it on
//! the reply. Pending entries leave the table exactly once: on the matching
//! reply, or rejected with [`ClientError::ConnectionLost`] when the socket
//! goes away. Entries whose caller gave up are pruned on the next request.

use std::collections::HashMap;
use std::marker::PhantomData;

use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::ClientError;
use crate::protocol::{encode_frame, ChatMessage, ChatUser, ClientMessage, ServerMessage};
use crate::transport::Transport;

type ReplySender = oneshot::Sender<Result<ServerMessage, ClientError>>;

/// A reply shape a call site can ask for.
pub trait Reply: Sized + Send + 'static {
    fn from_reply(msg: ServerMessage) -> Result<Self, ClientError>;
}

fn unexpected<T>(msg: &ServerMessage) -> Result<T, ClientError> {
    match msg {
        ServerMessage::Error { kind } => Err(ClientError::Server(*kind)),
        other => Err(ClientError::UnexpectedReply(other.tag().as_str())),
    }
}

impl Reply for ServerMessage {
    fn from_reply(msg: ServerMessage) -> Result<Self, ClientError> {
        match msg {
            ServerMessage::Error { kind } => Err(ClientError::Server(kind)),
            other => Ok(other),
        }
    }
}

/// Reply to `Ping`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pong;

impl Reply for Pong {
    fn from_reply(msg: ServerMessage) -> Result<Self, ClientError> {
        match msg {
            ServerMessage::Pong => Ok(Pong),
            other => unexpected(&other),
        }
    }
}

/// Reply to `Authenticate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Authenticated;

impl Reply for Authenticated {
    fn from_reply(msg: ServerMessage) -> Result<Self, ClientError> {
        match msg {
            ServerMessage::Authenticated => Ok(Authenticated),
            other => unexpected(&other),
        }
    }
}

/// Reply to `UserMeta`.
impl Reply for ChatUser {
    fn from_reply(msg: ServerMessage) -> Result<Self, ClientError> {
        match msg {
            ServerMessage::UserMeta { user } => Ok(user),
            other => unexpected(&other),
        }
    }
}

/// Reply to `SyncChatUsers`.
impl Reply for Vec<ChatUser> {
    fn from_reply(msg: ServerMessage) -> Result<Self, ClientError> {
        match msg {
            ServerMessage::BulkUsers { users } => Ok(users),
            other => unexpected(&other),
        }
    }
}

/// Reply to `SyncChat`: the full history with one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    pub participants: Vec<String>,
    pub messages: Vec<ChatMessage>,
}

impl Reply for History {
    fn from_reply(msg: ServerMessage) -> Result<Self, ClientError> {
        match msg {
            ServerMessage::BulkMessages { participants, messages } => {
                Ok(History { participants, messages })
            }
            other => unexpected(&other),
        }
    }
}

/// An outstanding request, typed by the reply the caller expects.
pub struct PendingReply<R = ServerMessage> {
    id: String,
    rx: oneshot::Receiver<Result<ServerMessage, ClientError>>,
    _reply: PhantomData<fn() -> R>,
}

impl<R: Reply> PendingReply<R> {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Re-type the pending reply for a different call site.
    pub fn expect<T: Reply>(self) -> PendingReply<T> {
        PendingReply { id: self.id, rx: self.rx, _reply: PhantomData }
    }

    /// Wait for the reply.
    pub async fn recv(self) -> Result<R, ClientError> {
        match self.rx.await {
            Ok(Ok(msg)) => R::from_reply(msg),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ClientError::ConnectionLost),
        }
    }
}

/// Correlation id → resolver.
#[derive(Default)]
pub struct PendingRequests {
    pending: HashMap<String, ReplySender>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }

    /// Send `msg` as a request and register its resolver.
    ///
    /// Fails with `NotConnected` before touching the table when no socket
    /// is open.
    pub fn send_request<R: Reply>(
        &mut self,
        transport: &Transport,
        msg: &ClientMessage,
    ) -> Result<PendingReply<R>, ClientError> {
        if !transport.is_open() {
            return Err(ClientError::NotConnected);
        }
        self.pending.retain(|_, tx| !tx.is_closed());

        let id = Uuid::new_v4().to_string();
        transport.send(encode_frame(msg, Some(&id))?)?;

        let (tx, rx) = oneshot::channel();
        self.pending.insert(id.clone(), tx);
        tracing::debug!(request_id = %id, kind = msg.tag(), "request sent");
        Ok(PendingReply { id, rx, _reply: PhantomData })
    }

    /// Resolve the entry for `id`. Returns whether one was pending.
    pub fn resolve(&mut self, id: &str, msg: &ServerMessage) -> bool {
        let Some(tx) = self.pending.remove(id) else {
            return false;
        };
        if tx.send(Ok(msg.clone())).is_err() {
            tracing::debug!(request_id = %id, "reply arrived after caller gave up");
        }
        true
    }

    /// Fail the entry for `id` with `err`. Returns whether one was pending.
    pub fn reject(&mut self, id: &str, err: ClientError) -> bool {
        let Some(tx) = self.pending.remove(id) else {
            return false;
        };
        let _ = tx.send(Err(err));
        true
    }

    /// Reject every pending entry with `err`. Returns how many there were.
    pub fn reject_all(&mut self, err: ClientError) -> usize {
        let count = self.pending.len();
        for (_, tx) in self.pending.drain() {
            let _ = tx.send(Err(err.clone()));
        }
        if count > 0 {
            tracing::debug!(count, err = %err, "rejected pending requests");
        }
        count
    }
}

#[cfg(test)]
#[path = "correlator_tests.rs"]
mod tests;
