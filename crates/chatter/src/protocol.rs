// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire types for the chat protocol.
//!
//! Every frame is one JSON text message, internally tagged by `type`
//! (`{"type": "DirectMessage", ...}`). Requests that expect a reply carry an
//! extra top-level `request_id` which the server echoes back.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ClientError, ServerErrorKind};

/// Top-level field holding the correlation id.
pub const REQUEST_ID_FIELD: &str = "request_id";

/// One entry in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChatMessage {
    User { from: String, message: String },
    Topic { topic: String },
    Server { message: String },
}

/// A directory entry. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUser {
    pub id: String,
    pub email: String,
}

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    Pong,
    Authenticated,
    Error { kind: ServerErrorKind },
    BulkUsers { users: Vec<ChatUser> },
    UserMeta { user: ChatUser },
    BulkMessages { participants: Vec<String>, messages: Vec<ChatMessage> },
    DirectMessage { participants: Vec<String>, message: ChatMessage },
}

impl ServerMessage {
    pub fn tag(&self) -> ServerTag {
        match self {
            Self::Pong => ServerTag::Pong,
            Self::Authenticated => ServerTag::Authenticated,
            Self::Error { .. } => ServerTag::Error,
            Self::BulkUsers { .. } => ServerTag::BulkUsers,
            Self::UserMeta { .. } => ServerTag::UserMeta,
            Self::BulkMessages { .. } => ServerTag::BulkMessages,
            Self::DirectMessage { .. } => ServerTag::DirectMessage,
        }
    }
}

/// Discriminant of [`ServerMessage`], used as the dispatch key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerTag {
    Pong,
    Authenticated,
    Error,
    BulkUsers,
    UserMeta,
    BulkMessages,
    DirectMessage,
}

impl ServerTag {
    pub const ALL: [ServerTag; 7] = [
        Self::Pong,
        Self::Authenticated,
        Self::Error,
        Self::BulkUsers,
        Self::UserMeta,
        Self::BulkMessages,
        Self::DirectMessage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pong => "Pong",
            Self::Authenticated => "Authenticated",
            Self::Error => "Error",
            Self::BulkUsers => "BulkUsers",
            Self::UserMeta => "UserMeta",
            Self::BulkMessages => "BulkMessages",
            Self::DirectMessage => "DirectMessage",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == tag)
    }
}

impl fmt::Display for ServerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    Ping,
    Disconnect,
    Authenticate { id: String, secret: String },
    SyncChat { with: String },
    SyncChatUsers,
    DirectMessage { to: String, message: String },
    SetTopic { to: String, topic: String },
    UserMeta { with: String },
}

impl ClientMessage {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Ping => "Ping",
            Self::Disconnect => "Disconnect",
            Self::Authenticate { .. } => "Authenticate",
            Self::SyncChat { .. } => "SyncChat",
            Self::SyncChatUsers => "SyncChatUsers",
            Self::DirectMessage { .. } => "DirectMessage",
            Self::SetTopic { .. } => "SetTopic",
            Self::UserMeta { .. } => "UserMeta",
        }
    }
}

// Keeps secrets out of logs.
impl fmt::Debug for ClientMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authenticate { id, .. } => f
                .debug_struct("Authenticate")
                .field("id", id)
                .field("secret", &"<redacted>")
                .finish(),
            Self::SyncChat { with } => f.debug_struct("SyncChat").field("with", with).finish(),
            Self::DirectMessage { to, message } => {
                f.debug_struct("DirectMessage").field("to", to).field("message", message).finish()
            }
            Self::SetTopic { to, topic } => {
                f.debug_struct("SetTopic").field("to", to).field("topic", topic).finish()
            }
            Self::UserMeta { with } => f.debug_struct("UserMeta").field("with", with).finish(),
            other => f.write_str(other.tag()),
        }
    }
}

// ---------------------------------------------------------------------------
// Framing
// ---------------------------------------------------------------------------

/// Serialize a client message, stamping `request_id` when given.
pub fn encode_frame(msg: &ClientMessage, request_id: Option<&str>) -> Result<String, ClientError> {
    let mut value = serde_json::to_value(msg)?;
    if let (Some(rid), Some(obj)) = (request_id, value.as_object_mut()) {
        obj.insert(REQUEST_ID_FIELD.to_owned(), Value::String(rid.to_owned()));
    }
    Ok(serde_json::to_string(&value)?)
}

/// A decoded server frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Incoming {
    pub request_id: Option<String>,
    pub body: Inbound,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Known(ServerMessage),
    /// A well-formed frame whose tag this client does not know.
    Unknown(String),
}

/// Why a frame was dropped.
#[derive(Debug)]
pub enum DecodeError {
    Json(serde_json::Error),
    MissingTag,
    Invalid { tag: ServerTag, err: serde_json::Error },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(e) => write!(f, "invalid json: {e}"),
            Self::MissingTag => f.write_str("frame has no string `type` field"),
            Self::Invalid { tag, err } => write!(f, "invalid {tag} frame: {err}"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Decode one text frame.
///
/// Unknown tags are not an error; they decode to [`Inbound::Unknown`].
pub fn decode_frame(text: &str) -> Result<Incoming, DecodeError> {
    let mut value: Value = serde_json::from_str(text).map_err(DecodeError::Json)?;
    let obj = value.as_object_mut().ok_or(DecodeError::MissingTag)?;
    let request_id = match obj.remove(REQUEST_ID_FIELD) {
        Some(Value::String(rid)) => Some(rid),
        _ => None,
    };
    let tag_str = obj.get("type").and_then(Value::as_str).ok_or(DecodeError::MissingTag)?;

    let Some(tag) = ServerTag::parse(tag_str) else {
        return Ok(Incoming { request_id, body: Inbound::Unknown(tag_str.to_owned()) });
    };

    let message = serde_json::from_value::<ServerMessage>(value)
        .map_err(|err| DecodeError::Invalid { tag, err })?;
    Ok(Incoming { request_id, body: Inbound::Known(message) })
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
