// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error kinds the chat server reports in an `Error` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServerErrorKind {
    Internal,
    Unauthorized,
    AlreadyAuthenticated,
    InvalidUuid,
    InvalidSecret,
    InvalidMessage,
    InvalidUser,
    RateLimited,
}

impl ServerErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Internal => "INTERNAL",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::AlreadyAuthenticated => "ALREADY_AUTHENTICATED",
            Self::InvalidUuid => "INVALID_UUID",
            Self::InvalidSecret => "INVALID_SECRET",
            Self::InvalidMessage => "INVALID_MESSAGE",
            Self::InvalidUser => "INVALID_USER",
            Self::RateLimited => "RATE_LIMITED",
        }
    }

    /// Human-readable text for notices.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Internal => "the chat server hit an internal error",
            Self::Unauthorized => "not signed in to chat",
            Self::AlreadyAuthenticated => "this connection is already signed in",
            Self::InvalidUuid => "malformed user id",
            Self::InvalidSecret => "chat credentials were rejected",
            Self::InvalidMessage => "the message was rejected",
            Self::InvalidUser => "unknown user",
            Self::RateLimited => "sending too fast, slow down",
        }
    }
}

impl fmt::Display for ServerErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by the chat client runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// No socket is open.
    NotConnected,
    /// The socket closed while a request was outstanding.
    ConnectionLost,
    /// No reply arrived within the request timeout.
    Timeout,
    /// The server answered a request with an `Error` message.
    Server(ServerErrorKind),
    /// The reply had a different shape than the call site expected.
    UnexpectedReply(&'static str),
    /// An outgoing message could not be serialized.
    Encode(String),
    /// The session task has stopped.
    SessionClosed,
    Internal,
}

impl ClientError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotConnected => "NOT_CONNECTED",
            Self::ConnectionLost => "CONNECTION_LOST",
            Self::Timeout => "TIMEOUT",
            Self::Server(_) => "SERVER_ERROR",
            Self::UnexpectedReply(_) => "UNEXPECTED_REPLY",
            Self::Encode(_) => "ENCODE",
            Self::SessionClosed => "SESSION_CLOSED",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server(kind) => write!(f, "{}: {kind}", self.as_str()),
            Self::UnexpectedReply(tag) => write!(f, "{}: got {tag}", self.as_str()),
            Self::Encode(msg) => write!(f, "{}: {msg}", self.as_str()),
            other => f.write_str(other.as_str()),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        Self::Encode(e.to_string())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
