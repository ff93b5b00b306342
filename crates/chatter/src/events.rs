// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Observer payloads published by the conversation store.
//!
//! UI code subscribes once and re-reads whatever part of the store an event
//! names. Events carry just enough to decide what to redraw.

use std::fmt;

use serde::Serialize;

use crate::transport::SocketState;

/// Severity of a user-visible notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Error,
    Warning,
    Info,
}

impl NoticeLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transient toast-style notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub id: u64,
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

/// Store change notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// Visible connection state changed (includes the derived
    /// `Authenticated` state).
    SocketState(SocketState),
    Authenticated(bool),
    UsersChanged,
    /// History for one peer changed. `replaced` is set when a bulk sync
    /// swapped out the whole history rather than appending.
    MessagesChanged { peer: String, replaced: bool },
    ActiveConversation(Option<String>),
    Unread(bool),
    Notice(Notice),
    /// Directory, histories and auth were cleared.
    Reset,
}
