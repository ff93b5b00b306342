// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Conversation state: auth flag, user directory, per-peer histories.
//!
//! All mutation goes through the methods below; each publishes a
//! [`StoreEvent`] to subscribers. Histories are append-only in arrival
//! order, with no deduplication.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tokio::sync::broadcast;

use crate::events::{Notice, NoticeLevel, StoreEvent};
use crate::protocol::{ChatMessage, ChatUser, ClientMessage};
use crate::transport::SocketState;

/// Peer a message pair is filed under, seen from `self_id`.
///
/// For `[from, to]` the key is `to` when `from` is us, else `from`. Returns
/// `None` when that would be our own id, or when we have no identity.
pub fn conversation_key<'a>(self_id: &str, participants: &'a [String]) -> Option<&'a str> {
    if self_id.is_empty() {
        return None;
    }
    let key = match participants {
        [from, to, ..] if from == self_id => to,
        [from, ..] if from != self_id => from,
        _ => return None,
    };
    (key != self_id).then_some(key.as_str())
}

/// Point-in-time copy of the store for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreSnapshot {
    pub socket_state: SocketState,
    pub authenticated: bool,
    pub self_id: String,
    pub users: BTreeMap<String, String>,
    pub conversations: BTreeMap<String, Vec<ChatMessage>>,
    pub active: Option<String>,
    pub unread: bool,
}

pub struct ConversationStore {
    self_id: String,
    transport_state: SocketState,
    authenticated: bool,
    users: BTreeMap<String, String>,
    messages: HashMap<String, Vec<ChatMessage>>,
    active: Option<String>,
    unread: bool,
    next_notice: u64,
    events: broadcast::Sender<StoreEvent>,
}

impl ConversationStore {
    pub fn new(event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            self_id: String::new(),
            transport_state: SocketState::Disconnected,
            authenticated: false,
            users: BTreeMap::new(),
            messages: HashMap::new(),
            active: None,
            unread: false,
            next_notice: 0,
            events,
        }
    }

    /// Subscribe to change events.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// A sender handle so subscribers can attach without touching the store.
    pub fn event_sender(&self) -> broadcast::Sender<StoreEvent> {
        self.events.clone()
    }

    fn emit(&self, event: StoreEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    // -- identity / connection ------------------------------------------------

    pub fn self_id(&self) -> &str {
        &self.self_id
    }

    pub fn set_self_id(&mut self, id: &str) {
        self.self_id = id.to_owned();
    }

    /// Visible connection state, with `Authenticated` derived from the
    /// transport being connected and the handshake confirmed.
    pub fn socket_state(&self) -> SocketState {
        match self.transport_state {
            SocketState::Connected if self.authenticated => SocketState::Authenticated,
            other => other,
        }
    }

    /// Record the transport's state. Leaving `Connected` drops auth since
    /// authentication is per socket.
    pub fn set_socket_state(&mut self, state: SocketState) {
        let before = self.socket_state();
        self.transport_state = state;
        if state != SocketState::Connected && self.authenticated {
            self.authenticated = false;
            self.emit(StoreEvent::Authenticated(false));
        }
        let after = self.socket_state();
        if after != before {
            self.emit(StoreEvent::SocketState(after));
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn set_authenticated(&mut self, authenticated: bool) {
        if self.authenticated == authenticated {
            return;
        }
        let before = self.socket_state();
        self.authenticated = authenticated;
        self.emit(StoreEvent::Authenticated(authenticated));
        let after = self.socket_state();
        if after != before {
            self.emit(StoreEvent::SocketState(after));
        }
    }

    // -- directory ------------------------------------------------------------

    /// Merge users by id, overwriting the email of known ones.
    pub fn upsert_users<'a>(&mut self, users: impl IntoIterator<Item = &'a ChatUser>) {
        let mut changed = false;
        for user in users {
            let previous = self.users.insert(user.id.clone(), user.email.clone());
            changed |= previous.as_deref() != Some(user.email.as_str());
        }
        if changed {
            self.emit(StoreEvent::UsersChanged);
        }
    }

    pub fn has_user(&self, id: &str) -> bool {
        self.users.contains_key(id)
    }

    pub fn user_email(&self, id: &str) -> Option<&str> {
        self.users.get(id).map(String::as_str)
    }

    pub fn users(&self) -> &BTreeMap<String, String> {
        &self.users
    }

    // -- histories ------------------------------------------------------------

    pub fn conversation_key<'a>(&self, participants: &'a [String]) -> Option<&'a str> {
        conversation_key(&self.self_id, participants)
    }

    /// File `messages` under the peer derived from `participants`. With
    /// `clear` the history becomes exactly `messages`. Returns the peer key,
    /// or `None` if no peer could be derived.
    pub fn append_messages(
        &mut self,
        participants: &[String],
        messages: &[ChatMessage],
        clear: bool,
    ) -> Option<String> {
        let Some(peer) = self.conversation_key(participants) else {
            tracing::warn!(?participants, self_id = %self.self_id, "no peer for message, dropping");
            return None;
        };
        let peer = peer.to_owned();
        let history = self.messages.entry(peer.clone()).or_default();
        if clear {
            history.clear();
        }
        history.extend_from_slice(messages);
        self.emit(StoreEvent::MessagesChanged { peer: peer.clone(), replaced: clear });
        Some(peer)
    }

    pub fn messages(&self, peer: &str) -> &[ChatMessage] {
        self.messages.get(peer).map(Vec::as_slice).unwrap_or_default()
    }

    // -- active conversation --------------------------------------------------

    /// Open the conversation with `peer`. Returns the messages to send: a
    /// metadata request and, for a non-empty topic, the topic change.
    pub fn start_conversation(&mut self, peer: &str, topic: Option<&str>) -> Vec<ClientMessage> {
        self.active = Some(peer.to_owned());
        self.emit(StoreEvent::ActiveConversation(self.active.clone()));
        self.set_unread(false);

        let mut outgoing = vec![ClientMessage::UserMeta { with: peer.to_owned() }];
        if let Some(topic) = topic.filter(|t| !t.is_empty()) {
            outgoing
                .push(ClientMessage::SetTopic { to: peer.to_owned(), topic: topic.to_owned() });
        }
        tracing::info!(peer = %peer, "starting chat");
        outgoing
    }

    pub fn close_conversation(&mut self) {
        if self.active.take().is_some() {
            self.emit(StoreEvent::ActiveConversation(None));
        }
    }

    pub fn active_conversation(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn unread(&self) -> bool {
        self.unread
    }

    pub fn set_unread(&mut self, unread: bool) {
        if self.unread != unread {
            self.unread = unread;
            self.emit(StoreEvent::Unread(unread));
        }
    }

    /// Flag unread unless `peer` is the open conversation.
    pub fn note_incoming(&mut self, peer: &str) {
        if self.active.as_deref() != Some(peer) {
            self.set_unread(true);
        }
    }

    // -- notices --------------------------------------------------------------

    pub fn notify(&mut self, level: NoticeLevel, title: &str, message: &str) -> Notice {
        self.next_notice += 1;
        let notice = Notice {
            id: self.next_notice,
            level,
            title: title.to_owned(),
            message: message.to_owned(),
        };
        self.emit(StoreEvent::Notice(notice.clone()));
        notice
    }

    // -- lifecycle ------------------------------------------------------------

    /// Clear auth, directory, histories and the open conversation.
    pub fn reset(&mut self) {
        self.set_authenticated(false);
        self.users.clear();
        self.messages.clear();
        self.close_conversation();
        self.set_unread(false);
        self.emit(StoreEvent::Reset);
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            socket_state: self.socket_state(),
            authenticated: self.authenticated,
            self_id: self.self_id.clone(),
            users: self.users.clone(),
            conversations: self.messages.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            active: self.active.clone(),
            unread: self.unread,
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
