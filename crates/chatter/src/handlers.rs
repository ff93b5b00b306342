// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Built-in reactions to server messages.
//!
//! Handlers mutate the store directly and queue follow-up messages on the
//! context's outbox; the session flushes the outbox once every handler for
//! the frame has run.

use crate::dispatch::{handler, Dispatcher};
use crate::error::ServerErrorKind;
use crate::events::NoticeLevel;
use crate::protocol::{ClientMessage, ServerMessage, ServerTag};
use crate::store::ConversationStore;

/// State handed to every handler.
pub struct HandlerContext {
    pub store: ConversationStore,
    outbox: Vec<ClientMessage>,
}

impl HandlerContext {
    pub fn new(store: ConversationStore) -> Self {
        Self { store, outbox: Vec::new() }
    }

    /// Queue a message for sending after dispatch.
    pub fn send(&mut self, msg: ClientMessage) {
        self.outbox.push(msg);
    }

    pub fn take_outbox(&mut self) -> Vec<ClientMessage> {
        std::mem::take(&mut self.outbox)
    }
}

/// Register the built-in handler for every tag.
pub fn register_defaults(dispatcher: &mut Dispatcher<HandlerContext>) {
    dispatcher.on(ServerTag::Pong, handler(on_pong));
    dispatcher.on(ServerTag::Authenticated, handler(on_authenticated));
    dispatcher.on(ServerTag::BulkUsers, handler(on_bulk_users));
    dispatcher.on(ServerTag::UserMeta, handler(on_user_meta));
    dispatcher.on(ServerTag::Error, handler(on_error));
    dispatcher.on(ServerTag::BulkMessages, handler(on_bulk_messages));
    dispatcher.on(ServerTag::DirectMessage, handler(on_direct_message));
}

fn on_pong(_ctx: &mut HandlerContext, _msg: &ServerMessage) -> anyhow::Result<()> {
    tracing::debug!("pong");
    Ok(())
}

fn on_authenticated(ctx: &mut HandlerContext, _msg: &ServerMessage) -> anyhow::Result<()> {
    tracing::info!(user = %ctx.store.self_id(), "chat authenticated");
    ctx.store.set_authenticated(true);
    ctx.send(ClientMessage::SyncChatUsers);
    Ok(())
}

fn on_bulk_users(ctx: &mut HandlerContext, msg: &ServerMessage) -> anyhow::Result<()> {
    let ServerMessage::BulkUsers { users } = msg else {
        return Ok(());
    };
    ctx.store.upsert_users(users);
    for user in users {
        ctx.send(ClientMessage::SyncChat { with: user.id.clone() });
    }
    tracing::debug!(count = users.len(), "directory synced");
    Ok(())
}

fn on_user_meta(ctx: &mut HandlerContext, msg: &ServerMessage) -> anyhow::Result<()> {
    if let ServerMessage::UserMeta { user } = msg {
        ctx.store.upsert_users([user]);
    }
    Ok(())
}

fn on_error(ctx: &mut HandlerContext, msg: &ServerMessage) -> anyhow::Result<()> {
    let ServerMessage::Error { kind } = msg else {
        return Ok(());
    };
    if *kind == ServerErrorKind::AlreadyAuthenticated {
        ctx.store.set_authenticated(true);
        return Ok(());
    }
    tracing::warn!(kind = %kind, "chat server error");
    ctx.store.notify(NoticeLevel::Error, "WS Error", kind.describe());
    Ok(())
}

fn on_bulk_messages(ctx: &mut HandlerContext, msg: &ServerMessage) -> anyhow::Result<()> {
    if let ServerMessage::BulkMessages { participants, messages } = msg {
        ctx.store.append_messages(participants, messages, true);
    }
    Ok(())
}

fn on_direct_message(ctx: &mut HandlerContext, msg: &ServerMessage) -> anyhow::Result<()> {
    let ServerMessage::DirectMessage { participants, message } = msg else {
        return Ok(());
    };
    let Some(peer) = ctx.store.append_messages(participants, std::slice::from_ref(message), false)
    else {
        anyhow::bail!("direct message without a peer: {participants:?}");
    };

    let unknown: Vec<String> = participants
        .iter()
        .filter(|p| p.as_str() != ctx.store.self_id() && !ctx.store.has_user(p))
        .cloned()
        .collect();
    for id in unknown {
        ctx.send(ClientMessage::UserMeta { with: id });
    }
    ctx.store.note_incoming(&peer);
    Ok(())
}

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod tests;
