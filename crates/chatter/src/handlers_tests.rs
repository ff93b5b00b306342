// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::protocol::{ChatMessage, ChatUser};
use crate::transport::SocketState;

fn setup() -> (Dispatcher<HandlerContext>, HandlerContext) {
    let mut dispatcher = Dispatcher::new();
    register_defaults(&mut dispatcher);
    let mut store = ConversationStore::new(16);
    store.set_self_id("A");
    store.set_socket_state(SocketState::Connected);
    (dispatcher, HandlerContext::new(store))
}

fn user(id: &str) -> ChatUser {
    ChatUser { id: id.to_owned(), email: format!("{}@x", id.to_lowercase()) }
}

fn dm(from: &str, to: &str, body: &str) -> ServerMessage {
    ServerMessage::DirectMessage {
        participants: vec![from.to_owned(), to.to_owned()],
        message: ChatMessage::User { from: from.to_owned(), message: body.to_owned() },
    }
}

#[test]
fn every_tag_has_a_default() {
    let (dispatcher, _) = setup();
    for tag in ServerTag::ALL {
        assert_eq!(dispatcher.handler_count(tag), 1, "{tag}");
    }
}

#[test]
fn authenticated_marks_store_and_syncs_users() {
    let (dispatcher, mut ctx) = setup();
    dispatcher.dispatch(&mut ctx, &ServerMessage::Authenticated);

    assert!(ctx.store.is_authenticated());
    assert_eq!(ctx.store.socket_state(), SocketState::Authenticated);
    assert_eq!(ctx.take_outbox(), vec![ClientMessage::SyncChatUsers]);
    assert!(ctx.take_outbox().is_empty());
}

#[test]
fn bulk_users_upserts_and_syncs_each_chat() {
    let (dispatcher, mut ctx) = setup();
    dispatcher.dispatch(&mut ctx, &ServerMessage::BulkUsers { users: vec![user("U1"), user("U2")] });

    assert!(ctx.store.has_user("U1"));
    assert!(ctx.store.has_user("U2"));
    assert_eq!(
        ctx.take_outbox(),
        vec![
            ClientMessage::SyncChat { with: "U1".to_owned() },
            ClientMessage::SyncChat { with: "U2".to_owned() },
        ]
    );
}

#[test]
fn user_meta_upserts() {
    let (dispatcher, mut ctx) = setup();
    dispatcher.dispatch(&mut ctx, &ServerMessage::UserMeta { user: user("U9") });
    assert_eq!(ctx.store.user_email("U9"), Some("u9@x"));
    assert!(ctx.take_outbox().is_empty());
}

#[test]
fn already_authenticated_counts_as_confirmation() {
    let (dispatcher, mut ctx) = setup();
    let mut rx = ctx.store.subscribe();
    dispatcher.dispatch(&mut ctx, &ServerMessage::Error { kind: ServerErrorKind::AlreadyAuthenticated });

    assert!(ctx.store.is_authenticated());
    let mut notices = 0;
    while let Ok(ev) = rx.try_recv() {
        if matches!(ev, crate::events::StoreEvent::Notice(_)) {
            notices += 1;
        }
    }
    assert_eq!(notices, 0);
}

#[test]
fn other_errors_raise_a_notice() {
    let (dispatcher, mut ctx) = setup();
    let mut rx = ctx.store.subscribe();
    dispatcher.dispatch(&mut ctx, &ServerMessage::Error { kind: ServerErrorKind::RateLimited });

    assert!(!ctx.store.is_authenticated());
    let notice = std::iter::from_fn(|| rx.try_recv().ok()).find_map(|ev| match ev {
        crate::events::StoreEvent::Notice(n) => Some(n),
        _ => None,
    });
    let Some(notice) = notice else {
        panic!("expected a notice");
    };
    assert_eq!(notice.level, NoticeLevel::Error);
    assert_eq!(notice.message, ServerErrorKind::RateLimited.describe());
}

#[test]
fn bulk_messages_replace_history() {
    let (dispatcher, mut ctx) = setup();
    dispatcher.dispatch(&mut ctx, &dm("U1", "A", "stale"));
    let history = vec![ChatMessage::Topic { topic: "listing".to_owned() }];
    dispatcher.dispatch(
        &mut ctx,
        &ServerMessage::BulkMessages {
            participants: vec!["A".to_owned(), "U1".to_owned()],
            messages: history.clone(),
        },
    );
    assert_eq!(ctx.store.messages("U1"), history.as_slice());
}

#[test]
fn direct_message_from_unknown_peer_requests_meta_and_sets_unread() {
    let (dispatcher, mut ctx) = setup();
    dispatcher.dispatch(&mut ctx, &dm("U1", "A", "hello"));

    assert_eq!(ctx.take_outbox(), vec![ClientMessage::UserMeta { with: "U1".to_owned() }]);
    assert!(ctx.store.unread());
    assert_eq!(ctx.store.messages("U1").len(), 1);
}

#[test]
fn direct_message_from_known_active_peer_is_quiet() {
    let (dispatcher, mut ctx) = setup();
    ctx.store.upsert_users([&user("U1")]);
    ctx.store.start_conversation("U1", None);

    dispatcher.dispatch(&mut ctx, &dm("U1", "A", "hello"));
    assert!(ctx.take_outbox().is_empty());
    assert!(!ctx.store.unread());
}

#[test]
fn self_chat_direct_message_is_dropped() {
    let (dispatcher, mut ctx) = setup();
    dispatcher.dispatch(&mut ctx, &dm("A", "A", "note to self"));
    assert!(ctx.store.snapshot().conversations.is_empty());
    assert!(ctx.take_outbox().is_empty());
}
