// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use super::*;
use crate::config::ClientConfig;
use crate::events::{Notice, NoticeLevel};
use crate::test_support::FakeConnector;
use crate::transport::SocketState;

fn open(peer: &str, topic: Option<&str>) -> ConsoleCommand {
    ConsoleCommand::Open { peer: peer.to_owned(), topic: topic.map(str::to_owned) }
}

#[yare::parameterized(
    open_peer        = { "/open U1", open("U1", None) },
    open_with_topic  = { "/open U1 red bike, barely used", open("U1", Some("red bike, barely used")) },
    open_padded      = { "  /open   U1   hi  ", open("U1", Some("hi")) },
    close            = { "/close", ConsoleCommand::Close },
    topic            = { "/topic price drop", ConsoleCommand::Topic("price drop".to_owned()) },
    users            = { "/users", ConsoleCommand::Users },
    history          = { "/history", ConsoleCommand::History },
    help             = { "/help", ConsoleCommand::Help },
    quit             = { "/quit", ConsoleCommand::Quit },
    exit_alias       = { "/exit", ConsoleCommand::Quit },
    plain_text       = { "is it still available?", ConsoleCommand::Say("is it still available?".to_owned()) },
    blank            = { "   ", ConsoleCommand::Empty },
)]
fn parses(line: &str, expected: ConsoleCommand) {
    assert_eq!(parse_line(line).ok(), Some(expected));
}

#[yare::parameterized(
    open_without_peer = { "/open", "usage: /open" },
    topic_without_text = { "/topic", "usage: /topic" },
    unknown = { "/dance", "unknown command /dance" },
)]
fn rejects(line: &str, expected_substr: &str) {
    let err = parse_line(line).err().map(|e| e.to_string()).unwrap_or_default();
    assert!(err.contains(expected_substr), "{err:?} should contain {expected_substr:?}");
}

#[test]
fn formats_messages_from_the_reader_side() {
    let users = BTreeMap::from([("U1".to_owned(), "seller@x".to_owned())]);
    let user = |from: &str, body: &str| ChatMessage::User { from: from.to_owned(), message: body.to_owned() };

    assert_eq!(format_message(&user("A", "hi"), "A", &users), "you: hi");
    assert_eq!(format_message(&user("U1", "hey"), "A", &users), "seller@x: hey");
    assert_eq!(format_message(&user("U2", "yo"), "A", &users), "U2: yo");
    assert_eq!(
        format_message(&ChatMessage::Topic { topic: "bike".to_owned() }, "A", &users),
        "-- topic: bike --"
    );
    assert_eq!(
        format_message(&ChatMessage::Server { message: "restarting".to_owned() }, "A", &users),
        "[server] restarting"
    );
}

fn snapshot(active: Option<&str>, history: &[&str]) -> StoreSnapshot {
    let messages = history
        .iter()
        .map(|m| ChatMessage::User { from: "U1".to_owned(), message: (*m).to_owned() })
        .collect();
    StoreSnapshot {
        socket_state: SocketState::Authenticated,
        authenticated: true,
        self_id: "A".to_owned(),
        users: BTreeMap::new(),
        conversations: BTreeMap::from([("U1".to_owned(), messages)]),
        active: active.map(str::to_owned),
        unread: false,
    }
}

#[test]
fn view_prints_only_new_lines() {
    let mut view = ConsoleView::default();
    assert_eq!(view.unseen(&snapshot(Some("U1"), &["a", "b"])), vec!["U1: a", "U1: b"]);
    assert_eq!(view.unseen(&snapshot(Some("U1"), &["a", "b", "c"])), vec!["U1: c"]);
    assert!(view.unseen(&snapshot(Some("U1"), &["a", "b", "c"])).is_empty());
}

#[test]
fn view_reprints_replaced_history() {
    let mut view = ConsoleView::default();
    view.unseen(&snapshot(Some("U1"), &["a", "b", "c"]));
    assert_eq!(view.unseen(&snapshot(Some("U1"), &["z"])), vec!["U1: z"]);
}

#[test]
fn view_reprints_same_length_replacement_after_restart() {
    let mut view = ConsoleView::default();
    view.unseen(&snapshot(Some("U1"), &["a", "b"]));
    view.restart("U1");
    assert_eq!(view.unseen(&snapshot(Some("U1"), &["x", "y"])), vec!["U1: x", "U1: y"]);
}

#[tokio::test(start_paused = true)]
async fn console_reprints_history_replaced_by_sync() -> anyhow::Result<()> {
    let connector = FakeConnector::new();
    let config = ClientConfig {
        user_id: Some("A".to_owned()),
        secret: Some("s".to_owned()),
        ..ClientConfig::default()
    };
    let client = ChatClient::spawn(&config, Arc::new(connector.clone()));
    client.connect()?;
    client.snapshot().await?;
    let sock = connector.take_latest().ok_or_else(|| anyhow::anyhow!("no socket"))?;
    sock.accept();
    client.start_conversation("U1", None).await?;
    let history = |bodies: &[&str]| {
        serde_json::json!({
            "type": "BulkMessages",
            "participants": ["A", "U1"],
            "messages": bodies
                .iter()
                .map(|b| serde_json::json!({ "type": "User", "from": "U1", "message": b }))
                .collect::<Vec<_>>(),
        })
    };

    let (tx, rx) = tokio::io::duplex(64);
    let mut out = Vec::new();
    let console = run_console(&client, tokio::io::BufReader::new(rx), &mut out);
    let feed = async {
        sock.push(history(&["a", "b"]));
        client.snapshot().await?;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        sock.push(history(&["x", "y"]));
        client.snapshot().await?;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        drop(tx);
        Ok::<_, anyhow::Error>(())
    };
    let (ran, fed) = tokio::join!(console, feed);
    ran?;
    fed?;

    let text = String::from_utf8(out)?;
    for line in ["U1: a", "U1: b", "U1: x", "U1: y"] {
        assert!(text.contains(line), "{line:?} missing from {text}");
    }
    Ok(())
}

#[test]
fn view_ignores_without_active_conversation() {
    let mut view = ConsoleView::default();
    assert!(view.unseen(&snapshot(None, &["a"])).is_empty());
    assert_eq!(view.full(&snapshot(Some("U1"), &["a"])), vec!["U1: a"]);
    assert_eq!(view.full(&snapshot(Some("U1"), &["a"])), vec!["U1: a"]);
}

#[yare::parameterized(
    state    = { StoreEvent::SocketState(SocketState::Connecting), Some("* connection connecting") },
    active   = { StoreEvent::ActiveConversation(Some("U1".to_owned())), Some("* chatting with U1") },
    closed   = { StoreEvent::ActiveConversation(None), Some("* conversation closed") },
    unread   = { StoreEvent::Unread(true), Some("* new messages in another conversation") },
    read     = { StoreEvent::Unread(false), None },
    users    = { StoreEvent::UsersChanged, None },
)]
fn describes_events(event: StoreEvent, expected: Option<&str>) {
    assert_eq!(describe_event(&event).as_deref(), expected);
}

#[test]
fn describes_notices() {
    let notice = |message: &str| {
        StoreEvent::Notice(Notice {
            id: 1,
            level: NoticeLevel::Error,
            title: "WS Error".to_owned(),
            message: message.to_owned(),
        })
    };
    assert_eq!(describe_event(&notice("slow down")).as_deref(), Some("! WS Error: slow down"));
    assert_eq!(describe_event(&notice("")).as_deref(), Some("! WS Error"));
}

#[tokio::test(start_paused = true)]
async fn console_drives_the_client() -> anyhow::Result<()> {
    let connector = FakeConnector::new();
    let config = ClientConfig {
        user_id: Some("A".to_owned()),
        secret: Some("s".to_owned()),
        ..ClientConfig::default()
    };
    let client = ChatClient::spawn(&config, Arc::new(connector.clone()));
    client.connect()?;
    client.snapshot().await?;
    let mut sock = connector.take_latest().ok_or_else(|| anyhow::anyhow!("no socket"))?;
    sock.accept();
    client.snapshot().await?;
    sock.sent();

    let input: &[u8] = b"/open U1 bike\nstill available?\n/quit\nnever sent\n";
    let mut out = Vec::new();
    run_console(&client, input, &mut out).await?;

    assert_eq!(sock.sent_types(), vec!["UserMeta", "SetTopic", "DirectMessage"]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn console_reports_mistakes_and_stops_at_eof() -> anyhow::Result<()> {
    let connector = FakeConnector::new();
    let client = ChatClient::spawn(&ClientConfig::default(), Arc::new(connector.clone()));

    let input: &[u8] = b"/dance\nhello\n/topic x\n/open U1\n";
    let mut out = Vec::new();
    run_console(&client, input, &mut out).await?;

    let text = String::from_utf8(out)?;
    assert!(text.contains("unknown command /dance"), "{text}");
    assert!(text.contains("no active conversation"), "{text}");
    assert!(text.contains("! NOT_CONNECTED"), "{text}");
    Ok(())
}
