// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::FakeConnector;

const DELAY: Duration = Duration::from_secs(5);

fn transport(
    connector: &FakeConnector,
) -> (Transport, mpsc::UnboundedReceiver<(u64, SocketEvent)>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Transport::new(Arc::new(connector.clone()), tx, DELAY), rx)
}

#[test]
fn send_before_connect_is_not_connected() {
    let connector = FakeConnector::new();
    let (t, _rx) = transport(&connector);
    assert_eq!(t.state(), SocketState::Disconnected);
    assert_eq!(t.send("{}".to_owned()), Err(ClientError::NotConnected));
}

#[test]
fn send_while_connecting_is_not_connected() {
    let connector = FakeConnector::new();
    let (mut t, _rx) = transport(&connector);
    t.connect();
    assert_eq!(t.state(), SocketState::Connecting);
    assert_eq!(t.send_message(&ClientMessage::SyncChatUsers), Err(ClientError::NotConnected));
}

#[test]
fn open_marks_connected_and_pings() -> anyhow::Result<()> {
    let connector = FakeConnector::new();
    let (mut t, _rx) = transport(&connector);
    t.connect();
    let mut sock = connector.take_latest().ok_or_else(|| anyhow::anyhow!("no socket"))?;

    assert_eq!(t.handle_event(sock.generation, SocketEvent::Opened), Some(Transition::Opened));
    assert_eq!(t.state(), SocketState::Connected);
    assert!(t.is_open());
    assert_eq!(sock.sent_types(), vec!["Ping"]);
    Ok(())
}

#[test]
fn frames_pass_through_only_when_open() {
    let connector = FakeConnector::new();
    let (mut t, _rx) = transport(&connector);
    t.connect();
    let gen = t.generation();
    assert_eq!(t.handle_event(gen, SocketEvent::Frame("x".to_owned())), None);
    t.handle_event(gen, SocketEvent::Opened);
    assert_eq!(
        t.handle_event(gen, SocketEvent::Frame("x".to_owned())),
        Some(Transition::Frame("x".to_owned()))
    );
}

#[test]
fn connect_replaces_existing_socket() -> anyhow::Result<()> {
    let connector = FakeConnector::new();
    let (mut t, _rx) = transport(&connector);
    t.connect();
    let first = connector.take_latest().ok_or_else(|| anyhow::anyhow!("no socket"))?;
    t.connect();

    assert!(first.is_cancelled());
    assert_eq!(connector.opened(), 2);
    // Late events from the replaced socket are ignored.
    assert_eq!(t.handle_event(first.generation, SocketEvent::Opened), None);
    assert_eq!(t.state(), SocketState::Connecting);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn disconnect_schedules_retry_after_delay() {
    let connector = FakeConnector::new();
    let (mut t, _rx) = transport(&connector);
    t.connect();
    let gen = t.generation();
    t.handle_event(gen, SocketEvent::Opened);

    let start = Instant::now();
    let transition = t.handle_event(gen, SocketEvent::Failed("reset".to_owned()));
    assert_eq!(transition, Some(Transition::Down { reason: "reset".to_owned() }));
    assert_eq!(t.state(), SocketState::Disconnected);
    assert_eq!(t.retry_deadline(), Some(start + DELAY));
}

#[tokio::test(start_paused = true)]
async fn repeated_disconnects_collapse_into_one_retry() {
    let connector = FakeConnector::new();
    let (mut t, _rx) = transport(&connector);
    t.connect();
    let gen = t.generation();
    t.handle_event(gen, SocketEvent::Opened);

    let start = Instant::now();
    assert!(t.handle_event(gen, SocketEvent::Failed("error".to_owned())).is_some());
    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(t.handle_event(gen, SocketEvent::Closed), None);
    assert!(!t.schedule_retry());

    // Deadline stays anchored to the first signal.
    assert_eq!(t.retry_deadline(), Some(start + DELAY));
    assert!(t.fire_retry());
    assert!(!t.fire_retry());
    assert_eq!(connector.opened(), 2);
}

#[tokio::test(start_paused = true)]
async fn close_cancels_pending_retry() -> anyhow::Result<()> {
    let connector = FakeConnector::new();
    let (mut t, _rx) = transport(&connector);
    t.connect();
    let sock = connector.take_latest().ok_or_else(|| anyhow::anyhow!("no socket"))?;
    t.handle_event(sock.generation, SocketEvent::Failed("refused".to_owned()));
    assert!(t.retry_deadline().is_some());

    t.close();
    assert_eq!(t.retry_deadline(), None);
    assert!(!t.fire_retry());
    assert_eq!(connector.opened(), 1);
    Ok(())
}

#[test]
fn explicit_close_tears_down_without_retry() -> anyhow::Result<()> {
    let connector = FakeConnector::new();
    let (mut t, _rx) = transport(&connector);
    t.connect();
    let sock = connector.take_latest().ok_or_else(|| anyhow::anyhow!("no socket"))?;
    t.handle_event(sock.generation, SocketEvent::Opened);

    t.close();
    assert!(sock.is_cancelled());
    assert_eq!(t.state(), SocketState::Disconnected);
    assert_eq!(t.retry_deadline(), None);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn late_close_after_explicit_close_does_not_retry() -> anyhow::Result<()> {
    let connector = FakeConnector::new();
    let (mut t, _rx) = transport(&connector);
    t.connect();
    let sock = connector.take_latest().ok_or_else(|| anyhow::anyhow!("no socket"))?;
    t.handle_event(sock.generation, SocketEvent::Opened);

    t.close();
    assert_eq!(t.handle_event(sock.generation, SocketEvent::Closed), None);
    assert_eq!(t.retry_deadline(), None);
    Ok(())
}
