// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Line-oriented terminal front end.
//!
//! Reads commands from an async line source, drives a [`ChatClient`], and
//! prints store events. The active conversation's new messages are echoed
//! as they arrive; other conversations only raise the unread marker.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast;

use crate::events::StoreEvent;
use crate::protocol::ChatMessage;
use crate::session::ChatClient;
use crate::store::StoreSnapshot;

pub const HELP: &str = "\
commands:
  /open <peer> [topic]  open a conversation, optionally setting its topic
  /close                close the active conversation
  /topic <text>         set the topic of the active conversation
  /users                list known users
  /history              reprint the active conversation
  /quit                 leave
anything else is sent to the active conversation";

/// One line of console input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Open { peer: String, topic: Option<String> },
    Close,
    Topic(String),
    Users,
    History,
    Help,
    Quit,
    Say(String),
    Empty,
}

/// Parse one input line.
pub fn parse_line(line: &str) -> anyhow::Result<ConsoleCommand> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ConsoleCommand::Empty);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(ConsoleCommand::Say(line.to_owned()));
    };
    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };
    let cmd = match name {
        "open" => {
            let (peer, topic) = match args.split_once(char::is_whitespace) {
                Some((peer, topic)) => (peer, Some(topic.trim().to_owned())),
                None => (args, None),
            };
            if peer.is_empty() {
                anyhow::bail!("usage: /open <peer> [topic]");
            }
            ConsoleCommand::Open { peer: peer.to_owned(), topic }
        }
        "close" => ConsoleCommand::Close,
        "topic" => {
            if args.is_empty() {
                anyhow::bail!("usage: /topic <text>");
            }
            ConsoleCommand::Topic(args.to_owned())
        }
        "users" => ConsoleCommand::Users,
        "history" => ConsoleCommand::History,
        "help" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => anyhow::bail!("unknown command /{other} (try /help)"),
    };
    Ok(cmd)
}

/// Render one history entry.
pub fn format_message(msg: &ChatMessage, self_id: &str, users: &BTreeMap<String, String>) -> String {
    match msg {
        ChatMessage::User { from, message } if from == self_id => format!("you: {message}"),
        ChatMessage::User { from, message } => {
            let who = users.get(from).map_or(from.as_str(), String::as_str);
            format!("{who}: {message}")
        }
        ChatMessage::Topic { topic } => format!("-- topic: {topic} --"),
        ChatMessage::Server { message } => format!("[server] {message}"),
    }
}

/// Tracks what has already been printed per conversation.
#[derive(Debug, Default)]
pub struct ConsoleView {
    printed: HashMap<String, usize>,
}

impl ConsoleView {
    /// Lines for the active conversation not yet shown. A history that
    /// shrank is shown again in full.
    pub fn unseen(&mut self, snap: &StoreSnapshot) -> Vec<String> {
        let Some(peer) = snap.active.as_deref() else {
            return Vec::new();
        };
        let history = snap.conversations.get(peer).map(Vec::as_slice).unwrap_or_default();
        let printed = self.printed.entry(peer.to_owned()).or_default();
        let start = if history.len() < *printed { 0 } else { *printed };
        *printed = history.len();
        history[start..].iter().map(|m| format_message(m, &snap.self_id, &snap.users)).collect()
    }

    /// Every line of the active conversation.
    pub fn full(&mut self, snap: &StoreSnapshot) -> Vec<String> {
        if let Some(peer) = snap.active.as_deref() {
            self.restart(peer);
        }
        self.unseen(snap)
    }

    /// Treat `peer`'s history as never printed.
    pub fn restart(&mut self, peer: &str) {
        self.printed.insert(peer.to_owned(), 0);
    }

    pub fn forget(&mut self) {
        self.printed.clear();
    }
}

/// Status line for an event, if it deserves one.
pub fn describe_event(event: &StoreEvent) -> Option<String> {
    match event {
        StoreEvent::SocketState(state) => Some(format!("* connection {state}")),
        StoreEvent::ActiveConversation(Some(peer)) => Some(format!("* chatting with {peer}")),
        StoreEvent::ActiveConversation(None) => Some("* conversation closed".to_owned()),
        StoreEvent::Unread(true) => Some("* new messages in another conversation".to_owned()),
        StoreEvent::Notice(n) if n.message.is_empty() => Some(format!("! {}", n.title)),
        StoreEvent::Notice(n) => Some(format!("! {}: {}", n.title, n.message)),
        StoreEvent::Reset => Some("* session reset".to_owned()),
        StoreEvent::Authenticated(_)
        | StoreEvent::UsersChanged
        | StoreEvent::MessagesChanged { .. }
        | StoreEvent::Unread(false) => None,
    }
}

/// Run the console until `/quit` or end of input.
pub async fn run_console<R, W>(client: &ChatClient, input: R, out: &mut W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut events = client.subscribe();
    let mut lines = input.lines();
    let mut view = ConsoleView::default();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let cmd = match parse_line(&line) {
                    Ok(cmd) => cmd,
                    Err(e) => {
                        writeln!(out, "{e}")?;
                        continue;
                    }
                };
                if cmd == ConsoleCommand::Quit {
                    break;
                }
                execute(client, &mut view, cmd, out).await?;
            }
            event = events.recv() => match event {
                Ok(StoreEvent::MessagesChanged { peer, replaced }) => {
                    if replaced {
                        view.restart(&peer);
                    }
                    let snap = client.snapshot().await?;
                    for line in view.unseen(&snap) {
                        writeln!(out, "{line}")?;
                    }
                }
                Ok(StoreEvent::Reset) => {
                    view.forget();
                    writeln!(out, "* session reset")?;
                }
                Ok(event) => {
                    if let Some(line) = describe_event(&event) {
                        writeln!(out, "{line}")?;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "console fell behind store events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
        out.flush()?;
    }
    Ok(())
}

async fn execute<W: Write>(
    client: &ChatClient,
    view: &mut ConsoleView,
    cmd: ConsoleCommand,
    out: &mut W,
) -> anyhow::Result<()> {
    let result = match cmd {
        ConsoleCommand::Empty | ConsoleCommand::Quit => Ok(()),
        ConsoleCommand::Help => {
            writeln!(out, "{HELP}")?;
            Ok(())
        }
        ConsoleCommand::Open { peer, topic } => {
            let sent = client.start_conversation(&peer, topic.as_deref()).await;
            for line in view.full(&client.snapshot().await?) {
                writeln!(out, "{line}")?;
            }
            sent
        }
        ConsoleCommand::Close => client.close_conversation(),
        ConsoleCommand::Topic(topic) => match client.snapshot().await?.active {
            Some(peer) => client.set_topic(&peer, &topic).await,
            None => {
                writeln!(out, "no active conversation, use /open <peer>")?;
                Ok(())
            }
        },
        ConsoleCommand::Users => {
            let snap = client.snapshot().await?;
            if snap.users.is_empty() {
                writeln!(out, "no users yet")?;
            }
            for (id, email) in &snap.users {
                writeln!(out, "{id}  {email}")?;
            }
            Ok(())
        }
        ConsoleCommand::History => {
            let snap = client.snapshot().await?;
            if snap.active.is_none() {
                writeln!(out, "no active conversation, use /open <peer>")?;
            }
            for line in view.full(&snap) {
                writeln!(out, "{line}")?;
            }
            Ok(())
        }
        ConsoleCommand::Say(text) => match client.snapshot().await?.active {
            Some(peer) => client.send_message(&peer, &text).await,
            None => {
                writeln!(out, "no active conversation, use /open <peer>")?;
                Ok(())
            }
        },
    };
    if let Err(e) = result {
        writeln!(out, "! {e}")?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "console_tests.rs"]
mod tests;
