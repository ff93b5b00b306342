// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The chat session actor and its cloneable [`ChatClient`] handle.
//!
//! One task owns the transport, the pending-request table, the dispatcher
//! and the store. It processes socket events, the reconnect timer and
//! handle commands one at a time, so every handler for a frame finishes
//! before the next frame is looked at.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::auth::{AuthSequencer, CredentialChange};
use crate::config::ClientConfig;
use crate::correlator::{PendingReply, PendingRequests, Reply};
use crate::dispatch::{Dispatcher, Handler};
use crate::error::ClientError;
use crate::events::StoreEvent;
use crate::handlers::{register_defaults, HandlerContext};
use crate::protocol::{decode_frame, ClientMessage, Inbound, ServerTag};
use crate::store::{ConversationStore, StoreSnapshot};
use crate::transport::{Connector, SocketEvent, SocketState, Transition, Transport};

type Ack = oneshot::Sender<Result<(), ClientError>>;

enum Command {
    Connect,
    Close,
    Shutdown { done: oneshot::Sender<()> },
    SetCredentials { identity: String, secret: String },
    StartConversation { peer: String, topic: Option<String>, reply: Ack },
    CloseConversation,
    Send { msg: ClientMessage, reply: Ack },
    Request { msg: ClientMessage, reply: oneshot::Sender<Result<PendingReply, ClientError>> },
    On { tag: ServerTag, handler: Handler<HandlerContext>, reply: oneshot::Sender<bool> },
    Off { tag: ServerTag, handler: Handler<HandlerContext>, reply: oneshot::Sender<bool> },
    Snapshot { reply: oneshot::Sender<StoreSnapshot> },
}

/// Handle to a running chat session. Cheap to clone; the session stops
/// when [`ChatClient::shutdown`] is called or every handle is dropped.
#[derive(Clone)]
pub struct ChatClient {
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<StoreEvent>,
    request_timeout: Duration,
}

impl ChatClient {
    /// Start a session task. The socket is not opened until [`connect`].
    ///
    /// [`connect`]: ChatClient::connect
    pub fn spawn(config: &ClientConfig, connector: Arc<dyn Connector>) -> Self {
        let (socket_tx, socket_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (identity, secret) = config.credentials();

        let mut store = ConversationStore::new(config.event_capacity);
        store.set_self_id(identity);
        let events = store.event_sender();

        let mut dispatcher = Dispatcher::new();
        register_defaults(&mut dispatcher);

        let actor = SessionActor {
            transport: Transport::new(connector, socket_tx, config.retry_delay()),
            pending: PendingRequests::new(),
            dispatcher,
            ctx: HandlerContext::new(store),
            auth: AuthSequencer::new(identity, secret),
            commands: cmd_rx,
            socket_events: socket_rx,
            shutdown: CancellationToken::new(),
        };
        tokio::spawn(actor.run());

        Self { commands: cmd_tx, events, request_timeout: config.request_timeout() }
    }

    fn command(&self, cmd: Command) -> Result<(), ClientError> {
        self.commands.send(cmd).map_err(|_| ClientError::SessionClosed)
    }

    async fn call<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, ClientError> {
        let (tx, rx) = oneshot::channel();
        self.command(make(tx))?;
        rx.await.map_err(|_| ClientError::SessionClosed)
    }

    /// Open (or reopen) the socket.
    pub fn connect(&self) -> Result<(), ClientError> {
        self.command(Command::Connect)
    }

    /// Close the socket without reconnecting.
    pub fn close(&self) -> Result<(), ClientError> {
        self.command(Command::Close)
    }

    /// Say goodbye to the server, close the socket and stop the session.
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        self.call(|done| Command::Shutdown { done }).await
    }

    pub fn set_credentials(&self, identity: &str, secret: &str) -> Result<(), ClientError> {
        self.command(Command::SetCredentials {
            identity: identity.to_owned(),
            secret: secret.to_owned(),
        })
    }

    /// Make `peer` the active conversation, fetching its metadata and
    /// optionally setting a topic. The conversation opens even when the
    /// follow-up messages cannot be sent; the send error is returned.
    pub async fn start_conversation(&self, peer: &str, topic: Option<&str>) -> Result<(), ClientError> {
        self.call(|reply| Command::StartConversation {
            peer: peer.to_owned(),
            topic: topic.map(str::to_owned),
            reply,
        })
        .await?
    }

    pub fn close_conversation(&self) -> Result<(), ClientError> {
        self.command(Command::CloseConversation)
    }

    /// Fire-and-forget send of any client message.
    pub async fn send(&self, msg: ClientMessage) -> Result<(), ClientError> {
        self.call(|reply| Command::Send { msg, reply }).await?
    }

    pub async fn send_message(&self, peer: &str, text: &str) -> Result<(), ClientError> {
        self.send(ClientMessage::DirectMessage { to: peer.to_owned(), message: text.to_owned() })
            .await
    }

    pub async fn set_topic(&self, peer: &str, topic: &str) -> Result<(), ClientError> {
        self.send(ClientMessage::SetTopic { to: peer.to_owned(), topic: topic.to_owned() }).await
    }

    /// Send `msg` as a correlated request; resolves once it is on the wire.
    pub async fn send_request(&self, msg: ClientMessage) -> Result<PendingReply, ClientError> {
        self.call(|reply| Command::Request { msg, reply }).await?
    }

    /// Send a request and wait for its reply, bounded by the request timeout.
    pub async fn request<R: Reply>(&self, msg: ClientMessage) -> Result<R, ClientError> {
        let pending = self.send_request(msg).await?.expect::<R>();
        let id = pending.id().to_owned();
        match tokio::time::timeout(self.request_timeout, pending.recv()).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!(request_id = %id, "request timed out");
                Err(ClientError::Timeout)
            }
        }
    }

    /// Register an extra handler. Returns `false` if it was already registered.
    pub async fn on(&self, tag: ServerTag, handler: Handler<HandlerContext>) -> Result<bool, ClientError> {
        self.call(|reply| Command::On { tag, handler, reply }).await
    }

    pub async fn off(&self, tag: ServerTag, handler: Handler<HandlerContext>) -> Result<bool, ClientError> {
        self.call(|reply| Command::Off { tag, handler, reply }).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> Result<StoreSnapshot, ClientError> {
        self.call(|reply| Command::Snapshot { reply }).await
    }
}

struct SessionActor {
    transport: Transport,
    pending: PendingRequests,
    dispatcher: Dispatcher<HandlerContext>,
    ctx: HandlerContext,
    auth: AuthSequencer,
    commands: mpsc::UnboundedReceiver<Command>,
    socket_events: mpsc::UnboundedReceiver<(u64, SocketEvent)>,
    shutdown: CancellationToken,
}

async fn retry_timer(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

impl SessionActor {
    async fn run(mut self) {
        loop {
            let deadline = self.transport.retry_deadline();
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                Some((generation, event)) = self.socket_events.recv() => {
                    self.on_socket_event(generation, event);
                }
                _ = retry_timer(deadline) => {
                    if self.transport.fire_retry() {
                        self.sync_state();
                    }
                }
                cmd = self.commands.recv() => {
                    let Some(cmd) = cmd else { break };
                    self.on_command(cmd);
                }
            }
        }
        self.transport.close();
        self.pending.reject_all(ClientError::SessionClosed);
        tracing::debug!("chat session stopped");
    }

    fn sync_state(&mut self) {
        self.ctx.store.set_socket_state(self.transport.state());
    }

    fn on_command(&mut self, cmd: Command) {
        match cmd {
            Command::Connect => {
                self.pending.reject_all(ClientError::ConnectionLost);
                self.transport.connect();
                self.sync_state();
            }
            Command::Close => {
                self.transport.close();
                self.pending.reject_all(ClientError::ConnectionLost);
                self.sync_state();
            }
            Command::Shutdown { done } => {
                if self.transport.is_open() {
                    if let Err(e) = self.transport.send_message(&ClientMessage::Disconnect) {
                        tracing::debug!(err = %e, "disconnect not sent");
                    }
                }
                self.transport.close();
                self.pending.reject_all(ClientError::ConnectionLost);
                self.sync_state();
                self.shutdown.cancel();
                let _ = done.send(());
            }
            Command::SetCredentials { identity, secret } => self.set_credentials(&identity, &secret),
            Command::StartConversation { peer, topic, reply } => {
                let outgoing = self.ctx.store.start_conversation(&peer, topic.as_deref());
                let result =
                    outgoing.iter().try_for_each(|msg| self.transport.send_message(msg));
                let _ = reply.send(result);
            }
            Command::CloseConversation => self.ctx.store.close_conversation(),
            Command::Send { msg, reply } => {
                let _ = reply.send(self.transport.send_message(&msg));
            }
            Command::Request { msg, reply } => {
                let _ = reply.send(self.pending.send_request(&self.transport, &msg));
            }
            Command::On { tag, handler, reply } => {
                let _ = reply.send(self.dispatcher.on(tag, handler));
            }
            Command::Off { tag, handler, reply } => {
                let _ = reply.send(self.dispatcher.off(tag, &handler));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.ctx.store.snapshot());
            }
        }
    }

    fn set_credentials(&mut self, identity: &str, secret: &str) {
        match self.auth.set_credentials(identity, secret) {
            CredentialChange::Unchanged => {}
            CredentialChange::Updated => {
                self.ctx.store.set_self_id(identity);
                self.authenticate();
            }
            CredentialChange::IdentitySwitched => {
                // Logout included: the old socket stays authenticated as
                // the previous user.
                tracing::info!(user = %identity, "identity changed, resetting chat session");
                self.ctx.store.set_self_id(identity);
                self.ctx.store.reset();
                self.pending.reject_all(ClientError::ConnectionLost);
                // Only reconnect a session that was meant to be up.
                let wanted = self.transport.state() != SocketState::Disconnected
                    || self.transport.retry_deadline().is_some();
                if wanted {
                    self.transport.connect();
                }
                self.sync_state();
            }
        }
    }

    fn authenticate(&mut self) {
        let Some(msg) = self.auth.evaluate(self.transport.is_open()) else {
            return;
        };
        tracing::debug!(user = %self.auth.identity(), "sending authenticate");
        if let Err(e) = self.transport.send_message(&msg) {
            tracing::warn!(err = %e, "failed to send authenticate");
        }
    }

    fn on_socket_event(&mut self, generation: u64, event: SocketEvent) {
        match self.transport.handle_event(generation, event) {
            None => {}
            Some(Transition::Opened) => {
                self.sync_state();
                self.authenticate();
            }
            Some(Transition::Frame(text)) => self.on_frame(&text),
            Some(Transition::Down { reason }) => {
                tracing::debug!(reason = %reason, "chat socket down");
                self.pending.reject_all(ClientError::ConnectionLost);
                self.sync_state();
            }
        }
    }

    fn on_frame(&mut self, text: &str) {
        let incoming = match decode_frame(text) {
            Ok(incoming) => incoming,
            Err(e) => {
                tracing::warn!(err = %e, "dropping malformed frame");
                return;
            }
        };
        match (&incoming.request_id, &incoming.body) {
            (Some(id), Inbound::Known(msg)) => {
                self.pending.resolve(id, msg);
            }
            (Some(id), Inbound::Unknown(tag)) => {
                tracing::debug!(request_id = %id, tag = %tag, "reply of unknown type");
                self.pending.reject(id, ClientError::UnexpectedReply("Unknown"));
            }
            (None, _) => {}
        }
        self.dispatcher.dispatch_inbound(&mut self.ctx, &incoming.body);
        for msg in self.ctx.take_outbox() {
            if let Err(e) = self.transport.send_message(&msg) {
                tracing::warn!(kind = msg.tag(), err = %e, "failed to send follow-up");
            }
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
