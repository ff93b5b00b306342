// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chatter: reconnecting WebSocket chat client runtime.

pub mod auth;
pub mod config;
pub mod console;
pub mod correlator;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod handlers;
pub mod protocol;
pub mod session;
pub mod store;
pub mod test_support;
pub mod transport;

use std::sync::Arc;

use tokio::io::BufReader;

use crate::config::ClientConfig;
use crate::session::ChatClient;
use crate::transport::ws::WsConnector;

/// Run the terminal client until the user quits or stdin closes.
pub async fn run(config: ClientConfig) -> anyhow::Result<()> {
    config.validate()?;

    let connector = WsConnector::new(&config.url);
    tracing::info!(url = %connector.url(), user = config.user_id.as_deref().unwrap_or("-"), "starting chat client");

    let client = ChatClient::spawn(&config, Arc::new(connector));
    client.connect()?;

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    let result = console::run_console(&client, stdin, &mut stdout).await;

    if let Err(e) = client.shutdown().await {
        tracing::debug!(err = %e, "shutdown after session already stopped");
    }
    result
}
