// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

use chatter::config::ClientConfig;

#[derive(Debug, Parser)]
#[command(name = "chatter", version, about = "Terminal client for the chat WebSocket service.")]
struct Cli {
    #[command(flatten)]
    config: ClientConfig,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // stdout carries the conversation, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = chatter::run(cli.config).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
