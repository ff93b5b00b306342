// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

/// Default chat endpoint.
pub const DEFAULT_URL: &str = "ws://127.0.0.1:3000/ws";

/// Configuration for the chat client runtime.
#[derive(Debug, Clone, clap::Args)]
pub struct ClientConfig {
    /// Chat server WebSocket URL (http/https are rewritten to ws/wss).
    #[arg(long, default_value = DEFAULT_URL, env = "CHATTER_WS_URL")]
    pub url: String,

    /// User id to authenticate as.
    #[arg(long, env = "CHATTER_USER_ID")]
    pub user_id: Option<String>,

    /// Chat secret for the user id.
    #[arg(long, env = "CHATTER_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    /// Delay before reconnecting after the socket drops, in milliseconds.
    #[arg(long, default_value_t = 5000, env = "CHATTER_RETRY_MS")]
    pub retry_ms: u64,

    /// How long a request waits for its reply, in milliseconds.
    #[arg(long, default_value_t = 10000, env = "CHATTER_REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: u64,

    /// Buffered store events per subscriber before the slowest one lags.
    #[arg(long, default_value_t = 256, env = "CHATTER_EVENT_CAPACITY")]
    pub event_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_owned(),
            user_id: None,
            secret: None,
            retry_ms: 5000,
            request_timeout_ms: 10000,
            event_capacity: 256,
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.url.trim().is_empty() {
            anyhow::bail!("--url must not be empty");
        }
        if self.retry_ms == 0 {
            anyhow::bail!("--retry-ms must be greater than zero");
        }
        if self.request_timeout_ms == 0 {
            anyhow::bail!("--request-timeout-ms must be greater than zero");
        }
        if self.event_capacity == 0 {
            anyhow::bail!("--event-capacity must be greater than zero");
        }
        if self.user_id.is_some() != self.secret.is_some() {
            anyhow::bail!("--user-id and --secret must be given together");
        }
        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Identity and secret, empty when unset.
    pub fn credentials(&self) -> (&str, &str) {
        (self.user_id.as_deref().unwrap_or_default(), self.secret.as_deref().unwrap_or_default())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
