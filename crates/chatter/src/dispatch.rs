// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed publish/subscribe registry for server messages.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::protocol::{Inbound, ServerMessage, ServerTag};

/// A message handler. Identity is the `Arc` allocation, so registering a
/// clone of the same handler twice is a no-op.
pub type Handler<C> = Arc<dyn Fn(&mut C, &ServerMessage) -> anyhow::Result<()> + Send + Sync>;

/// Wrap a closure as a [`Handler`].
pub fn handler<C, F>(f: F) -> Handler<C>
where
    F: Fn(&mut C, &ServerMessage) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Fans each message out to the handlers registered for its tag, in
/// registration order.
pub struct Dispatcher<C> {
    handlers: HashMap<ServerTag, Vec<Handler<C>>>,
}

impl<C> Default for Dispatcher<C> {
    fn default() -> Self {
        Self { handlers: HashMap::new() }
    }
}

impl<C> Dispatcher<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `tag`. Returns `false` if it was already there.
    pub fn on(&mut self, tag: ServerTag, handler: Handler<C>) -> bool {
        let list = self.handlers.entry(tag).or_default();
        if list.iter().any(|h| Arc::ptr_eq(h, &handler)) {
            return false;
        }
        list.push(handler);
        true
    }

    /// Remove `handler` from `tag`. Returns whether it was registered.
    pub fn off(&mut self, tag: ServerTag, handler: &Handler<C>) -> bool {
        let Some(list) = self.handlers.get_mut(&tag) else {
            return false;
        };
        let before = list.len();
        list.retain(|h| !Arc::ptr_eq(h, handler));
        list.len() != before
    }

    pub fn handler_count(&self, tag: ServerTag) -> usize {
        self.handlers.get(&tag).map_or(0, Vec::len)
    }

    /// Run every handler for the message's tag. A handler that fails or
    /// panics is logged and the rest still run. Returns how many handlers
    /// were invoked.
    pub fn dispatch(&self, ctx: &mut C, msg: &ServerMessage) -> usize {
        let tag = msg.tag();
        let Some(list) = self.handlers.get(&tag) else {
            return 0;
        };
        for h in list {
            match panic::catch_unwind(AssertUnwindSafe(|| h(ctx, msg))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(tag = %tag, err = %e, "message handler failed"),
                Err(payload) => {
                    let reason = panic_message(&*payload);
                    tracing::error!(tag = %tag, panic = %reason, "message handler panicked");
                }
            }
        }
        list.len()
    }

    /// Dispatch a decoded frame. Unknown tags reach no handler.
    pub fn dispatch_inbound(&self, ctx: &mut C, inbound: &Inbound) -> usize {
        match inbound {
            Inbound::Known(msg) => self.dispatch(ctx, msg),
            Inbound::Unknown(tag) => {
                tracing::debug!(tag = %tag, "no handlers for unknown message type");
                0
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
