// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authentication sequencing.
//!
//! The sequencer holds the identity and secret and decides when the
//! handshake should be (re)sent: whenever either value changes or a fresh
//! socket opens, provided both are non-empty.

use std::fmt;

use crate::protocol::ClientMessage;

/// What a credential update means for the live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialChange {
    /// Nothing differs from what was held.
    Unchanged,
    /// Values changed but the socket can simply re-authenticate.
    Updated,
    /// A held identity was replaced or cleared. The socket is bound to the
    /// old user, so the session must reset and reconnect.
    IdentitySwitched,
}

#[derive(Default, Clone)]
pub struct AuthSequencer {
    identity: String,
    secret: String,
}

impl AuthSequencer {
    pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        Self { identity: identity.into(), secret: secret.into() }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn has_credentials(&self) -> bool {
        !self.identity.is_empty() && !self.secret.is_empty()
    }

    pub fn set_credentials(&mut self, identity: &str, secret: &str) -> CredentialChange {
        if self.identity == identity && self.secret == secret {
            return CredentialChange::Unchanged;
        }
        let switched = !self.identity.is_empty() && self.identity != identity;
        self.identity = identity.to_owned();
        self.secret = secret.to_owned();
        if switched {
            CredentialChange::IdentitySwitched
        } else {
            CredentialChange::Updated
        }
    }

    /// The handshake to send now, if any.
    pub fn evaluate(&self, transport_open: bool) -> Option<ClientMessage> {
        if !transport_open || !self.has_credentials() {
            return None;
        }
        Some(ClientMessage::Authenticate { id: self.identity.clone(), secret: self.secret.clone() })
    }
}

impl fmt::Debug for AuthSequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSequencer")
            .field("identity", &self.identity)
            .field("secret", &if self.secret.is_empty() { "" } else { "<redacted>" })
            .finish()
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
