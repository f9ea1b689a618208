// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Relay state shared by every connection.
//!
//! Holds the key table used to verify token requests and the broadcast
//! channel that fans published events out to connections.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use pulse_core::protocol::{ERR_SIGNATURE_MISMATCH, ERR_TOKEN_EXPIRED, ERR_UNKNOWN_KEY};
use pulse_core::TokenRequest;
use tokio::sync::broadcast;

const BROADCAST_BUFFER: usize = 1024;

/// An event published on a channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelEvent {
    pub channel: String,
    pub name: String,
    pub data: serde_json::Value,
}

/// Why a token request was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub code: u16,
    pub message: String,
}

impl Rejection {
    fn new(code: u16, message: impl Into<String>) -> Self {
        Rejection {
            code,
            message: message.into(),
        }
    }
}

/// Shared relay state.
#[derive(Clone)]
pub struct RelayState {
    inner: Arc<RelayStateInner>,
}

struct RelayStateInner {
    /// Key name to secret.
    keys: HashMap<String, String>,
    /// Broadcast channel for published events.
    broadcast_tx: broadcast::Sender<ChannelEvent>,
    /// Source of connection ids.
    next_connection: AtomicU64,
    /// Milliseconds since the Unix epoch.
    clock: fn() -> i64,
}

impl RelayState {
    /// Creates relay state that accepts tokens signed with any of `keys`.
    pub fn new(keys: impl IntoIterator<Item = (String, String)>) -> Self {
        Self::with_clock(keys, now_ms)
    }

    pub fn with_clock(keys: impl IntoIterator<Item = (String, String)>, clock: fn() -> i64) -> Self {
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_BUFFER);
        RelayState {
            inner: Arc::new(RelayStateInner {
                keys: keys.into_iter().collect(),
                broadcast_tx,
                next_connection: AtomicU64::new(1),
                clock,
            }),
        }
    }

    pub fn now_ms(&self) -> i64 {
        (self.inner.clock)()
    }

    /// Checks the key, the MAC and the expiry of a token request.
    pub fn authorize(&self, request: &TokenRequest) -> Result<(), Rejection> {
        let Some(secret) = self.inner.keys.get(&request.key_name) else {
            return Err(Rejection::new(
                ERR_UNKNOWN_KEY,
                format!("unknown key '{}'", request.key_name),
            ));
        };
        if let Err(e) = request.verify(secret) {
            return Err(Rejection::new(ERR_SIGNATURE_MISMATCH, e.to_string()));
        }
        if request.is_expired(self.now_ms()) {
            return Err(Rejection::new(ERR_TOKEN_EXPIRED, "token request expired"));
        }
        Ok(())
    }

    /// Allocates an id for a newly authenticated connection.
    pub fn next_connection_id(&self) -> String {
        let n = self.inner.next_connection.fetch_add(1, Ordering::Relaxed);
        format!("conn-{}", n)
    }

    /// Publishes an event. Returns the number of connections it reached.
    pub fn publish(&self, event: ChannelEvent) -> usize {
        self.inner.broadcast_tx.send(event).unwrap_or(0)
    }

    /// Subscribe to published events.
    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.inner.broadcast_tx.subscribe()
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
