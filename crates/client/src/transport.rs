// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Transport abstraction for realtime pub/sub connections.
//!
//! Provides a trait-based transport layer that enables:
//! - A real WebSocket transport for production ([`crate::websocket`])
//! - Mock transports for unit testing
//!
//! A transport never calls back into the controller. It reports state
//! changes and inbound channel messages through an [`EventSink`], tagged
//! with the session that created it, and the runtime loop feeds them to the
//! controller one at a time.

use pulse_core::protocol::ERR_SIGNATURE_MISMATCH;
use pulse_core::TransportState;
use tokio::sync::mpsc;

use crate::auth::{AuthError, AuthGate};
use crate::BoxFuture;

/// Identifies one connection session (sign-in to sign-out).
pub type SessionId = u64;

/// Error code: the server could not be reached.
pub const CODE_UNREACHABLE: u16 = 80000;
/// Error code: an established connection was lost.
pub const CODE_CONNECTION_LOST: u16 = 80003;
/// Error code: the auth callback failed to produce a token request.
pub const CODE_AUTH_CALLBACK_FAILED: u16 = 40170;

/// Error type for transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The transport is not connected or has been closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Reason attached to a state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: u16,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        ErrorInfo {
            code,
            message: message.into(),
        }
    }

    /// Wraps an auth callback failure.
    pub fn from_auth(err: &AuthError) -> Self {
        ErrorInfo::new(CODE_AUTH_CALLBACK_FAILED, err.to_string())
    }

    /// The server rejected the token signature.
    pub fn is_signature_mismatch(&self) -> bool {
        self.code == ERR_SIGNATURE_MISMATCH
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

/// A transport state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub previous: TransportState,
    pub current: TransportState,
    pub reason: Option<ErrorInfo>,
}

/// A named event received on a channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMessage {
    pub channel: String,
    pub name: String,
    pub data: serde_json::Value,
}

impl ChannelMessage {
    pub fn new(channel: impl Into<String>, name: impl Into<String>) -> Self {
        ChannelMessage {
            channel: channel.into(),
            name: name.into(),
            data: serde_json::Value::Null,
        }
    }
}

/// Something a transport reports.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    State(StateChange),
    Message(ChannelMessage),
}

/// A transport event tagged with its session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub session: SessionId,
    pub event: TransportEvent,
}

/// Where a transport delivers its events.
#[derive(Debug, Clone)]
pub struct EventSink {
    session: SessionId,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EventSink {
    pub fn new(session: SessionId, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        EventSink { session, tx }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Report a state change. Returns false if nobody is listening anymore.
    pub fn state(&self, change: StateChange) -> bool {
        self.emit(TransportEvent::State(change))
    }

    /// Report an inbound channel message.
    pub fn message(&self, message: ChannelMessage) -> bool {
        self.emit(TransportEvent::Message(message))
    }

    fn emit(&self, event: TransportEvent) -> bool {
        self.tx
            .send(SessionEvent {
                session: self.session,
                event,
            })
            .is_ok()
    }
}

/// Transport trait for realtime pub/sub connections.
///
/// This trait abstracts over the actual transport mechanism, allowing
/// for easy testing with mock implementations.
pub trait Transport: Send {
    /// Start connecting, or resume a stalled connection.
    ///
    /// Returns once the attempt has been started. Progress is reported
    /// through the event sink.
    fn connect(&mut self) -> BoxFuture<'_, TransportResult<()>>;

    /// Close the connection and stop any pending retries.
    ///
    /// Closing an already closed transport is a no-op.
    fn close(&mut self) -> BoxFuture<'_, TransportResult<()>>;

    /// The transport's own view of its state.
    fn state(&self) -> TransportState;

    /// Attach to a channel.
    fn subscribe<'a>(&'a mut self, channel: &'a str) -> BoxFuture<'a, TransportResult<()>>;

    /// Detach from a channel.
    fn unsubscribe<'a>(&'a mut self, channel: &'a str) -> BoxFuture<'a, TransportResult<()>>;
}

/// Builds one transport per connection session.
pub trait TransportFactory: Send {
    type Transport: Transport;

    /// Create a transport that authenticates through `auth` and reports to
    /// `events`. Must not start connecting.
    fn create(&mut self, auth: AuthGate, events: EventSink) -> Self::Transport;
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
