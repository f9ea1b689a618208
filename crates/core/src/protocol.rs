// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket protocol messages between a realtime client and the relay.
//!
//! The protocol is simple:
//! - Client authenticates with a signed token request, then attaches to channels
//! - Server confirms the connection and forwards named events on attached channels

use serde::{Deserialize, Serialize};

use crate::token::TokenRequest;

/// Error code: token request MAC does not match the key secret.
pub const ERR_SIGNATURE_MISMATCH: u16 = 40101;
/// Error code: token request expired; the client should re-authenticate.
pub const ERR_TOKEN_EXPIRED: u16 = 40140;
/// Error code: the token does not grant access to the channel.
pub const ERR_CAPABILITY_DENIED: u16 = 40160;
/// Error code: malformed or out-of-order message.
pub const ERR_BAD_REQUEST: u16 = 40000;
/// Error code: the key name is not known to the relay.
pub const ERR_UNKNOWN_KEY: u16 = 40400;

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Authenticate (or re-authenticate) the connection.
    Auth {
        token_request: TokenRequest,
    },

    /// Start receiving events on a channel.
    Attach {
        channel: String,
    },

    /// Stop receiving events on a channel.
    Detach {
        channel: String,
    },

    /// Publish a named event to every connection attached to the channel.
    Publish {
        channel: String,
        name: String,
        #[serde(default)]
        data: serde_json::Value,
    },

    /// Ping message for keepalive.
    Ping {
        /// Client-chosen ID echoed in Pong.
        id: u64,
    },
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The connection is authenticated.
    Connected {
        connection_id: String,
    },

    /// Channel attach confirmed.
    Attached {
        channel: String,
    },

    /// Channel detach confirmed.
    Detached {
        channel: String,
    },

    /// A named event published on an attached channel.
    Event {
        channel: String,
        name: String,
        #[serde(default)]
        data: serde_json::Value,
    },

    /// Pong response to client Ping.
    Pong {
        /// Echoed from the Ping message.
        id: u64,
    },

    /// Error message.
    Error {
        code: u16,
        /// Human-readable error description.
        message: String,
    },
}

impl ClientMessage {
    pub fn auth(token_request: TokenRequest) -> Self {
        ClientMessage::Auth { token_request }
    }

    pub fn attach(channel: impl Into<String>) -> Self {
        ClientMessage::Attach {
            channel: channel.into(),
        }
    }

    pub fn detach(channel: impl Into<String>) -> Self {
        ClientMessage::Detach {
            channel: channel.into(),
        }
    }

    pub fn publish(
        channel: impl Into<String>,
        name: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        ClientMessage::Publish {
            channel: channel.into(),
            name: name.into(),
            data,
        }
    }

    /// Creates a Ping message.
    pub fn ping(id: u64) -> Self {
        ClientMessage::Ping { id }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    pub fn connected(connection_id: impl Into<String>) -> Self {
        ServerMessage::Connected {
            connection_id: connection_id.into(),
        }
    }

    pub fn attached(channel: impl Into<String>) -> Self {
        ServerMessage::Attached {
            channel: channel.into(),
        }
    }

    pub fn detached(channel: impl Into<String>) -> Self {
        ServerMessage::Detached {
            channel: channel.into(),
        }
    }

    pub fn event(
        channel: impl Into<String>,
        name: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        ServerMessage::Event {
            channel: channel.into(),
            name: name.into(),
            data,
        }
    }

    /// Creates a Pong message.
    pub fn pong(id: u64) -> Self {
        ServerMessage::Pong { id }
    }

    /// Creates an Error message.
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code,
            message: message.into(),
        }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Whether an error code ends the connection rather than prompting a retry.
pub fn is_fatal_code(code: u16) -> bool {
    matches!(
        code,
        ERR_SIGNATURE_MISMATCH | ERR_UNKNOWN_KEY | ERR_CAPABILITY_DENIED
    )
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
