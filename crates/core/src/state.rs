// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection and host lifecycle states.
//!
//! [`ConnectionState`] is what the controller publishes to the rest of the
//! application. [`TransportState`] is what a transport reports about its own
//! socket, and is only consulted when deciding whether to resume.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Published state of the realtime connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No connection has been attempted in this session.
    Initial,
    /// The transport is opening and authenticating the connection.
    Connecting,
    /// The connection is open and authenticated.
    Connected,
    /// The connection dropped; the transport may retry on its own.
    Disconnected,
    /// Connectivity has been lost long enough that retries stopped.
    Suspended,
    /// A fatal error ended the connection.
    Failed,
    /// The connection was closed on purpose.
    Closed,
}

impl ConnectionState {
    /// Returns true only for [`ConnectionState::Connected`].
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Initial => "initial",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Suspended => "suspended",
            ConnectionState::Failed => "failed",
            ConnectionState::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Low-level state reported by a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportState {
    Initialized,
    Connecting,
    Connected,
    Disconnected,
    Suspended,
    Failed,
    Closed,
}

impl TransportState {
    /// Whether a resume/connect call can bring this transport back.
    ///
    /// Only `Disconnected` and `Suspended` qualify. A `Failed` transport
    /// needs a new session, not a resume.
    pub fn is_stalled(self) -> bool {
        matches!(self, TransportState::Disconnected | TransportState::Suspended)
    }

    /// Decodes the value stored in an atomic state cell.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => TransportState::Connecting,
            2 => TransportState::Connected,
            3 => TransportState::Disconnected,
            4 => TransportState::Suspended,
            5 => TransportState::Failed,
            6 => TransportState::Closed,
            _ => TransportState::Initialized,
        }
    }

    /// Encodes the state for an atomic state cell.
    pub fn as_u8(self) -> u8 {
        match self {
            TransportState::Initialized => 0,
            TransportState::Connecting => 1,
            TransportState::Connected => 2,
            TransportState::Disconnected => 3,
            TransportState::Suspended => 4,
            TransportState::Failed => 5,
            TransportState::Closed => 6,
        }
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportState::Initialized => "initialized",
            TransportState::Connecting => "connecting",
            TransportState::Connected => "connected",
            TransportState::Disconnected => "disconnected",
            TransportState::Suspended => "suspended",
            TransportState::Failed => "failed",
            TransportState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Host application lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppPhase {
    /// In the foreground and receiving input.
    Active,
    /// Transitioning, or visible but not receiving input.
    Inactive,
    /// Not visible.
    Background,
}

impl AppPhase {
    /// Returns true for the phases a resume transition starts from.
    pub fn is_away(self) -> bool {
        matches!(self, AppPhase::Inactive | AppPhase::Background)
    }
}

impl std::str::FromStr for AppPhase {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(AppPhase::Active),
            "inactive" => Ok(AppPhase::Inactive),
            "background" => Ok(AppPhase::Background),
            other => Err(crate::Error::InvalidPhase(other.to_string())),
        }
    }
}

impl fmt::Display for AppPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AppPhase::Active => "active",
            AppPhase::Inactive => "inactive",
            AppPhase::Background => "background",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
