// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! pulse-core: Shared types for the pulse realtime client and relay
//!
//! This crate provides the connection and lifecycle state enums, the signed
//! token request format, and the WebSocket protocol messages used by both
//! the `pulse` client library and the `pulse-relay` server.

pub mod error;
pub mod protocol;
pub mod state;
pub mod token;

pub use error::{Error, Result};
pub use protocol::{ClientMessage, ServerMessage};
pub use state::{AppPhase, ConnectionState, TransportState};
pub use token::{Credential, TokenParams, TokenRequest};
