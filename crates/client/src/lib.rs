// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! pulse - Realtime connection lifecycle for signed-in sessions.
//!
//! Keeps one realtime pub/sub connection alive while a user is signed in,
//! bounds credential retries, resumes stalled connections when the host app
//! returns to the foreground, and refetches cached data when a watched
//! channel event arrives.
//!
//! # Main Components
//!
//! - [`RealtimeRuntime`] - Event loop owning all of the components below
//! - [`ConnectionController`] - Connection state machine for one session
//! - [`AuthGate`] - Bounded-retry wrapper around a [`TokenSupplier`]
//! - [`AppLifecycleWatcher`] - Detects returns to the foreground
//! - [`ChannelSubscriptionManager`] - Single channel subscription and refetch
//! - [`RealtimeAccess`] - Read-only `{ is_connected, connection }` accessor
//! - [`WebSocketTransport`] - Relay protocol over tokio-tungstenite
//!
//! # Usage
//!
//! ```rust,ignore
//! let host = HostLifecycle::new();
//! let runtime = RealtimeRuntime::new(
//!     WebSocketFactory::new(config.websocket_options()),
//!     Arc::new(config.key_signer()),
//!     Arc::new(my_cache),
//!     &host,
//!     config.runtime_config(),
//! );
//! let access = runtime.access();
//! tokio::spawn(runtime.run(signed_in_rx, cancel));
//! ```

use std::future::Future;
use std::pin::Pin;

pub mod access;
pub mod app;
pub mod auth;
pub mod channel;
pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod runtime;
pub mod signer;
pub mod transport;
pub mod websocket;

#[cfg(test)]
mod test_helpers;

/// Boxed future returned by the object-safe traits in this crate.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub use access::{AccessError, ConnectionHandle, RealtimeAccess, RealtimeStatus};
pub use app::run;
pub use auth::{AuthError, AuthGate, SupplierError, TokenSupplier};
pub use channel::{CacheInvalidator, ChannelConfig, ChannelSubscriptionManager};
pub use cli::{Cli, HostCommand};
pub use config::Config;
pub use controller::{ConnectionController, ControllerConfig};
pub use error::{Error, Result};
pub use lifecycle::{AppLifecycleWatcher, HostLifecycle};
pub use runtime::{RealtimeRuntime, RuntimeConfig};
pub use signer::KeySigner;
pub use transport::{Transport, TransportFactory};
pub use websocket::{WebSocketFactory, WebSocketOptions, WebSocketTransport};
