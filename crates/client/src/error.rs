// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Errors from loading configuration and starting the realtime client.
///
/// Runtime connection problems are not errors here; they surface as
/// connection states on [`crate::RealtimeAccess`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("config file not found: {0}\n  hint: pass --config <path> or create the default file")]
    ConfigNotFound(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid realtime url '{0}'\n  hint: the url must start with ws:// or wss://")]
    InvalidUrl(String),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("invalid command: '{0}'\n  hint: valid commands are: active, inactive, background, signin, signout, status, quit")]
    InvalidCommand(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] pulse_core::Error),
}

/// A specialized Result type for pulse operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
