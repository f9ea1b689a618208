// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for pulse-core operations.

use thiserror::Error;

/// All possible errors that can occur in pulse-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("token request signature mismatch for key '{key_name}'\n  hint: the key secret used to sign does not match the one the server holds")]
    SignatureMismatch { key_name: String },

    #[error("invalid app phase: '{0}'\n  hint: valid phases are: active, inactive, background")]
    InvalidPhase(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for pulse-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
