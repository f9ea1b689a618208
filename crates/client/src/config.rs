// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client configuration.
//!
//! Configuration is stored in `pulse.toml` and has two sections:
//! - `[realtime]`: where to connect, which channel to watch, retry tuning
//! - `[key]`: the API key the local signer uses to issue token requests
//!
//! Every field has a default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::DEFAULT_AUTH_CEILING;
use crate::channel::{ChannelConfig, DEFAULT_CHANNEL, DEFAULT_EVENT, DEFAULT_QUERY_KEY};
use crate::controller::ControllerConfig;
use crate::error::{Error, Result};
use crate::runtime::RuntimeConfig;
use crate::signer::KeySigner;
use crate::websocket::WebSocketOptions;

const CONFIG_DIR_NAME: &str = "pulse";
const CONFIG_FILE_NAME: &str = "pulse.toml";

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub realtime: RealtimeConfig,
    #[serde(default)]
    pub key: KeyConfig,
}

/// Realtime connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Relay URL (`ws://` or `wss://`).
    #[serde(default = "default_url")]
    pub url: String,
    /// Channel to subscribe to.
    #[serde(default = "default_channel")]
    pub channel: String,
    /// Event name that triggers a refetch.
    #[serde(default = "default_event")]
    pub event: String,
    /// Query key refetched when the event arrives.
    #[serde(default = "default_query_key")]
    pub query_key: String,
    /// Consecutive credential failures tolerated per session (default: 3).
    #[serde(default = "default_auth_ceiling")]
    pub auth_ceiling: u32,
    /// Initial delay for exponential backoff in milliseconds (default: 100).
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Maximum delay between reconnection attempts in seconds (default: 30).
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
    /// Seconds of failed reconnection before the connection is suspended
    /// (default: 120).
    #[serde(default = "default_suspend_after_secs")]
    pub suspend_after_secs: u64,
}

fn default_url() -> String {
    "ws://127.0.0.1:7891".to_string()
}

fn default_channel() -> String {
    DEFAULT_CHANNEL.to_string()
}

fn default_event() -> String {
    DEFAULT_EVENT.to_string()
}

fn default_query_key() -> String {
    DEFAULT_QUERY_KEY.to_string()
}

fn default_auth_ceiling() -> u32 {
    DEFAULT_AUTH_CEILING
}

fn default_initial_delay_ms() -> u64 {
    100
}

fn default_max_delay_secs() -> u64 {
    30
}

fn default_suspend_after_secs() -> u64 {
    120
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        RealtimeConfig {
            url: default_url(),
            channel: default_channel(),
            event: default_event(),
            query_key: default_query_key(),
            auth_ceiling: default_auth_ceiling(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_secs: default_max_delay_secs(),
            suspend_after_secs: default_suspend_after_secs(),
        }
    }
}

/// API key used to sign token requests locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub secret: String,
    /// Token lifetime in seconds (default: 3600).
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

fn default_ttl_secs() -> u64 {
    3600
}

impl Default for KeyConfig {
    fn default() -> Self {
        KeyConfig {
            name: String::new(),
            secret: String::new(),
            ttl_secs: default_ttl_secs(),
            client_id: None,
        }
    }
}

impl Config {
    /// Loads and validates configuration from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.display().to_string()));
        }
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config: {}", e)))?;
        Self::from_toml(&content)
    }

    /// Loads from the default path, falling back to defaults when the file
    /// does not exist.
    pub fn load_or_default() -> Result<Self> {
        match default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Config::default()),
        }
    }

    /// Parses and validates configuration text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let realtime = &self.realtime;
        if !(realtime.url.starts_with("ws://") || realtime.url.starts_with("wss://")) {
            return Err(Error::InvalidUrl(realtime.url.clone()));
        }
        if realtime.channel.trim().is_empty() {
            return Err(invalid("realtime.channel", "must not be empty"));
        }
        if realtime.event.trim().is_empty() {
            return Err(invalid("realtime.event", "must not be empty"));
        }
        if realtime.auth_ceiling == 0 {
            return Err(invalid("realtime.auth_ceiling", "must be at least 1"));
        }
        if self.key.ttl_secs == 0 {
            return Err(invalid("key.ttl_secs", "must be at least 1"));
        }
        Ok(())
    }

    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            controller: ControllerConfig {
                auth_ceiling: self.realtime.auth_ceiling,
            },
            channel: ChannelConfig {
                channel: self.realtime.channel.clone(),
                event: self.realtime.event.clone(),
                query_key: self.realtime.query_key.clone(),
            },
            ..RuntimeConfig::default()
        }
    }

    pub fn websocket_options(&self) -> WebSocketOptions {
        WebSocketOptions {
            url: self.realtime.url.clone(),
            channel: self.realtime.channel.clone(),
            client_id: self.key.client_id.clone(),
            initial_delay_ms: self.realtime.initial_delay_ms,
            max_delay_secs: self.realtime.max_delay_secs,
            suspend_after: Duration::from_secs(self.realtime.suspend_after_secs),
            ..WebSocketOptions::default()
        }
    }

    pub fn key_signer(&self) -> KeySigner {
        KeySigner::new(
            self.key.name.clone(),
            self.key.secret.clone(),
            Duration::from_secs(self.key.ttl_secs),
        )
        .with_client_id(self.key.client_id.clone())
    }
}

fn invalid(field: &str, reason: &str) -> Error {
    Error::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// `<config dir>/pulse/pulse.toml`, if the platform has a config dir.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
