// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Signed token requests used to authenticate realtime connections.
//!
//! A [`TokenRequest`] is a short-lived, capability-scoped payload signed with
//! a shared key secret. The client presents it when connecting; the relay
//! recomputes the MAC over the canonical field string and checks expiry.
//!
//! The MAC is hex-encoded HMAC-SHA256 of the canonical string, keyed with
//! the secret.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Capability entry that grants access to every channel.
pub const WILDCARD_CAPABILITY: &str = "*";

/// Parameters a transport passes when it asks for a credential.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenParams {
    /// Client identity to bind the token to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Channels the connection needs access to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capability: Vec<String>,
}

impl TokenParams {
    pub fn for_channel(channel: impl Into<String>) -> Self {
        TokenParams {
            client_id: None,
            capability: vec![channel.into()],
        }
    }
}

/// The signable payload handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRequest {
    pub key_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub capability: Vec<String>,
    /// Issue time, milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    /// Lifetime in milliseconds.
    pub ttl_ms: u64,
    pub nonce: String,
    pub mac: String,
}

impl TokenRequest {
    /// Builds and signs a token request.
    pub fn sign(
        key_name: impl Into<String>,
        secret: &str,
        params: &TokenParams,
        timestamp_ms: i64,
        ttl_ms: u64,
        nonce: impl Into<String>,
    ) -> Self {
        let mut request = TokenRequest {
            key_name: key_name.into(),
            client_id: params.client_id.clone(),
            capability: params.capability.clone(),
            timestamp_ms,
            ttl_ms,
            nonce: nonce.into(),
            mac: String::new(),
        };
        request.mac = compute_mac(secret, &request.canonical());
        request
    }

    /// The newline-joined field string the MAC covers.
    pub fn canonical(&self) -> String {
        let mut capability = self.capability.clone();
        capability.sort();
        format!(
            "{}\n{}\n{}\n{}\n{}\n{}\n",
            self.key_name,
            self.ttl_ms,
            capability.join(","),
            self.client_id.as_deref().unwrap_or(""),
            self.timestamp_ms,
            self.nonce,
        )
    }

    /// Checks the MAC against `secret`.
    pub fn verify(&self, secret: &str) -> Result<()> {
        let mismatch = || Error::SignatureMismatch {
            key_name: self.key_name.clone(),
        };
        let provided = hex::decode(&self.mac).map_err(|_| mismatch())?;
        let mut mac = keyed(secret).ok_or_else(mismatch)?;
        mac.update(self.canonical().as_bytes());
        mac.verify_slice(&provided).map_err(|_| mismatch())
    }

    /// Expiry time in milliseconds since the Unix epoch.
    pub fn expires_at_ms(&self) -> i64 {
        self.timestamp_ms
            .saturating_add(i64::try_from(self.ttl_ms).unwrap_or(i64::MAX))
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at_ms()
    }

    /// A request without a key name or MAC cannot authenticate anything.
    pub fn is_blank(&self) -> bool {
        self.key_name.trim().is_empty() || self.mac.trim().is_empty()
    }

    /// Whether the capability grants access to `channel`.
    pub fn allows(&self, channel: &str) -> bool {
        self.capability
            .iter()
            .any(|c| c == WILDCARD_CAPABILITY || c == channel)
    }
}

/// A credential as returned by a token supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// The signed payload. `None` means the supplier came back empty.
    pub token_request: Option<TokenRequest>,
    pub expires_at_ms: i64,
    #[serde(default)]
    pub capability: Vec<String>,
}

impl Credential {
    /// Wraps a signed request, copying its expiry and capability.
    pub fn from_request(request: TokenRequest) -> Self {
        Credential {
            expires_at_ms: request.expires_at_ms(),
            capability: request.capability.clone(),
            token_request: Some(request),
        }
    }

    /// Extracts the token request, treating a blank one as absent.
    pub fn into_token_request(self) -> Option<TokenRequest> {
        self.token_request.filter(|r| !r.is_blank())
    }

    /// True if the credential is still usable `margin_ms` from now.
    pub fn is_fresh(&self, now_ms: i64, margin_ms: i64) -> bool {
        self.token_request.is_some() && now_ms.saturating_add(margin_ms) < self.expires_at_ms
    }
}

fn keyed(secret: &str) -> Option<HmacSha256> {
    HmacSha256::new_from_slice(secret.as_bytes()).ok()
}

/// Empty if the key is rejected, which leaves the request blank.
fn compute_mac(secret: &str, canonical: &str) -> String {
    let Some(mut mac) = keyed(secret) else {
        return String::new();
    };
    mac.update(canonical.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
