// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Local token signing with an API key.
//!
//! [`KeySigner`] is a [`TokenSupplier`] that signs token requests itself
//! instead of asking a credential issuer over the network. It is what the
//! `pulse-watch` binary uses against a development relay.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use pulse_core::{Credential, TokenParams, TokenRequest};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::auth::{SupplierError, TokenSupplier};
use crate::BoxFuture;

/// A cached credential is renewed this long before it expires.
pub const RENEW_MARGIN: Duration = Duration::from_secs(30);

/// Signs token requests with a key name and secret, caching the last one.
pub struct KeySigner {
    key_name: String,
    secret: String,
    ttl: Duration,
    client_id: Option<String>,
    clock: fn() -> i64,
    cache: Mutex<Option<(TokenParams, Credential)>>,
    counter: AtomicU64,
}

impl KeySigner {
    pub fn new(key_name: impl Into<String>, secret: impl Into<String>, ttl: Duration) -> Self {
        KeySigner {
            key_name: key_name.into(),
            secret: secret.into(),
            ttl,
            client_id: None,
            clock: now_ms,
            cache: Mutex::new(None),
            counter: AtomicU64::new(0),
        }
    }

    /// Client identity used when the transport does not ask for one.
    pub fn with_client_id(mut self, client_id: Option<String>) -> Self {
        self.client_id = client_id;
        self
    }

    /// Replace the wall clock (milliseconds since the Unix epoch).
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    /// Number of token requests signed so far.
    pub fn issued(&self) -> u64 {
        self.counter.load(Ordering::Acquire)
    }

    /// Sign a fresh credential for `params`, bypassing the cache.
    pub fn sign(&self, params: &TokenParams) -> Result<Credential, SupplierError> {
        if self.key_name.trim().is_empty() || self.secret.is_empty() {
            return Err(SupplierError::Rejected(
                "key name and secret must be configured".to_string(),
            ));
        }

        let params = TokenParams {
            client_id: params.client_id.clone().or_else(|| self.client_id.clone()),
            capability: params.capability.clone(),
        };
        let now = (self.clock)();
        let sequence = self.counter.fetch_add(1, Ordering::AcqRel).saturating_add(1);
        let ttl_ms = u64::try_from(self.ttl.as_millis()).unwrap_or(u64::MAX);
        let request = TokenRequest::sign(
            self.key_name.clone(),
            &self.secret,
            &params,
            now,
            ttl_ms,
            nonce(&self.key_name, now, sequence),
        );
        debug!(key = %self.key_name, sequence, "signed token request");
        Ok(Credential::from_request(request))
    }

    fn cached(&self, params: &TokenParams, now: i64) -> Option<Credential> {
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        let margin = i64::try_from(RENEW_MARGIN.as_millis()).unwrap_or(i64::MAX);
        match cache.as_ref() {
            Some((cached_for, credential))
                if cached_for == params && credential.is_fresh(now, margin) =>
            {
                Some(credential.clone())
            }
            _ => None,
        }
    }
}

impl TokenSupplier for KeySigner {
    fn fetch_credential<'a>(
        &'a self,
        params: &'a TokenParams,
    ) -> BoxFuture<'a, Result<Option<Credential>, SupplierError>> {
        Box::pin(async move {
            if let Some(credential) = self.cached(params, (self.clock)()) {
                debug!(key = %self.key_name, "reusing cached credential");
                return Ok(Some(credential));
            }

            let credential = self.sign(params)?;
            let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            *cache = Some((params.clone(), credential.clone()));
            Ok(Some(credential))
        })
    }

    fn clear_cache(&self) {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if cache.take().is_some() {
            debug!(key = %self.key_name, "credential cache cleared");
        }
    }
}

impl std::fmt::Debug for KeySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySigner")
            .field("key_name", &self.key_name)
            .field("secret", &"<redacted>")
            .field("ttl", &self.ttl)
            .field("client_id", &self.client_id)
            .finish()
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// 16 hex chars derived from the key, the time and a per-signer sequence.
fn nonce(key_name: &str, now_ms: i64, sequence: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key_name.as_bytes());
    hasher.update(now_ms.to_le_bytes());
    hasher.update(sequence.to_le_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}

#[cfg(test)]
#[path = "signer_tests.rs"]
mod tests;
