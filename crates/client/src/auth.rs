// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Credential supply and the bounded-retry authentication gate.
//!
//! The transport asks [`AuthGate::authenticate`] for a token request every
//! time it needs one: initial connect, token renewal, reconnect after an
//! auth failure. The gate forwards to a [`TokenSupplier`] and counts
//! consecutive failures. Once the count reaches the ceiling the gate stops
//! calling the supplier for the rest of the session and fails every further
//! attempt with [`AuthError::Exhausted`].
//!
//! One gate exists per connection session. The counter is never persisted
//! and is dropped with the session on teardown.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use pulse_core::{Credential, TokenParams, TokenRequest};
use tracing::{debug, error, warn};

use crate::BoxFuture;

/// Consecutive failures tolerated before the gate refuses further attempts.
pub const DEFAULT_AUTH_CEILING: u32 = 3;

/// Error reported by a token supplier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SupplierError {
    /// The credential issuer could not be reached.
    #[error("credential issuer unreachable: {0}")]
    Unreachable(String),

    /// The credential issuer refused to issue a credential.
    #[error("credential issuer rejected the request: {0}")]
    Rejected(String),
}

/// Error returned by [`AuthGate::authenticate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The failure ceiling was reached; the supplier is no longer called.
    #[error("authentication failed after multiple attempts ({attempts} consecutive failures)")]
    Exhausted { attempts: u32 },

    /// The supplier failed.
    #[error("token supplier failed: {0}")]
    Supplier(#[from] SupplierError),

    /// The supplier returned no usable token request.
    #[error("token supplier returned an empty credential")]
    EmptyCredential,
}

impl AuthError {
    /// True for the terminal exhaustion error.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, AuthError::Exhausted { .. })
    }
}

/// Source of connection credentials.
///
/// Implementations may cache credentials internally; `clear_cache` must drop
/// anything cached so the next fetch issues a fresh credential.
pub trait TokenSupplier: Send + Sync {
    /// Fetch a credential for the given parameters.
    ///
    /// `Ok(None)` means the supplier had nothing to return and is counted as
    /// a failure by the gate.
    fn fetch_credential<'a>(
        &'a self,
        params: &'a TokenParams,
    ) -> BoxFuture<'a, Result<Option<Credential>, SupplierError>>;

    /// Drop any cached credential.
    fn clear_cache(&self);
}

/// Bounded-retry wrapper around a [`TokenSupplier`].
///
/// Cloning shares the failure counter, so the transport and the controller
/// see the same session state.
#[derive(Clone)]
pub struct AuthGate {
    inner: Arc<GateInner>,
}

struct GateInner {
    supplier: Arc<dyn TokenSupplier>,
    failures: AtomicU32,
    ceiling: u32,
    session: u64,
}

impl AuthGate {
    /// Create a gate for one connection session.
    pub fn new(supplier: Arc<dyn TokenSupplier>, ceiling: u32, session: u64) -> Self {
        AuthGate {
            inner: Arc::new(GateInner {
                supplier,
                failures: AtomicU32::new(0),
                ceiling,
                session,
            }),
        }
    }

    /// Fetch a token request, honoring the failure ceiling.
    pub async fn authenticate(&self, params: &TokenParams) -> Result<TokenRequest, AuthError> {
        let session = self.inner.session;
        let failures = self.failures();
        if failures >= self.inner.ceiling {
            error!(
                session,
                failures,
                "authentication failed after multiple attempts; credential issuer is likely misconfigured"
            );
            return Err(AuthError::Exhausted { attempts: failures });
        }

        debug!(session, failures, "requesting credential");
        let outcome = match self.inner.supplier.fetch_credential(params).await {
            Ok(Some(credential)) => credential
                .into_token_request()
                .ok_or(AuthError::EmptyCredential),
            Ok(None) => Err(AuthError::EmptyCredential),
            Err(e) => Err(AuthError::Supplier(e)),
        };

        match outcome {
            Ok(request) => {
                self.inner.failures.store(0, Ordering::Release);
                debug!(session, key = %request.key_name, "credential issued");
                Ok(request)
            }
            Err(e) => {
                let failures = self
                    .inner
                    .failures
                    .fetch_add(1, Ordering::AcqRel)
                    .saturating_add(1);
                warn!(session, failures, ceiling = self.inner.ceiling, "credential fetch failed: {}", e);
                Err(e)
            }
        }
    }

    /// Callback-style variant of [`AuthGate::authenticate`].
    ///
    /// `done` is invoked exactly once with the outcome.
    pub async fn authenticate_with<F>(&self, params: &TokenParams, done: F)
    where
        F: FnOnce(Result<TokenRequest, AuthError>) + Send,
    {
        done(self.authenticate(params).await);
    }

    /// Current number of consecutive failures.
    pub fn failures(&self) -> u32 {
        self.inner.failures.load(Ordering::Acquire)
    }

    pub fn ceiling(&self) -> u32 {
        self.inner.ceiling
    }

    /// True once the gate refuses further attempts.
    pub fn is_exhausted(&self) -> bool {
        self.failures() >= self.inner.ceiling
    }

    /// The session this gate belongs to.
    pub fn session(&self) -> u64 {
        self.inner.session
    }

    /// Clear the supplier's credential cache.
    pub fn clear_cache(&self) {
        self.inner.supplier.clear_cache();
    }
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate")
            .field("session", &self.inner.session)
            .field("failures", &self.failures())
            .field("ceiling", &self.inner.ceiling)
            .finish()
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
