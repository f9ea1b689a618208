// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Host app lifecycle notifications and the foreground resume watcher.
//!
//! The host publishes [`AppPhase`] changes through a [`HostLifecycle`]. The
//! [`AppLifecycleWatcher`] holds at most one listener on it and reports the
//! transitions that should resume a stalled connection: from `Inactive` or
//! `Background` to `Active`.

use pulse_core::AppPhase;
use tokio::sync::broadcast;
use tracing::{debug, warn};

const PHASE_BUFFER: usize = 16;

/// Host side of the lifecycle notifications.
#[derive(Debug, Clone)]
pub struct HostLifecycle {
    tx: broadcast::Sender<AppPhase>,
}

impl HostLifecycle {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(PHASE_BUFFER);
        HostLifecycle { tx }
    }

    /// Publish a phase change. Returns the number of listeners notified.
    pub fn notify(&self, phase: AppPhase) -> usize {
        self.tx.send(phase).unwrap_or(0)
    }

    /// Register a listener. Dropping it unsubscribes.
    pub fn listen(&self) -> LifecycleListener {
        LifecycleListener {
            rx: self.tx.subscribe(),
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for HostLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// A subscription to host lifecycle notifications.
#[derive(Debug)]
pub struct LifecycleListener {
    rx: broadcast::Receiver<AppPhase>,
}

impl LifecycleListener {
    /// Next phase change, or `None` once the host is gone.
    pub async fn next(&mut self) -> Option<AppPhase> {
        loop {
            match self.rx.recv().await {
                Ok(phase) => return Some(phase),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("lifecycle listener lagged by {} phase changes", n);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Detects the "was away, now active" transition.
#[derive(Debug)]
pub struct AppLifecycleWatcher {
    previous: AppPhase,
    listener: Option<LifecycleListener>,
}

impl AppLifecycleWatcher {
    /// Create an unmounted watcher that assumes `initial` as the current phase.
    pub fn new(initial: AppPhase) -> Self {
        AppLifecycleWatcher {
            previous: initial,
            listener: None,
        }
    }

    /// Start listening to `host`. Mounting twice keeps the first listener.
    pub fn mount(&mut self, host: &HostLifecycle) {
        if self.listener.is_none() {
            self.listener = Some(host.listen());
        }
    }

    /// Stop listening.
    pub fn unmount(&mut self) {
        self.listener = None;
    }

    pub fn is_mounted(&self) -> bool {
        self.listener.is_some()
    }

    pub fn previous(&self) -> AppPhase {
        self.previous
    }

    /// Record a phase change.
    ///
    /// Returns true iff the previous phase was `Inactive` or `Background`
    /// and `next` is `Active`.
    pub fn observe(&mut self, next: AppPhase) -> bool {
        let resume = self.previous.is_away() && next == AppPhase::Active;
        debug!(from = %self.previous, to = %next, resume, "app phase change");
        self.previous = next;
        resume
    }

    /// Wait for the next phase from the host.
    ///
    /// Never resolves while unmounted. Returns `None` when the host has gone
    /// away; the watcher unmounts itself in that case.
    pub async fn next_phase(&mut self) -> Option<AppPhase> {
        let phase = match self.listener.as_mut() {
            Some(listener) => listener.next().await,
            None => std::future::pending().await,
        };
        if phase.is_none() {
            self.listener = None;
        }
        phase
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
