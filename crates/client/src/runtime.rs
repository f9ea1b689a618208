// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The realtime event loop.
//!
//! One task owns the controller, the lifecycle watcher and the channel
//! manager, and processes one input at a time:
//!
//! ```text
//!   session signal ──┐
//!   transport events ┼──► RealtimeRuntime::run ──► controller ──► reconcile channel
//!   control requests ┤                         └─► watcher ──► resume
//!   host lifecycle ──┘
//! ```
//!
//! Every handler runs to completion before the next input is taken, so the
//! components need no locking between them.

use std::sync::Arc;

use pulse_core::AppPhase;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::access::{ControlRequest, RealtimeAccess};
use crate::auth::TokenSupplier;
use crate::channel::{CacheInvalidator, ChannelConfig, ChannelSubscriptionManager};
use crate::controller::{ConnectionController, ControllerConfig, ControllerInputs};
use crate::lifecycle::{AppLifecycleWatcher, HostLifecycle};
use crate::transport::{SessionEvent, TransportFactory};

/// Runtime settings.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub controller: ControllerConfig,
    pub channel: ChannelConfig,
    /// Phase the host is in when the runtime starts.
    pub initial_phase: AppPhase,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            controller: ControllerConfig::default(),
            channel: ChannelConfig::default(),
            initial_phase: AppPhase::Active,
        }
    }
}

/// Owns the realtime components for the lifetime of the host scope.
pub struct RealtimeRuntime<F: TransportFactory> {
    controller: ConnectionController<F>,
    inputs: ControllerInputs,
    watcher: AppLifecycleWatcher,
    channels: ChannelSubscriptionManager,
}

impl<F: TransportFactory> RealtimeRuntime<F> {
    /// Build the runtime and start listening to `host`.
    pub fn new(
        factory: F,
        supplier: Arc<dyn TokenSupplier>,
        invalidator: Arc<dyn CacheInvalidator>,
        host: &HostLifecycle,
        config: RuntimeConfig,
    ) -> Self {
        let (controller, inputs) = ConnectionController::new(factory, supplier, config.controller);
        let mut watcher = AppLifecycleWatcher::new(config.initial_phase);
        watcher.mount(host);

        RealtimeRuntime {
            controller,
            inputs,
            watcher,
            channels: ChannelSubscriptionManager::new(config.channel, invalidator),
        }
    }

    /// Read-only accessor for dependents.
    pub fn access(&self) -> RealtimeAccess {
        self.controller.access()
    }

    pub fn controller(&self) -> &ConnectionController<F> {
        &self.controller
    }

    pub fn channels(&self) -> &ChannelSubscriptionManager {
        &self.channels
    }

    pub fn watcher(&self) -> &AppLifecycleWatcher {
        &self.watcher
    }

    /// Run until `cancel` fires or the session signal is dropped, then tear
    /// everything down.
    pub async fn run(mut self, mut authenticated: watch::Receiver<bool>, cancel: CancellationToken) {
        let initial = *authenticated.borrow_and_update();
        self.on_authenticated(initial).await;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("realtime runtime cancelled");
                    break;
                }
                changed = authenticated.changed() => {
                    if changed.is_err() {
                        debug!("session signal dropped");
                        break;
                    }
                    let signed_in = *authenticated.borrow_and_update();
                    self.on_authenticated(signed_in).await;
                }
                Some(event) = self.inputs.events.recv() => {
                    self.on_transport_event(event).await;
                }
                Some(request) = self.inputs.requests.recv() => {
                    self.on_request(request).await;
                }
                Some(phase) = self.watcher.next_phase() => {
                    self.on_phase(phase).await;
                }
            }
        }

        self.shutdown().await;
    }

    /// Apply a session signal change.
    pub async fn on_authenticated(&mut self, signed_in: bool) {
        if !signed_in {
            // leave the channel while the transport is still open
            self.channels.unmount(self.controller.transport_mut()).await;
        }
        self.controller.set_authenticated(signed_in).await;
        self.reconcile().await;
    }

    /// Apply one transport event.
    pub async fn on_transport_event(&mut self, event: SessionEvent) {
        if let Some(message) = self.controller.handle_event(event) {
            self.channels.dispatch(&message);
        }
        self.reconcile().await;
    }

    /// Apply one control request from a connection handle.
    pub async fn on_request(&mut self, request: ControlRequest) {
        self.controller.handle_request(request).await;
        self.reconcile().await;
    }

    /// Apply one host phase change.
    pub async fn on_phase(&mut self, phase: AppPhase) {
        if self.watcher.observe(phase) {
            self.controller.resume_if_stalled().await;
        }
    }

    /// Unsubscribe, close the connection and stop listening to the host.
    pub async fn shutdown(&mut self) {
        self.channels.unmount(self.controller.transport_mut()).await;
        self.controller.close().await;
        self.watcher.unmount();
        info!("realtime runtime stopped");
    }

    /// Drain transport events and control requests that are already queued.
    ///
    /// Lets callers that drive the runtime by hand settle it without
    /// spawning [`RealtimeRuntime::run`].
    pub async fn drain(&mut self) {
        loop {
            if let Ok(event) = self.inputs.events.try_recv() {
                self.on_transport_event(event).await;
            } else if let Ok(request) = self.inputs.requests.try_recv() {
                self.on_request(request).await;
            } else {
                break;
            }
        }
    }

    async fn reconcile(&mut self) {
        let signed_in = self.controller.authenticated();
        let state = self.controller.state();
        self.channels
            .reconcile(signed_in, state, self.controller.transport_mut())
            .await;
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
