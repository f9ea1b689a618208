// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection lifecycle controller.
//!
//! Owns the single transport of the signed-in session and drives the
//! published [`ConnectionState`]:
//!
//! ```text
//! Initial ──(signed in)──► Connecting ──connected──► Connected
//!                              ▲                        │
//!                              │                   disconnected
//!                           resume                      ▼
//!                              └──── Suspended ◄── Disconnected
//!
//! any ──failed──► Failed          any ──(sign-out / shutdown)──► Closed
//! ```
//!
//! Signing in again after a sign-out starts a new session: new session id,
//! new [`AuthGate`] with a fresh failure counter, new transport, and a
//! state machine that starts over from `Initial`.

use std::sync::Arc;

use pulse_core::{ConnectionState, TransportState};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::access::{ConnectionHandle, ControlRequest, RealtimeAccess, RealtimeStatus};
use crate::auth::{AuthGate, TokenSupplier, DEFAULT_AUTH_CEILING};
use crate::transport::{
    ChannelMessage, ErrorInfo, EventSink, SessionEvent, SessionId, StateChange, Transport,
    TransportEvent, TransportFactory, CODE_AUTH_CALLBACK_FAILED,
};

/// Controller settings.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Consecutive auth failures tolerated per session.
    pub auth_ceiling: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            auth_ceiling: DEFAULT_AUTH_CEILING,
        }
    }
}

/// Receivers the owning event loop must drain and hand back to the
/// controller.
pub struct ControllerInputs {
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
    pub requests: mpsc::UnboundedReceiver<ControlRequest>,
}

struct Session<T> {
    id: SessionId,
    transport: T,
    gate: AuthGate,
    handle: ConnectionHandle,
}

/// Owns the realtime connection across one authenticated session.
pub struct ConnectionController<F: TransportFactory> {
    factory: F,
    supplier: Arc<dyn TokenSupplier>,
    config: ControllerConfig,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    requests_tx: mpsc::UnboundedSender<ControlRequest>,
    status: watch::Sender<RealtimeStatus>,
    authenticated: bool,
    state: ConnectionState,
    session: Option<Session<F::Transport>>,
    last_session: SessionId,
}

impl<F: TransportFactory> ConnectionController<F> {
    /// Create a controller in the `Initial` state.
    ///
    /// Returns the controller and the receivers for transport events and
    /// control requests.
    pub fn new(
        factory: F,
        supplier: Arc<dyn TokenSupplier>,
        config: ControllerConfig,
    ) -> (Self, ControllerInputs) {
        let (events_tx, events) = mpsc::unbounded_channel();
        let (requests_tx, requests) = mpsc::unbounded_channel();
        let (status, _) = watch::channel(RealtimeStatus::initial());

        let controller = ConnectionController {
            factory,
            supplier,
            config,
            events_tx,
            requests_tx,
            status,
            authenticated: false,
            state: ConnectionState::Initial,
            session: None,
            last_session: 0,
        };

        (controller, ControllerInputs { events, requests })
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected() && self.session.is_some()
    }

    pub fn authenticated(&self) -> bool {
        self.authenticated
    }

    /// Handle to the live connection, if a session exists.
    pub fn handle(&self) -> Option<ConnectionHandle> {
        self.session.as_ref().map(|s| s.handle.clone())
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    pub fn auth_gate(&self) -> Option<&AuthGate> {
        self.session.as_ref().map(|s| &s.gate)
    }

    pub fn transport(&self) -> Option<&F::Transport> {
        self.session.as_ref().map(|s| &s.transport)
    }

    pub fn transport_mut(&mut self) -> Option<&mut F::Transport> {
        self.session.as_mut().map(|s| &mut s.transport)
    }

    /// A new read-only accessor for the published status.
    pub fn access(&self) -> RealtimeAccess {
        RealtimeAccess::new(self.status.subscribe())
    }

    /// Apply a change of the signed-in flag.
    ///
    /// Sign-out is handled before anything else can run, so a bootstrap can
    /// never observe a half torn-down session.
    pub async fn set_authenticated(&mut self, authenticated: bool) {
        let was = self.authenticated;
        self.authenticated = authenticated;

        if !authenticated {
            if was {
                info!("signed out; closing realtime connection");
            }
            self.close().await;
            return;
        }

        if self.session.is_none() {
            self.bootstrap().await;
        } else {
            debug!("already signed in; keeping current session");
        }
    }

    async fn bootstrap(&mut self) {
        self.last_session = self.last_session.saturating_add(1);
        let id = self.last_session;

        let gate = AuthGate::new(Arc::clone(&self.supplier), self.config.auth_ceiling, id);
        let sink = EventSink::new(id, self.events_tx.clone());
        let transport = self.factory.create(gate.clone(), sink);
        let handle = ConnectionHandle::new(id, self.requests_tx.clone());

        self.session = Some(Session {
            id,
            transport,
            gate,
            handle,
        });
        self.set_state(ConnectionState::Initial);
        self.set_state(ConnectionState::Connecting);
        info!(session = id, "starting realtime connection");

        let result = match self.session.as_mut() {
            Some(session) => session.transport.connect().await,
            None => return,
        };
        if let Err(e) = result {
            warn!(session = id, "realtime connect failed to start: {}", e);
            self.set_state(ConnectionState::Disconnected);
        }
    }

    /// Feed one transport event to the controller.
    ///
    /// Returns the channel message if the event carried one for the current
    /// session.
    pub fn handle_event(&mut self, event: SessionEvent) -> Option<ChannelMessage> {
        if self.session_id() != Some(event.session) {
            debug!(session = event.session, "dropping event from ended session");
            return None;
        }

        match event.event {
            TransportEvent::State(change) => {
                self.handle_state_change(change);
                None
            }
            TransportEvent::Message(message) => Some(message),
        }
    }

    fn handle_state_change(&mut self, change: StateChange) {
        let next = match change.current {
            TransportState::Initialized => return,
            TransportState::Connecting => ConnectionState::Connecting,
            TransportState::Connected => ConnectionState::Connected,
            TransportState::Disconnected => {
                if let Some(reason) = &change.reason {
                    debug!("realtime connection lost: {}", reason);
                }
                ConnectionState::Disconnected
            }
            TransportState::Suspended => {
                warn!("realtime connection suspended after prolonged connectivity loss");
                ConnectionState::Suspended
            }
            TransportState::Failed => {
                log_failure(change.reason.as_ref());
                ConnectionState::Failed
            }
            TransportState::Closed => ConnectionState::Closed,
        };

        debug!(from = %change.previous, to = %change.current, "transport state change");
        self.set_state(next);
    }

    /// Resume the connection if the transport is disconnected or suspended.
    ///
    /// Returns true if a connect call was issued.
    pub async fn resume_if_stalled(&mut self) -> bool {
        let Some(session) = self.session.as_mut() else {
            if self.authenticated {
                debug!("no session to resume; waiting for the next sign-in");
            }
            return false;
        };

        let transport_state = session.transport.state();
        if !transport_state.is_stalled() {
            debug!(state = %transport_state, "resume not needed");
            return false;
        }

        info!(session = session.id, state = %transport_state, "resuming realtime connection");
        if let Err(e) = session.transport.connect().await {
            warn!(session = session.id, "resume failed to start: {}", e);
        }
        true
    }

    /// Act on a request from a [`ConnectionHandle`].
    pub async fn handle_request(&mut self, request: ControlRequest) {
        let (session, resume) = match request {
            ControlRequest::Resume { session } => (session, true),
            ControlRequest::Close { session } => (session, false),
        };
        if self.session_id() != Some(session) {
            debug!(session, "ignoring request for ended session");
            return;
        }
        if resume {
            self.resume_if_stalled().await;
        } else {
            self.close().await;
        }
    }

    /// Tear the session down.
    ///
    /// Closes the transport, clears the credential cache, then publishes
    /// `Closed` with no connection handle. Calling it again, or without a
    /// session, does nothing.
    pub async fn close(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        if let Err(e) = session.transport.close().await {
            warn!(session = session.id, "error closing realtime transport: {}", e);
        }
        session.gate.clear_cache();
        self.set_state(ConnectionState::Closed);
        info!(session = session.id, "realtime connection closed");
    }

    fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
        let connection = self.handle();
        self.status.send_replace(RealtimeStatus { state, connection });
    }
}

fn log_failure(reason: Option<&ErrorInfo>) {
    match reason {
        Some(info) if info.is_signature_mismatch() => {
            error!(
                code = info.code,
                "realtime authentication rejected: token signature mismatch. \
                 The credential issuer and the realtime backend disagree on the signing key; \
                 this is a backend configuration problem, not a client error ({})",
                info.message
            );
        }
        Some(info) if info.code == CODE_AUTH_CALLBACK_FAILED => {
            error!(code = info.code, "realtime authentication failed: {}", info.message);
        }
        Some(info) => {
            error!(code = info.code, "realtime connection failed: {}", info.message);
        }
        None => {
            error!("realtime connection failed without a reason");
        }
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
