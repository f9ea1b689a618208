// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only view of the realtime connection for dependents.
//!
//! The controller publishes a [`RealtimeStatus`] on a watch channel. Any
//! number of [`RealtimeAccess`] values can read it; none can change it.
//! Actions such as resume or close go back to the controller as
//! [`ControlRequest`]s through a [`ConnectionHandle`].

use pulse_core::ConnectionState;
use tokio::sync::{mpsc, watch};

use crate::transport::SessionId;

/// An action a dependent asks the controller to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRequest {
    /// Resume the connection if it is disconnected or suspended.
    Resume { session: SessionId },
    /// Close the connection.
    Close { session: SessionId },
}

/// Handle to the live connection of one session.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    session: SessionId,
    requests: mpsc::UnboundedSender<ControlRequest>,
}

impl ConnectionHandle {
    pub(crate) fn new(session: SessionId, requests: mpsc::UnboundedSender<ControlRequest>) -> Self {
        ConnectionHandle { session, requests }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Ask the controller to resume a stalled connection.
    ///
    /// Returns false if the controller is gone. Requests for a session that
    /// has since ended are ignored by the controller.
    pub fn request_resume(&self) -> bool {
        self.requests
            .send(ControlRequest::Resume {
                session: self.session,
            })
            .is_ok()
    }

    /// Ask the controller to close the connection.
    ///
    /// This ends the session but leaves the signed-in flag alone. A
    /// foreground resume will not reopen it; the next sign-in signal
    /// starts a new session.
    pub fn request_close(&self) -> bool {
        self.requests
            .send(ControlRequest::Close {
                session: self.session,
            })
            .is_ok()
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.session == other.session
    }
}

impl Eq for ConnectionHandle {}

/// Snapshot of what the controller publishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeStatus {
    pub state: ConnectionState,
    pub connection: Option<ConnectionHandle>,
}

impl RealtimeStatus {
    pub fn initial() -> Self {
        RealtimeStatus {
            state: ConnectionState::Initial,
            connection: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected() && self.connection.is_some()
    }
}

impl Default for RealtimeStatus {
    fn default() -> Self {
        Self::initial()
    }
}

/// Error returned when the publishing controller no longer exists.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("realtime scope has ended; the controller publishing this status is gone")]
    ScopeEnded,
}

/// Read-only accessor for `{ is_connected, connection }`.
#[derive(Debug, Clone)]
pub struct RealtimeAccess {
    rx: watch::Receiver<RealtimeStatus>,
}

impl RealtimeAccess {
    pub(crate) fn new(rx: watch::Receiver<RealtimeStatus>) -> Self {
        RealtimeAccess { rx }
    }

    pub fn is_connected(&self) -> bool {
        self.rx.borrow().is_connected()
    }

    pub fn connection(&self) -> Option<ConnectionHandle> {
        self.rx.borrow().connection.clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.rx.borrow().state
    }

    pub fn status(&self) -> RealtimeStatus {
        self.rx.borrow().clone()
    }

    /// Wait for the next published change.
    pub async fn changed(&mut self) -> Result<RealtimeStatus, AccessError> {
        self.rx
            .changed()
            .await
            .map_err(|_| AccessError::ScopeEnded)?;
        Ok(self.rx.borrow_and_update().clone())
    }

    /// Wait until the published status satisfies `predicate`.
    pub async fn wait_for<P>(&mut self, mut predicate: P) -> Result<RealtimeStatus, AccessError>
    where
        P: FnMut(&RealtimeStatus) -> bool,
    {
        let status = self
            .rx
            .wait_for(|s| predicate(s))
            .await
            .map_err(|_| AccessError::ScopeEnded)?;
        Ok(status.clone())
    }

    /// False once the controller has been dropped.
    pub fn is_live(&self) -> bool {
        self.rx.has_changed().is_ok()
    }
}

#[cfg(test)]
#[path = "access_tests.rs"]
mod tests;
