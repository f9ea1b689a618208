// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared mocks for controller, channel and runtime tests.

#![allow(clippy::unwrap_used)]
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use pulse_core::{ConnectionState, Credential, TokenParams, TokenRequest, TransportState};

use crate::access::RealtimeAccess;
use crate::auth::{AuthGate, SupplierError, TokenSupplier};
use crate::channel::CacheInvalidator;
use crate::transport::{
    ChannelMessage, ErrorInfo, EventSink, StateChange, Transport, TransportError,
    TransportFactory, TransportResult,
};
use crate::BoxFuture;

/// A signed credential for the `inventory` channel.
pub fn test_credential() -> Credential {
    Credential::from_request(TokenRequest::sign(
        "test.key",
        "secret",
        &TokenParams::for_channel("inventory"),
        1_000,
        60_000,
        "nonce",
    ))
}

/// Records teardown steps with the published status at the time of each.
#[derive(Clone, Default)]
pub struct StepRecorder {
    steps: Arc<Mutex<Vec<(&'static str, ConnectionState, bool)>>>,
    access: Arc<Mutex<Option<RealtimeAccess>>>,
}

impl StepRecorder {
    pub fn watch(&self, access: RealtimeAccess) {
        *self.access.lock().unwrap() = Some(access);
    }

    pub fn record(&self, step: &'static str) {
        let (state, connected) = match self.access.lock().unwrap().as_ref() {
            Some(access) => (access.state(), access.is_connected()),
            None => (ConnectionState::Initial, false),
        };
        self.steps.lock().unwrap().push((step, state, connected));
    }

    pub fn steps(&self) -> Vec<(&'static str, ConnectionState, bool)> {
        self.steps.lock().unwrap().clone()
    }
}

type Outcome = Result<Option<Credential>, SupplierError>;

/// Token supplier with scripted outcomes.
///
/// Scripted outcomes are consumed first; after that every call returns the
/// fallback.
pub struct MockSupplier {
    script: Mutex<VecDeque<Outcome>>,
    fallback: Mutex<Outcome>,
    calls: AtomicU32,
    clears: AtomicU32,
    recorder: Mutex<Option<StepRecorder>>,
}

impl MockSupplier {
    pub fn succeeding() -> Arc<Self> {
        Arc::new(Self::with_fallback(Ok(Some(test_credential()))))
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self::with_fallback(Err(SupplierError::Unreachable(
            "network down".into(),
        ))))
    }

    fn with_fallback(fallback: Outcome) -> Self {
        MockSupplier {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
            calls: AtomicU32::new(0),
            clears: AtomicU32::new(0),
            recorder: Mutex::new(None),
        }
    }

    pub fn set_recorder(&self, recorder: StepRecorder) {
        *self.recorder.lock().unwrap() = Some(recorder);
    }

    pub fn push(&self, outcome: Outcome) {
        self.script.lock().unwrap().push_back(outcome);
    }

    pub fn set_fallback(&self, outcome: Outcome) {
        *self.fallback.lock().unwrap() = outcome;
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn clears(&self) -> u32 {
        self.clears.load(Ordering::SeqCst)
    }
}

impl TokenSupplier for MockSupplier {
    fn fetch_credential<'a>(
        &'a self,
        _params: &'a TokenParams,
    ) -> BoxFuture<'a, Result<Option<Credential>, SupplierError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let scripted = self.script.lock().unwrap().pop_front();
            scripted.unwrap_or_else(|| self.fallback.lock().unwrap().clone())
        })
    }

    fn clear_cache(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
        if let Some(recorder) = self.recorder.lock().unwrap().as_ref() {
            recorder.record("clear");
        }
    }
}

/// What a mock transport has been asked to do.
#[derive(Debug)]
pub struct TransportLog {
    pub state: TransportState,
    pub connect_calls: u32,
    pub close_calls: u32,
    pub subscribes: Vec<String>,
    pub unsubscribes: Vec<String>,
    pub fail_subscribe: bool,
}

impl Default for TransportLog {
    fn default() -> Self {
        TransportLog {
            state: TransportState::Initialized,
            connect_calls: 0,
            close_calls: 0,
            subscribes: Vec::new(),
            unsubscribes: Vec::new(),
            fail_subscribe: false,
        }
    }
}

/// Mock transport. Clones share the same log, so tests keep a clone to
/// inspect and drive the one owned by the controller.
#[derive(Clone)]
pub struct MockTransport {
    log: Arc<Mutex<TransportLog>>,
    sink: EventSink,
    gate: AuthGate,
    recorder: Option<StepRecorder>,
}

impl MockTransport {
    pub fn gate(&self) -> &AuthGate {
        &self.gate
    }

    pub fn session(&self) -> u64 {
        self.sink.session()
    }

    pub fn connect_calls(&self) -> u32 {
        self.log.lock().unwrap().connect_calls
    }

    pub fn close_calls(&self) -> u32 {
        self.log.lock().unwrap().close_calls
    }

    pub fn subscribes(&self) -> Vec<String> {
        self.log.lock().unwrap().subscribes.clone()
    }

    pub fn unsubscribes(&self) -> Vec<String> {
        self.log.lock().unwrap().unsubscribes.clone()
    }

    pub fn set_fail_subscribe(&self, fail: bool) {
        self.log.lock().unwrap().fail_subscribe = fail;
    }

    /// Set the low-level state without reporting it.
    pub fn set_state(&self, state: TransportState) {
        self.log.lock().unwrap().state = state;
    }

    /// Move to `state` and report the change through the sink.
    pub fn emit(&self, state: TransportState) {
        self.emit_with(state, None);
    }

    /// Report a failure with the given reason.
    pub fn emit_failed(&self, code: u16, message: &str) {
        self.emit_with(TransportState::Failed, Some(ErrorInfo::new(code, message)));
    }

    fn emit_with(&self, current: TransportState, reason: Option<ErrorInfo>) {
        let previous = {
            let mut log = self.log.lock().unwrap();
            std::mem::replace(&mut log.state, current)
        };
        self.sink.state(StateChange {
            previous,
            current,
            reason,
        });
    }

    /// Deliver an inbound channel message.
    pub fn deliver(&self, channel: &str, name: &str) {
        self.sink.message(ChannelMessage::new(channel, name));
    }
}

impl Transport for MockTransport {
    fn connect(&mut self) -> BoxFuture<'_, TransportResult<()>> {
        Box::pin(async move {
            let mut log = self.log.lock().unwrap();
            log.connect_calls += 1;
            log.state = TransportState::Connecting;
            Ok(())
        })
    }

    fn close(&mut self) -> BoxFuture<'_, TransportResult<()>> {
        Box::pin(async move {
            if let Some(recorder) = &self.recorder {
                recorder.record("close");
            }
            let mut log = self.log.lock().unwrap();
            log.close_calls += 1;
            log.state = TransportState::Closed;
            Ok(())
        })
    }

    fn state(&self) -> TransportState {
        self.log.lock().unwrap().state
    }

    fn subscribe<'a>(&'a mut self, channel: &'a str) -> BoxFuture<'a, TransportResult<()>> {
        Box::pin(async move {
            let mut log = self.log.lock().unwrap();
            if log.fail_subscribe {
                return Err(TransportError::SendFailed("mock failure".into()));
            }
            log.subscribes.push(channel.to_string());
            Ok(())
        })
    }

    fn unsubscribe<'a>(&'a mut self, channel: &'a str) -> BoxFuture<'a, TransportResult<()>> {
        Box::pin(async move {
            self.log.lock().unwrap().unsubscribes.push(channel.to_string());
            Ok(())
        })
    }
}

/// Factory that records every transport it creates.
#[derive(Clone, Default)]
pub struct MockFactory {
    created: Arc<Mutex<Vec<MockTransport>>>,
    recorder: Arc<Mutex<Option<StepRecorder>>>,
}

impl MockFactory {
    /// Transports created from now on record their `close` calls.
    pub fn set_recorder(&self, recorder: StepRecorder) {
        *self.recorder.lock().unwrap() = Some(recorder);
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn transport(&self, index: usize) -> MockTransport {
        self.created.lock().unwrap()[index].clone()
    }

    pub fn last(&self) -> MockTransport {
        self.created.lock().unwrap().last().cloned().unwrap()
    }
}

impl TransportFactory for MockFactory {
    type Transport = MockTransport;

    fn create(&mut self, auth: AuthGate, events: EventSink) -> MockTransport {
        let transport = MockTransport {
            log: Arc::new(Mutex::new(TransportLog::default())),
            sink: events,
            gate: auth,
            recorder: self.recorder.lock().unwrap().clone(),
        };
        self.created.lock().unwrap().push(transport.clone());
        transport
    }
}

/// Cache invalidator that records requested query keys.
#[derive(Clone, Default)]
pub struct MockInvalidator {
    keys: Arc<Mutex<Vec<String>>>,
}

impl MockInvalidator {
    pub fn keys(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }
}

impl CacheInvalidator for MockInvalidator {
    fn refetch_active(&self, query_key: &str) -> BoxFuture<'static, ()> {
        self.keys.lock().unwrap().push(query_key.to_string());
        Box::pin(async {})
    }
}
