// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for the transport module.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::*;
use crate::auth::AuthError;
use crate::test_helpers::{MockFactory, MockSupplier};

#[test]
fn signature_mismatch_is_recognized() {
    let info = ErrorInfo::new(ERR_SIGNATURE_MISMATCH, "bad mac");
    assert!(info.is_signature_mismatch());
    assert!(!ErrorInfo::new(CODE_CONNECTION_LOST, "lost").is_signature_mismatch());
}

#[test]
fn auth_error_info_keeps_exhaustion_message() {
    let info = ErrorInfo::from_auth(&AuthError::Exhausted { attempts: 3 });
    assert_eq!(info.code, CODE_AUTH_CALLBACK_FAILED);
    assert!(info
        .message
        .contains("authentication failed after multiple attempts"));
}

#[test]
fn error_info_display_includes_code() {
    let info = ErrorInfo::new(CODE_UNREACHABLE, "refused");
    assert_eq!(info.to_string(), "refused (code 80000)");
}

#[test]
fn event_sink_tags_session() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let sink = EventSink::new(7, tx);

    assert!(sink.message(ChannelMessage::new("inventory", "resource.created")));

    let event = rx.try_recv().unwrap();
    assert_eq!(event.session, 7);
    assert!(matches!(
        event.event,
        TransportEvent::Message(ChannelMessage { ref name, .. }) if name == "resource.created"
    ));
}

#[test]
fn event_sink_reports_closed_receiver() {
    let (tx, rx) = mpsc::unbounded_channel();
    let sink = EventSink::new(1, tx);
    drop(rx);
    assert!(!sink.message(ChannelMessage::new("c", "n")));
}

#[tokio::test]
async fn mock_transport_records_calls() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut factory = MockFactory::default();
    let gate = AuthGate::new(MockSupplier::succeeding(), 3, 1);
    let mut transport = factory.create(gate, EventSink::new(1, tx));

    assert_eq!(transport.state(), TransportState::Initialized);
    transport.connect().await.unwrap();
    assert_eq!(transport.state(), TransportState::Connecting);

    transport.subscribe("inventory").await.unwrap();
    transport.unsubscribe("inventory").await.unwrap();
    transport.close().await.unwrap();

    let probe = factory.last();
    assert_eq!(probe.connect_calls(), 1);
    assert_eq!(probe.close_calls(), 1);
    assert_eq!(probe.subscribes(), vec!["inventory".to_string()]);
    assert_eq!(probe.unsubscribes(), vec!["inventory".to_string()]);

    probe.emit(TransportState::Connected);
    let event = rx.try_recv().unwrap();
    assert_eq!(
        event.event,
        TransportEvent::State(StateChange {
            previous: TransportState::Closed,
            current: TransportState::Connected,
            reason: None,
        })
    );
}
