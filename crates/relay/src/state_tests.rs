// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use pulse_core::TokenParams;

const T0: i64 = 1_700_000_000_000;

fn clock() -> i64 {
    T0
}

fn state() -> RelayState {
    RelayState::with_clock([("app.key".to_string(), "s3cret".to_string())], clock)
}

fn request(key: &str, secret: &str, issued_at: i64) -> TokenRequest {
    TokenRequest::sign(
        key,
        secret,
        &TokenParams::for_channel("inventory"),
        issued_at,
        60_000,
        "n1",
    )
}

#[test]
fn valid_request_is_authorized() {
    assert!(state().authorize(&request("app.key", "s3cret", T0)).is_ok());
}

#[test]
fn unknown_key_is_rejected() {
    let err = state()
        .authorize(&request("other.key", "s3cret", T0))
        .unwrap_err();
    assert_eq!(err.code, ERR_UNKNOWN_KEY);
    assert!(err.message.contains("other.key"));
}

#[test]
fn wrong_secret_is_a_signature_mismatch() {
    let err = state()
        .authorize(&request("app.key", "wrong", T0))
        .unwrap_err();
    assert_eq!(err.code, ERR_SIGNATURE_MISMATCH);
}

#[test]
fn tampered_capability_is_a_signature_mismatch() {
    let mut tampered = request("app.key", "s3cret", T0);
    tampered.capability = vec!["*".to_string()];

    let err = state().authorize(&tampered).unwrap_err();
    assert_eq!(err.code, ERR_SIGNATURE_MISMATCH);
}

#[test]
fn expired_request_is_rejected() {
    let err = state()
        .authorize(&request("app.key", "s3cret", T0 - 120_000))
        .unwrap_err();
    assert_eq!(err.code, ERR_TOKEN_EXPIRED);
}

#[test]
fn connection_ids_are_unique() {
    let state = state();
    assert_eq!(state.next_connection_id(), "conn-1");
    assert_eq!(state.next_connection_id(), "conn-2");
}

#[tokio::test]
async fn published_events_reach_subscribers() {
    let state = state();
    assert_eq!(
        state.publish(ChannelEvent {
            channel: "inventory".into(),
            name: "resource.created".into(),
            data: serde_json::Value::Null,
        }),
        0
    );

    let mut rx = state.subscribe();
    let event = ChannelEvent {
        channel: "inventory".into(),
        name: "resource.created".into(),
        data: serde_json::json!({"id": 1}),
    };
    assert_eq!(state.publish(event.clone()), 1);
    assert_eq!(rx.recv().await.unwrap(), event);
}
