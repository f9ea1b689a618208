// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::auth::AuthGate;
use std::sync::Arc;

const T0: i64 = 1_700_000_000_000;

fn fixed_clock() -> i64 {
    T0
}

fn late_clock() -> i64 {
    // inside the renew margin of a one minute token issued at T0
    T0 + 45_000
}

fn signer() -> KeySigner {
    KeySigner::new("app.key", "s3cret", Duration::from_secs(60)).with_clock(fixed_clock)
}

fn params() -> TokenParams {
    TokenParams::for_channel("inventory")
}

#[tokio::test]
async fn signs_a_verifiable_request() {
    let signer = signer();

    let credential = signer.fetch_credential(&params()).await.unwrap().unwrap();
    let request = credential.token_request.clone().unwrap();

    assert!(request.verify("s3cret").is_ok());
    assert!(request.verify("other").is_err());
    assert_eq!(request.timestamp_ms, T0);
    assert_eq!(request.ttl_ms, 60_000);
    assert_eq!(credential.expires_at_ms, T0 + 60_000);
    assert!(request.allows("inventory"));
    assert_eq!(request.nonce.len(), 16);
}

#[tokio::test]
async fn fresh_credential_is_reused() {
    let signer = signer();

    let first = signer.fetch_credential(&params()).await.unwrap();
    let second = signer.fetch_credential(&params()).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(signer.issued(), 1);
}

#[tokio::test]
async fn credential_near_expiry_is_renewed() {
    let signer = signer();
    signer.fetch_credential(&params()).await.unwrap();

    let signer = KeySigner {
        clock: late_clock,
        ..signer
    };
    signer.fetch_credential(&params()).await.unwrap();

    assert_eq!(signer.issued(), 2);
}

#[tokio::test]
async fn different_params_are_not_served_from_cache() {
    let signer = signer();

    signer.fetch_credential(&params()).await.unwrap();
    signer
        .fetch_credential(&TokenParams::for_channel("orders"))
        .await
        .unwrap();

    assert_eq!(signer.issued(), 2);
}

#[tokio::test]
async fn clear_cache_forces_a_new_signature() {
    let signer = signer();
    let first = signer.fetch_credential(&params()).await.unwrap().unwrap();

    signer.clear_cache();
    let second = signer.fetch_credential(&params()).await.unwrap().unwrap();

    assert_ne!(
        first.token_request.unwrap().nonce,
        second.token_request.unwrap().nonce
    );
}

#[tokio::test]
async fn default_client_id_is_applied() {
    let signer = signer().with_client_id(Some("device-9".into()));

    let credential = signer.fetch_credential(&params()).await.unwrap().unwrap();

    assert_eq!(
        credential.token_request.unwrap().client_id.as_deref(),
        Some("device-9")
    );
}

#[tokio::test]
async fn missing_secret_is_rejected_and_counted_by_the_gate() {
    let signer = Arc::new(KeySigner::new("app.key", "", Duration::from_secs(60)));
    let gate = AuthGate::new(signer, 3, 1);

    let err = gate.authenticate(&params()).await.unwrap_err();

    assert!(err.to_string().contains("key name and secret"));
    assert_eq!(gate.failures(), 1);
}

#[test]
fn debug_output_hides_the_secret() {
    let rendered = format!("{:?}", signer());
    assert!(!rendered.contains("s3cret"));
    assert!(rendered.contains("app.key"));
}
