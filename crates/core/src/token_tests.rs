// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

fn signed(secret: &str) -> TokenRequest {
    TokenRequest::sign(
        "app.key",
        secret,
        &TokenParams::for_channel("inventory"),
        1_000,
        60_000,
        "nonce-1",
    )
}

#[test]
fn signed_request_verifies_with_same_secret() {
    let request = signed("s3cret");
    assert!(request.verify("s3cret").is_ok());
    assert_eq!(request.mac.len(), 64);
}

#[test]
fn wrong_secret_is_signature_mismatch() {
    let request = signed("s3cret");
    let err = request.verify("other").unwrap_err();
    assert!(matches!(err, Error::SignatureMismatch { .. }));
    assert!(err.to_string().contains("app.key"));
}

#[test]
fn tampered_capability_fails_verification() {
    let mut request = signed("s3cret");
    request.capability.push("orders".into());
    assert!(request.verify("s3cret").is_err());
}

#[test]
fn mac_is_hmac_sha256_of_canonical() {
    let request = signed("s3cret");
    let mut mac = HmacSha256::new_from_slice(b"s3cret").unwrap();
    mac.update(request.canonical().as_bytes());
    assert_eq!(request.mac, hex::encode(mac.finalize().into_bytes()));
}

#[parameterized(
    not_hex = { "zz".repeat(32) },
    truncated = { "ab".to_string() },
    empty = { String::new() },
)]
fn malformed_mac_is_signature_mismatch(mac: String) {
    let mut request = signed("s3cret");
    request.mac = mac;
    assert!(matches!(
        request.verify("s3cret"),
        Err(Error::SignatureMismatch { .. })
    ));
}

#[test]
fn capability_order_does_not_change_mac() {
    let params_a = TokenParams {
        client_id: None,
        capability: vec!["a".into(), "b".into()],
    };
    let params_b = TokenParams {
        client_id: None,
        capability: vec!["b".into(), "a".into()],
    };
    let a = TokenRequest::sign("k", "s", &params_a, 1, 2, "n");
    let b = TokenRequest::sign("k", "s", &params_b, 1, 2, "n");
    assert_eq!(a.mac, b.mac);
}

#[parameterized(
    before_expiry = { 60_999, false },
    at_expiry = { 61_000, true },
    after_expiry = { 90_000, true },
)]
fn request_expiry(now_ms: i64, expired: bool) {
    assert_eq!(signed("s").is_expired(now_ms), expired);
}

#[parameterized(
    exact = { vec!["inventory".to_string()], "inventory", true },
    other = { vec!["orders".to_string()], "inventory", false },
    wildcard = { vec!["*".to_string()], "inventory", true },
    empty = { vec![], "inventory", false },
)]
fn capability_allows(capability: Vec<String>, channel: &str, expected: bool) {
    let mut request = signed("s");
    request.capability = capability;
    assert_eq!(request.allows(channel), expected);
}

#[test]
fn blank_request_is_dropped_from_credential() {
    let mut request = signed("s");
    request.mac.clear();
    let credential = Credential::from_request(request);
    assert!(credential.into_token_request().is_none());
}

#[test]
fn credential_copies_expiry() {
    let credential = Credential::from_request(signed("s"));
    assert_eq!(credential.expires_at_ms, 61_000);
    assert!(credential.is_fresh(1_000, 10_000));
    assert!(!credential.is_fresh(55_000, 10_000));
}

#[test]
fn empty_credential_is_not_fresh() {
    let credential = Credential {
        token_request: None,
        expires_at_ms: i64::MAX,
        capability: vec![],
    };
    assert!(!credential.is_fresh(0, 0));
}
