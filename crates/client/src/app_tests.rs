// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::access::RealtimeStatus;
use pulse_core::AppPhase;

struct Fixture {
    bridge: HostBridge,
    host: HostLifecycle,
    signed_in: watch::Receiver<bool>,
    _status: watch::Sender<RealtimeStatus>,
}

fn fixture() -> Fixture {
    let host = HostLifecycle::new();
    let (signed_in_tx, signed_in) = watch::channel(false);
    let (status, status_rx) = watch::channel(RealtimeStatus::initial());
    let bridge = HostBridge::new(host.clone(), signed_in_tx, RealtimeAccess::new(status_rx));
    Fixture {
        bridge,
        host,
        signed_in,
        _status: status,
    }
}

#[test]
fn sign_in_and_out_drive_the_session_signal() {
    let fx = fixture();

    assert!(fx.bridge.apply_line("signin"));
    assert!(*fx.signed_in.borrow());

    assert!(fx.bridge.apply_line("signout"));
    assert!(!*fx.signed_in.borrow());
}

#[tokio::test]
async fn phase_commands_reach_host_listeners() {
    let fx = fixture();
    let mut listener = fx.host.listen();

    fx.bridge.apply_line("background");
    fx.bridge.apply_line("active");

    assert_eq!(listener.next().await, Some(AppPhase::Background));
    assert_eq!(listener.next().await, Some(AppPhase::Active));
}

#[test]
fn quit_stops_and_other_lines_continue() {
    let fx = fixture();

    assert!(fx.bridge.apply_line(""));
    assert!(fx.bridge.apply_line("nonsense"));
    assert!(fx.bridge.apply_line("status"));
    assert!(!fx.bridge.apply_line("quit"));
}

#[test]
fn logging_invalidator_returns_a_ready_future() {
    let future = LoggingInvalidator.refetch_active("inventory");
    drop(future);
}
