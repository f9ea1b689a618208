// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;

#[test]
fn verbose_raises_the_crate_level() {
    assert_eq!(default_directive(false), "info");
    assert!(default_directive(true).contains("pulse=debug"));
}

#[test]
fn init_twice_does_not_panic() {
    let temp = tempfile::TempDir::new().unwrap();
    let path = temp.path().join("pulse.log");

    assert!(init(false, Some(&path)).is_none());
    assert!(init(true, None).is_none());

    assert!(path.exists());
}

#[test]
fn unopenable_log_file_is_reported() {
    let temp = tempfile::TempDir::new().unwrap();
    let path = temp.path().join("missing").join("pulse.log");

    assert!(open_log_file(&path).is_err());
    let err = init(false, Some(&path)).unwrap();
    assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    assert!(!path.exists());
}
