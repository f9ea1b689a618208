// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Log subscriber setup for the binaries.

use std::fs;
use std::path::Path;

use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is not set.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "pulse=debug,info"
    } else {
        "info"
    }
}

/// `RUST_LOG` if set, otherwise [`default_directive`].
pub fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)))
}

/// Open `path` for appending, creating it if needed.
pub(crate) fn open_log_file(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new().create(true).append(true).open(path)
}

/// Install the global subscriber, writing to `log_path` if given and
/// openable, otherwise to stderr.
///
/// Does nothing if a subscriber is already installed. Returns the error if
/// the log file could not be opened; it is also logged as a warning.
pub fn init(verbose: bool, log_path: Option<&Path>) -> Option<std::io::Error> {
    let filter = env_filter(verbose);

    let (file, open_error) = match log_path.map(open_log_file) {
        Some(Ok(file)) => (Some(file), None),
        Some(Err(e)) => (None, Some(e)),
        None => (None, None),
    };

    let _ = match file {
        Some(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(file)
            .with_ansi(false)
            .try_init(),
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
    };

    if let (Some(path), Some(e)) = (log_path, &open_error) {
        warn!("cannot open log file {}: {}; logging to stderr", path.display(), e);
    }
    open_error
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
