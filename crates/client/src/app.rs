// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The `pulse-watch` application: wires config, signer, WebSocket transport
//! and runtime together and feeds host commands from stdin.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::access::RealtimeAccess;
use crate::channel::CacheInvalidator;
use crate::cli::{Cli, HostCommand};
use crate::config::Config;
use crate::error::Result;
use crate::lifecycle::HostLifecycle;
use crate::logging;
use crate::runtime::RealtimeRuntime;
use crate::websocket::WebSocketFactory;
use crate::BoxFuture;

/// Cache invalidator that only reports refetch requests.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingInvalidator;

impl CacheInvalidator for LoggingInvalidator {
    fn refetch_active(&self, query_key: &str) -> BoxFuture<'static, ()> {
        info!(query_key, "refetching active queries");
        Box::pin(async {})
    }
}

/// Routes host commands to the lifecycle and the session signal.
pub struct HostBridge {
    host: HostLifecycle,
    signed_in: watch::Sender<bool>,
    access: RealtimeAccess,
}

impl HostBridge {
    pub fn new(host: HostLifecycle, signed_in: watch::Sender<bool>, access: RealtimeAccess) -> Self {
        HostBridge {
            host,
            signed_in,
            access,
        }
    }

    /// Apply one command. Returns false when the app should stop.
    pub fn apply(&self, command: HostCommand) -> bool {
        match command {
            HostCommand::Phase(phase) => {
                self.host.notify(phase);
            }
            HostCommand::SignIn => {
                self.signed_in.send_replace(true);
            }
            HostCommand::SignOut => {
                self.signed_in.send_replace(false);
            }
            HostCommand::Status => {
                let status = self.access.status();
                println!(
                    "{} (connected: {}, signed in: {})",
                    status.state,
                    status.is_connected(),
                    *self.signed_in.borrow()
                );
            }
            HostCommand::Quit => return false,
        }
        true
    }

    /// Parse and apply one stdin line. Blank lines are ignored.
    pub fn apply_line(&self, line: &str) -> bool {
        if line.trim().is_empty() {
            return true;
        }
        match line.parse::<HostCommand>() {
            Ok(command) => self.apply(command),
            Err(e) => {
                warn!("{}", e);
                true
            }
        }
    }
}

/// Run `pulse-watch` until `quit` or Ctrl-C.
pub async fn run(cli: Cli) -> Result<()> {
    logging::init(cli.verbose, cli.log_file.as_deref());

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default()?,
    };
    info!(url = %config.realtime.url, channel = %config.realtime.channel, "starting pulse-watch");

    let host = HostLifecycle::new();
    let runtime = RealtimeRuntime::new(
        WebSocketFactory::new(config.websocket_options()),
        Arc::new(config.key_signer()),
        Arc::new(LoggingInvalidator),
        &host,
        config.runtime_config(),
    );
    let access = runtime.access();
    let (signed_in_tx, signed_in_rx) = watch::channel(!cli.signed_out);
    let cancel = CancellationToken::new();

    let runtime_task = tokio::spawn(runtime.run(signed_in_rx, cancel.clone()));
    let status_task = tokio::spawn(log_status(access.clone()));
    let bridge = HostBridge::new(host, signed_in_tx, access);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) => {
                    if !bridge.apply_line(&line) {
                        break;
                    }
                }
                None => {
                    debug!("stdin closed; waiting for Ctrl-C");
                    stdin_open = false;
                }
            },
        }
    }

    cancel.cancel();
    if let Err(e) = runtime_task.await {
        warn!("realtime runtime task failed: {}", e);
    }
    status_task.abort();
    Ok(())
}

async fn log_status(mut access: RealtimeAccess) {
    while let Ok(status) = access.changed().await {
        info!(
            state = %status.state,
            connected = status.is_connected(),
            "realtime state changed"
        );
    }
}

#[cfg(test)]
#[path = "app_tests.rs"]
mod tests;
