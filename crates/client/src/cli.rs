// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Command-line arguments and stdin commands for `pulse-watch`.

use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use pulse_core::AppPhase;

use crate::error::Error;

/// pulse-watch: keep a realtime subscription alive and log what arrives
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "pulse-watch", version)]
#[command(about = "Watch a realtime channel and refetch on change")]
pub struct Cli {
    /// Path to the config file (defaults to <config dir>/pulse/pulse.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Append logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Start signed out and wait for a `signin` command
    #[arg(long)]
    pub signed_out: bool,
}

/// A line read from stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    /// The host moved to this lifecycle phase.
    Phase(AppPhase),
    SignIn,
    SignOut,
    /// Print the current connection state.
    Status,
    Quit,
}

impl FromStr for HostCommand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let command = s.trim().to_ascii_lowercase();
        match command.as_str() {
            "signin" | "sign-in" => Ok(HostCommand::SignIn),
            "signout" | "sign-out" => Ok(HostCommand::SignOut),
            "status" => Ok(HostCommand::Status),
            "quit" | "exit" => Ok(HostCommand::Quit),
            other => AppPhase::from_str(other)
                .map(HostCommand::Phase)
                .map_err(|_| Error::InvalidCommand(other.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
