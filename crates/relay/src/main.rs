// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! pulse-relay: WebSocket relay that verifies signed token requests and fans
//! channel events out to attached connections.

mod server;
mod state;

use clap::Parser;
use std::net::SocketAddr;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// pulse-relay: Realtime channel relay
#[derive(Parser, Debug)]
#[command(name = "pulse-relay")]
#[command(about = "WebSocket relay for pulse realtime channels")]
struct Args {
    /// Address to bind the server to
    #[arg(short, long, default_value = "127.0.0.1:7891")]
    bind: SocketAddr,

    /// Name of the signing key clients present
    #[arg(long, env = "PULSE_KEY_NAME")]
    key_name: String,

    /// Secret for the signing key
    #[arg(long, env = "PULSE_KEY_SECRET", hide_env_values = true)]
    key_secret: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting pulse-relay");
    info!("  Bind address: {}", args.bind);
    info!("  Key: {}", args.key_name);

    let state = state::RelayState::new([(args.key_name, args.key_secret)]);
    server::run(args.bind, state).await?;

    Ok(())
}
