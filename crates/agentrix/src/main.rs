//! # agentrix
//!
//! Terminal client for agentrix worktree sessions.
//!
//! ## Overview
//!
//! The client can:
//! - Attach the local terminal to a worktree's server-side session
//! - Print a rendered snapshot of a session's screen
//! - List sessions with their idle state
//! - Persist per-organisation collapse preferences
//!
//! ## Architecture
//!
//! This is Layer 3 - the binary that ties together:
//! - agentrix-core: Core types, config and preferences
//! - agentrix-emulator: Off-screen terminal emulation
//! - agentrix-session: Transport, reconciliation and session management

use anyhow::Context;
use clap::Parser;

use agentrix::cli::Cli;
use agentrix_core::ClientConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ClientConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let _guard = agentrix::logging::init(&config.logging, cli.verbose)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        server = %config.server.base_url,
        "agentrix starting"
    );

    let result = agentrix::commands::run(cli, config).await;
    if let Err(e) = &result {
        tracing::error!("{:#}", e);
    }
    result
}
