//! Subcommand implementations.

pub mod attach;
pub mod prefs;
pub mod sessions;
pub mod snapshot;

use std::sync::Arc;

use anyhow::Context;

use agentrix_core::{ClientConfig, Preferences, ReconcileMode, Tool};
use agentrix_session::{HttpSessionDirectory, SessionDirectory, Transport, WebSocketTransport};

use crate::cli::{Cli, Command};

/// Run the parsed command line.
pub async fn run(cli: Cli, config: ClientConfig) -> anyhow::Result<()> {
    match cli.command {
        Command::Attach(args) => attach::run(args, config).await,
        Command::Snapshot(args) => snapshot::run(args, config).await,
        Command::Sessions(args) => sessions::run(args, config).await,
        Command::Collapse { org } => prefs::run(&org, true),
        Command::Expand { org } => prefs::run(&org, false),
    }
}

/// Directory and transport for the configured server.
pub(crate) fn connect(
    config: &ClientConfig,
) -> anyhow::Result<(Arc<dyn SessionDirectory>, Arc<dyn Transport>)> {
    let directory: Arc<dyn SessionDirectory> = Arc::new(
        HttpSessionDirectory::new(&config.server).context("creating REST client")?,
    );
    let transport: Arc<dyn Transport> = Arc::new(
        WebSocketTransport::new(&config.server).context("creating socket transport")?,
    );
    Ok((directory, transport))
}

/// Apply a `--mode` override.
pub(crate) fn with_mode(mut config: ClientConfig, mode: Option<ReconcileMode>) -> ClientConfig {
    if let Some(mode) = mode {
        config.reconciler.mode = mode;
    }
    config
}

/// Tool to launch: the requested one, else the last one used.
pub(crate) fn launch_tool(requested: Option<Tool>, prefs: &Preferences) -> Tool {
    requested
        .or(prefs.last_launch_tool)
        .unwrap_or_default()
}
