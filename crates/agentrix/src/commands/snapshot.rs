//! `snapshot`: attach off-screen, collect output for a while, print the
//! rendered screen.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Context};
use tokio::time::Instant;
use tracing::{debug, warn};

use agentrix_core::{ClientConfig, Preferences};
use agentrix_emulator::Parser;
use agentrix_session::{lock_widget, AttachState, RenderAdapter, SessionManager, Step};

use crate::cli::SnapshotArgs;

/// Print a session's screen.
pub async fn run(args: SnapshotArgs, config: ClientConfig) -> anyhow::Result<()> {
    let config = super::with_mode(config, args.mode);
    let prefs = Preferences::default_path()
        .and_then(|path| Preferences::load(&path).ok())
        .unwrap_or_default();
    let tool = super::launch_tool(args.tool, &prefs);
    let key = args.worktree.key();

    let shared = Arc::new(Mutex::new(Parser::new(
        config.terminal.dimensions(),
        config.terminal.scrollback_lines,
    )));
    let theme = config.terminal.theme;

    let (directory, transport) = super::connect(&config)?;
    let mut manager = SessionManager::new(directory, transport, config);
    let attachment = manager
        .attach(key.clone(), tool)
        .await
        .with_context(|| format!("attaching to {key}"))?;
    attachment.set_output_handler(Box::new(RenderAdapter::new(Arc::clone(&shared), theme)));

    let deadline = Instant::now() + Duration::from_millis(args.wait_ms);
    while !attachment.state().is_terminal() {
        match tokio::time::timeout_at(deadline, attachment.step()).await {
            Ok(Step::Idle) | Err(_) => break,
            Ok(step) => debug!(?step, "Snapshot step"),
        }
    }
    attachment.drain();

    let state = attachment.state().clone();
    if let Err(e) = attachment.disconnect(false).await {
        warn!("Disconnect failed: {}", e);
    }
    if let AttachState::Errored(message) = state {
        bail!("{key}: {message}");
    }

    let parser = lock_widget(&shared);
    let text = if args.scrollback {
        parser.grid().transcript_text()
    } else {
        parser.grid().to_plain_text()
    };
    println!("{}", text.trim_end_matches('\n'));
    Ok(())
}
