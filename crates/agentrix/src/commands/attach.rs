//! `attach`: connect the local terminal to a worktree's session.
//!
//! The host terminal runs in raw mode. Keys are read on a blocking thread
//! and handed to the async loop, which owns the session manager and is the
//! only place the attachment is touched.

use std::io::{self, Write};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use crossterm::event::{self, DisableBracketedPaste, EnableBracketedPaste, Event};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::ExecutableCommand;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use agentrix_core::{ClientConfig, Dimensions, Preferences, SessionSummary, Tool, WorktreeKey};
use agentrix_session::{
    AttachState, InputForwarder, RenderAdapter, ResizeCoalescer, SessionManager, SessionPoller,
    Step, TextInputHandler,
};

use crate::cli::AttachArgs;
use crate::host::HostTerminal;
use crate::keys::{self, KeyAction};

/// How often the reader thread checks whether the loop has gone away.
const EVENT_POLL: Duration = Duration::from_millis(100);

/// Attach and run until the user detaches.
pub async fn run(args: AttachArgs, config: ClientConfig) -> anyhow::Result<()> {
    let config = super::with_mode(config, args.mode);
    let key = args.worktree.key();
    let tool = remember_tool(args.tool);

    let (directory, transport) = super::connect(&config)?;
    let (poller, snapshots) =
        SessionPoller::spawn(directory.clone(), config.activity.poll_interval());
    let mut resize = ResizeCoalescer::new(&config.render);
    let theme = config.terminal.theme;
    let fallback = config.terminal.dimensions();

    let mut manager = SessionManager::new(directory, transport, config);
    if let Err(e) = manager.refresh().await {
        warn!("Initial session list failed: {}", e);
    }

    let attachment = manager
        .attach(key.clone(), tool)
        .await
        .with_context(|| format!("attaching to {key}"))?;
    let forwarder = attachment.input_forwarder();

    let modes = TerminalModes::enable().context("preparing the terminal")?;
    manager
        .get_mut(&key)?
        .set_output_handler(Box::new(RenderAdapter::new(HostTerminal::stdout(), theme)));

    let size = crossterm::terminal::size()
        .map(|(cols, rows)| Dimensions::new(rows, cols))
        .unwrap_or(fallback);
    resize.request(size, Instant::now());

    let (events_tx, events) = mpsc::unbounded_channel();
    spawn_event_reader(events_tx);

    let result = event_loop(&mut manager, &key, forwarder, resize, events, snapshots).await;

    drop(modes);
    poller.stop();
    if let Err(e) = manager.detach(&key, args.close_on_exit).await {
        warn!("Detach failed: {}", e);
    }
    println!();
    info!(%key, "Detached");
    result
}

/// Resolve the tool and remember it for the next launch.
fn remember_tool(requested: Option<Tool>) -> Tool {
    let Some(path) = Preferences::default_path() else {
        return super::launch_tool(requested, &Preferences::default());
    };
    let mut prefs = Preferences::load(&path).unwrap_or_else(|e| {
        warn!("Ignoring unreadable preferences: {}", e);
        Preferences::default()
    });
    let tool = super::launch_tool(requested, &prefs);
    if prefs.last_launch_tool != Some(tool) {
        prefs.last_launch_tool = Some(tool);
        if let Err(e) = prefs.save(&path) {
            warn!("Could not save preferences: {}", e);
        }
    }
    tool
}

enum Action {
    Step(Step),
    Terminal(Event),
    InputClosed,
    Sessions(Vec<SessionSummary>),
    ResizeDue,
}

async fn event_loop(
    manager: &mut SessionManager,
    key: &WorktreeKey,
    mut forwarder: InputForwarder,
    mut resize: ResizeCoalescer,
    mut events: mpsc::UnboundedReceiver<Event>,
    mut snapshots: mpsc::Receiver<Vec<SessionSummary>>,
) -> anyhow::Result<()> {
    let mut shown = manager.get(key)?.state().clone();

    loop {
        let action = {
            let attachment = manager.get_mut(key)?;
            let resize_at = resize.next_deadline();
            tokio::select! {
                step = attachment.step() => Action::Step(step),
                event = events.recv() => match event {
                    Some(event) => Action::Terminal(event),
                    None => Action::InputClosed,
                },
                Some(sessions) = snapshots.recv() => Action::Sessions(sessions),
                _ = sleep_until(resize_at) => Action::ResizeDue,
            }
        };

        match action {
            Action::Step(Step::Idle) | Action::InputClosed => break,
            Action::Step(_) => {}
            Action::Terminal(Event::Key(key_event)) => match keys::translate(&key_event) {
                Some(KeyAction::Detach) => break,
                Some(KeyAction::Text(text))
                    if text.eq_ignore_ascii_case("r") && shown.is_terminal() =>
                {
                    if let Err(e) = manager.get_mut(key)?.reconnect().await {
                        warn!("Reconnect failed: {}", e);
                    }
                    resize.resend(Instant::now());
                }
                Some(KeyAction::Text(text)) => forwarder.on_insert_text(&text),
                Some(KeyAction::DeleteBackward) => forwarder.on_delete_backward(),
                Some(KeyAction::Bytes(bytes)) => {
                    forwarder.send_bytes(&bytes);
                }
                None => {}
            },
            Action::Terminal(Event::Paste(text)) => {
                forwarder.on_paste(&text);
            }
            Action::Terminal(Event::Resize(cols, rows)) => {
                resize.request(Dimensions::new(rows, cols), Instant::now());
            }
            Action::Terminal(other) => debug!(event = ?other, "Ignoring terminal event"),
            Action::Sessions(sessions) => {
                manager.sync_sessions(&sessions);
                // The attached worktree is on screen, so its idle state is seen.
                manager.select(key);
            }
            Action::ResizeDue => {
                if let Some(dims) = resize.poll_due(Instant::now()) {
                    debug!(rows = dims.rows, cols = dims.cols, "Sending resize");
                    forwarder.send_resize(dims);
                }
            }
        }

        let state = manager.get(key)?.state();
        if *state != shown {
            shown = state.clone();
            if let Some(text) = banner(&shown) {
                show_banner(&text);
            }
        }
    }
    Ok(())
}

/// Status line for states that need the user's attention.
pub fn banner(state: &AttachState) -> Option<String> {
    match state {
        AttachState::Closed => {
            Some("Session ended. Press r to reconnect or Ctrl-] to detach.".to_string())
        }
        AttachState::Errored(message) => Some(format!(
            "{message}. Press r to reconnect or Ctrl-] to detach."
        )),
        _ => None,
    }
}

fn show_banner(text: &str) {
    let mut out = io::stdout();
    let line = format!("\r\n\x1b[7m[agentrix] {text}\x1b[0m\r\n");
    if let Err(e) = out.write_all(line.as_bytes()).and_then(|_| out.flush()) {
        debug!("Banner write failed: {}", e);
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}

/// Blocking reader for host terminal events. Exits once the receiver is
/// dropped.
fn spawn_event_reader(tx: mpsc::UnboundedSender<Event>) {
    thread::spawn(move || {
        while !tx.is_closed() {
            match event::poll(EVENT_POLL) {
                Ok(true) => match event::read() {
                    Ok(event) => {
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Reading terminal event failed: {}", e);
                        break;
                    }
                },
                Ok(false) => {}
                Err(e) => {
                    warn!("Polling terminal events failed: {}", e);
                    break;
                }
            }
        }
        debug!("Terminal event reader stopped");
    });
}

/// Raw mode and bracketed paste, undone on drop.
struct TerminalModes {
    bracketed_paste: bool,
}

impl TerminalModes {
    fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        let bracketed_paste = match io::stdout().execute(EnableBracketedPaste) {
            Ok(_) => true,
            Err(e) => {
                warn!("Failed to enable bracketed paste: {}", e);
                false
            }
        };
        debug!("Terminal in raw mode");
        Ok(Self { bracketed_paste })
    }
}

impl Drop for TerminalModes {
    fn drop(&mut self) {
        if self.bracketed_paste {
            let _ = io::stdout().execute(DisableBracketedPaste);
        }
        if let Err(e) = disable_raw_mode() {
            warn!("Failed to leave raw mode: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banner_only_for_terminal_states() {
        assert_eq!(banner(&AttachState::Connecting), None);
        assert_eq!(banner(&AttachState::Detached), None);
        assert!(banner(&AttachState::Closed)
            .unwrap()
            .starts_with("Session ended."));
        assert_eq!(
            banner(&AttachState::Errored("Connection refused by the server".to_string())).unwrap(),
            "Connection refused by the server. Press r to reconnect or Ctrl-] to detach."
        );
    }

    #[tokio::test]
    async fn test_sleep_until_past_deadline_returns() {
        sleep_until(Some(Instant::now())).await;
    }
}
