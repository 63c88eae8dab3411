//! Attachment controller: one reconciler, one channel at a time.
//!
//! The attachment is the only owner of its [`Reconciler`]. Receive loops
//! post tagged events to it and user input queues frames to it; both are
//! applied on the owner's task by [`Attachment::step`].

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use agentrix_core::{ClientConfig, InputSettings, Result, SessionId, Tool, WorktreeKey};

use crate::directory::SessionDirectory;
use crate::input::{InputForwarder, InputSender};
use crate::protocol::ClientFrame;
use crate::reconciler::{AttachState, OutputSink, Reconciler};
use crate::transport::{ChannelHandle, EventSender, TaggedEvent, Transport};

/// What a single [`Attachment::step`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A channel event was received; `applied` is false when it was stale
    Event {
        /// Whether the reconciler accepted the event
        applied: bool,
    },
    /// An input frame was dequeued; `sent` is false without a live channel
    Input {
        /// Whether the frame reached a channel
        sent: bool,
    },
    /// Both queues are closed
    Idle,
}

/// A worktree's attachment to its server session.
pub struct Attachment {
    key: WorktreeKey,
    tool: Tool,
    directory: Arc<dyn SessionDirectory>,
    transport: Arc<dyn Transport>,
    reconciler: Reconciler,
    channel: Option<ChannelHandle>,
    events_tx: EventSender,
    events_rx: mpsc::UnboundedReceiver<TaggedEvent>,
    input_tx: InputSender,
    input_rx: mpsc::UnboundedReceiver<ClientFrame>,
    input_settings: InputSettings,
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("key", &self.key)
            .field("tool", &self.tool)
            .field("reconciler", &self.reconciler)
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

impl Attachment {
    /// Create a detached attachment.
    pub fn new(
        key: WorktreeKey,
        tool: Tool,
        directory: Arc<dyn SessionDirectory>,
        transport: Arc<dyn Transport>,
        config: &ClientConfig,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        Self {
            key,
            tool,
            directory,
            transport,
            reconciler: Reconciler::new(&config.reconciler),
            channel: None,
            events_tx,
            events_rx,
            input_tx,
            input_rx,
            input_settings: config.input.clone(),
        }
    }

    /// Open the worktree's session through the directory and attach to it.
    ///
    /// Failures are also recorded on the reconciler, so the UI shows them.
    pub async fn open(&mut self) -> Result<()> {
        let opened = match self.directory.open_session(&self.key, self.tool).await {
            Ok(opened) => opened,
            Err(e) => {
                self.close_channel();
                self.reconciler.fail(e.user_message());
                return Err(e);
            }
        };
        self.attach_session(opened.session_id, opened.log.as_bytes())
            .await
    }

    /// Attach to a known session id, seeding the transcript with
    /// `initial_log`, and open a fresh channel for it.
    pub async fn attach_session(&mut self, session_id: SessionId, initial_log: &[u8]) -> Result<()> {
        self.close_channel();
        let generation = self
            .reconciler
            .attach_session(session_id.clone(), initial_log);

        match self
            .transport
            .open(&session_id, generation, self.events_tx.clone())
            .await
        {
            Ok(channel) => {
                self.channel = Some(channel);
                Ok(())
            }
            Err(e) => {
                // A newer attach may have started while connecting.
                if self.reconciler.generation() == generation {
                    self.reconciler.fail(e.user_message());
                }
                Err(e)
            }
        }
    }

    /// Open the worktree again as a fresh attach cycle.
    ///
    /// The directory returns the current log, which seeds the new cycle, or
    /// starts a new session when the previous one has exited.
    pub async fn reconnect(&mut self) -> Result<()> {
        match self.reconciler.session_id() {
            Some(session_id) => info!(key = %self.key, %session_id, "Reconnecting"),
            None => info!(key = %self.key, "Reconnecting without a previous session"),
        }
        self.open().await
    }

    /// Stop the receive loop and go back to `Detached`. With
    /// `close_remote`, also terminate the server-side session.
    pub async fn disconnect(&mut self, close_remote: bool) -> Result<()> {
        self.close_channel();
        self.reconciler.disconnect();
        if !close_remote {
            return Ok(());
        }
        match self.reconciler.session_id().cloned() {
            Some(session_id) => self.directory.close_session(&session_id).await,
            None => Ok(()),
        }
    }

    /// Wait for the next inbound event or queued input frame and apply it.
    pub async fn step(&mut self) -> Step {
        tokio::select! {
            Some(tagged) = self.events_rx.recv() => {
                let applied = self.reconciler.apply(tagged.generation, tagged.event);
                if applied && self.reconciler.state().is_terminal() {
                    self.close_channel();
                }
                Step::Event { applied }
            }
            Some(frame) = self.input_rx.recv() => {
                let sent = self.forward(frame);
                Step::Input { sent }
            }
            else => Step::Idle,
        }
    }

    /// Apply everything already queued without waiting.
    pub fn drain(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(tagged) = self.events_rx.try_recv() {
            if self.reconciler.apply(tagged.generation, tagged.event) {
                applied += 1;
            }
        }
        if self.reconciler.state().is_terminal() {
            self.close_channel();
        }
        while let Ok(frame) = self.input_rx.try_recv() {
            self.forward(frame);
        }
        applied
    }

    /// Forwarder for widgets and key readers. Stays valid across reconnects.
    pub fn input_forwarder(&self) -> InputForwarder {
        InputForwarder::new(self.input_tx.clone(), &self.input_settings)
    }

    /// Install the renderer.
    pub fn set_output_handler(&mut self, sink: Box<dyn OutputSink>) {
        self.reconciler.set_output_handler(sink);
    }

    /// Current lifecycle state.
    pub fn state(&self) -> &AttachState {
        self.reconciler.state()
    }

    /// The reconciler.
    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Attached session id.
    pub fn session_id(&self) -> Option<&SessionId> {
        self.reconciler.session_id()
    }

    /// Worktree this attachment belongs to.
    pub fn key(&self) -> &WorktreeKey {
        &self.key
    }

    /// Tool the session was opened with.
    pub fn tool(&self) -> Tool {
        self.tool
    }

    /// Whether a channel is open.
    pub fn has_channel(&self) -> bool {
        self.channel.as_ref().is_some_and(|channel| !channel.is_closed())
    }

    fn forward(&self, frame: ClientFrame) -> bool {
        let live = self.reconciler.state().is_live();
        match &self.channel {
            Some(channel) if live => {
                let sent = channel.send(frame);
                if !sent {
                    debug!("Frame dropped: channel closing");
                }
                sent
            }
            _ => {
                debug!(key = %self.key, "Frame dropped: no live channel");
                false
            }
        }
    }

    fn close_channel(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
    }
}
