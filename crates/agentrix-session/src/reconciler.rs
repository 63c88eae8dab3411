//! Output reconciler: the transcript state machine.
//!
//! One reconciler owns the transcript of one attachment. It decides, for
//! every server event, whether the renderer gets a full replace or an
//! append, and (in gated mode) holds output back until the stream is
//! worth painting.
//!
//! ```text
//! Detached ──attach_session──▶ Connecting ──init/output/ready──▶ Attached(Buffering|Ready)
//!                                                                   │
//!                                          exit ──▶ Closed ◀────────┤
//!                                          error ─▶ Errored ◀───────┘
//! ```
//!
//! Terminal states only leave through another `attach_session`. Every
//! attach bumps a generation counter; events tagged with an older
//! generation are discarded.

use tracing::{debug, info, warn};

use agentrix_core::{Error, ReconcileMode, ReconcilerSettings, SessionId};

use crate::filter::GlyphFilter;
use crate::protocol::ServerEvent;
use crate::transport::ChannelEvent;

/// Renderer-facing sink. Implemented once per widget binding.
pub trait OutputSink: Send {
    /// Discard everything shown and paint `bytes` from a clean state.
    fn replace(&mut self, bytes: &[u8]);
    /// Paint `bytes` after what is already shown.
    fn append(&mut self, bytes: &[u8]);
}

/// Sub-state of an attached stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Output is held in the pending buffer
    Buffering,
    /// Output is forwarded as it arrives
    Ready,
}

/// Attachment lifecycle as seen by the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachState {
    /// No session attached
    Detached,
    /// Attached locally, waiting for the stream
    Connecting,
    /// Stream is live
    Attached(Readiness),
    /// The session ended
    Closed,
    /// The stream failed; the message is for the error banner
    Errored(String),
}

impl AttachState {
    /// Whether events from the channel are still applied.
    pub fn is_live(&self) -> bool {
        matches!(self, AttachState::Connecting | AttachState::Attached(_))
    }

    /// Closed or errored.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AttachState::Closed | AttachState::Errored(_))
    }
}

/// Transcript owner for one attachment.
pub struct Reconciler {
    mode: ReconcileMode,
    state: AttachState,
    generation: u64,
    session_id: Option<SessionId>,
    transcript: Vec<u8>,
    pending: Vec<u8>,
    ready: bool,
    filter: GlyphFilter,
    sink: Option<Box<dyn OutputSink>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("session_id", &self.session_id)
            .field("transcript_len", &self.transcript.len())
            .field("pending_len", &self.pending.len())
            .field("ready", &self.ready)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

impl Reconciler {
    /// Create a detached reconciler.
    pub fn new(settings: &ReconcilerSettings) -> Self {
        Self {
            mode: settings.mode,
            state: AttachState::Detached,
            generation: 0,
            session_id: None,
            transcript: Vec::new(),
            pending: Vec::new(),
            ready: false,
            filter: GlyphFilter::new(settings),
            sink: None,
        }
    }

    /// Create with default thresholds for `mode`.
    pub fn with_mode(mode: ReconcileMode) -> Self {
        Self::new(&ReconcilerSettings {
            mode,
            ..ReconcilerSettings::default()
        })
    }

    /// Reconciliation mode.
    pub fn mode(&self) -> ReconcileMode {
        self.mode
    }

    /// Current state.
    pub fn state(&self) -> &AttachState {
        &self.state
    }

    /// Current attach generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Attached session, if any.
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    /// Authoritative transcript of the current attach cycle.
    pub fn transcript(&self) -> &[u8] {
        &self.transcript
    }

    /// Bytes held back until readiness (gated mode).
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Whether the renderer has received a full paint this cycle.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Whether the glyph filter has flipped this cycle.
    pub fn has_visible_glyph(&self) -> bool {
        self.filter.has_visible_glyph()
    }

    /// Install (or swap) the renderer.
    ///
    /// Once readiness has been reached, the new sink immediately receives
    /// one replace paint of the whole transcript.
    pub fn set_output_handler(&mut self, mut sink: Box<dyn OutputSink>) {
        if self.ready && !self.transcript.is_empty() {
            sink.replace(&self.transcript);
        }
        self.sink = Some(sink);
    }

    /// Start a fresh attach cycle and return its generation.
    ///
    /// Stream state is always reset, even when re-attaching the same id.
    pub fn attach_session(&mut self, session_id: SessionId, initial_log: &[u8]) -> u64 {
        self.generation += 1;
        self.transcript.clear();
        self.pending.clear();
        self.ready = false;
        self.filter.reset();
        self.state = AttachState::Connecting;
        info!(
            session_id = %session_id,
            generation = self.generation,
            mode = ?self.mode,
            "Attaching session"
        );
        self.session_id = Some(session_id);

        self.transcript.extend_from_slice(initial_log);
        match self.mode {
            ReconcileMode::Direct => {
                self.paint_replace_transcript();
                self.ready = true;
            }
            ReconcileMode::Gated => self.pending.extend_from_slice(initial_log),
        }
        self.generation
    }

    /// Apply a channel event produced by attach cycle `generation`.
    ///
    /// Returns false when the event was discarded (stale generation or a
    /// state that no longer accepts events).
    pub fn apply(&mut self, generation: u64, event: ChannelEvent) -> bool {
        if generation != self.generation {
            debug!(
                stale = generation,
                current = self.generation,
                "Discarding event from superseded attach"
            );
            return false;
        }
        if !self.state.is_live() {
            debug!(state = ?self.state, "Ignoring event outside a live attach");
            return false;
        }

        match event {
            ChannelEvent::Frame(event) => self.handle_frame(event),
            ChannelEvent::Failed(err) => {
                warn!("Session stream failed: {}", err);
                self.state = AttachState::Errored(err.user_message());
            }
            ChannelEvent::Closed => {
                self.flush_pending_on_close();
                self.state = AttachState::Closed;
            }
        }
        true
    }

    /// Mark the current cycle as failed outside the stream (open call or
    /// handshake failure).
    pub fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("Attach failed: {}", message);
        self.state = AttachState::Errored(message);
    }

    /// Go back to `Detached`. The transcript stays until the next attach.
    pub fn disconnect(&mut self) {
        if self.state != AttachState::Detached {
            info!(generation = self.generation, "Detaching session");
        }
        self.state = AttachState::Detached;
    }

    fn handle_frame(&mut self, event: ServerEvent) {
        debug!(kind = event.kind(), "Applying server event");
        match event {
            ServerEvent::Init { log, closed } => self.on_init(log, closed),
            ServerEvent::Ready => {
                if !self.ready {
                    self.flush_pending();
                }
                self.state = AttachState::Attached(Readiness::Ready);
            }
            ServerEvent::Output(delta) => self.on_output(&delta),
            ServerEvent::Exit => {
                self.flush_pending_on_close();
                self.state = AttachState::Closed;
            }
            ServerEvent::Error { message } => {
                let err = Error::Session(message);
                warn!("Server reported {}", err);
                self.state = AttachState::Errored(err.user_message());
            }
        }
    }

    fn on_init(&mut self, log: Option<String>, closed: bool) {
        if let Some(log) = log {
            let log = log.into_bytes();
            self.transcript.clone_from(&log);
            match self.mode {
                ReconcileMode::Direct => {
                    self.paint_replace_transcript();
                    self.ready = true;
                }
                ReconcileMode::Gated if self.ready => self.paint_replace_transcript(),
                ReconcileMode::Gated => {
                    self.pending = log;
                    if self.filter.observe(&self.pending) {
                        self.flush_pending();
                    }
                }
            }
        }

        if closed {
            self.flush_pending_on_close();
            self.state = AttachState::Closed;
        } else {
            self.state = AttachState::Attached(self.readiness());
        }
    }

    fn on_output(&mut self, delta: &[u8]) {
        if self.mode == ReconcileMode::Gated && !self.ready {
            if !self.filter.observe(delta) {
                debug!(len = delta.len(), "Dropping leading control output");
                self.state = AttachState::Attached(Readiness::Buffering);
                return;
            }
            self.transcript.extend_from_slice(delta);
            self.pending.extend_from_slice(delta);
            self.flush_pending();
        } else {
            self.transcript.extend_from_slice(delta);
            if self.ready {
                if let Some(sink) = self.sink.as_mut() {
                    sink.append(delta);
                }
            } else {
                self.pending.extend_from_slice(delta);
            }
        }
        self.state = AttachState::Attached(self.readiness());
    }

    fn readiness(&self) -> Readiness {
        if self.ready {
            Readiness::Ready
        } else {
            Readiness::Buffering
        }
    }

    /// One replace paint carrying the whole pending buffer.
    fn flush_pending(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        if let Some(sink) = self.sink.as_mut() {
            sink.replace(&pending);
        }
        self.ready = true;
        debug!(len = pending.len(), "Flushed pending output");
    }

    fn flush_pending_on_close(&mut self) {
        if !self.ready && !self.pending.is_empty() {
            self.flush_pending();
        }
    }

    fn paint_replace_transcript(&mut self) {
        if let Some(sink) = self.sink.as_mut() {
            sink.replace(&self.transcript);
        }
    }
}
