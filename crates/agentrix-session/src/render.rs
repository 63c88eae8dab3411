//! Render adapter: binds reconciler paints to a terminal widget.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use agentrix_core::{Result, Theme};
use agentrix_emulator::{Parser, TerminalEvent};

use crate::reconciler::OutputSink;

/// Side-channel request raised by a widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEvent {
    /// Ring the bell
    Bell,
    /// Copy text to the clipboard
    Clipboard(String),
    /// Open a link
    OpenLink(String),
}

/// A terminal-emulation widget the adapter can drive.
pub trait TerminalWidget: Send {
    /// Reset cursor, screen and scrollback.
    fn reset(&mut self);
    /// Apply custom colors.
    fn apply_theme(&mut self, theme: &Theme);
    /// Feed terminal bytes.
    fn write(&mut self, bytes: &[u8]);
    /// Drain side-channel requests raised by the last writes.
    fn take_side_events(&mut self) -> Vec<SideEvent> {
        Vec::new()
    }
}

/// Receives side-channel requests. Failures are logged, never surfaced.
pub trait SideChannelHandler: Send {
    /// Handle one request.
    fn handle(&mut self, event: SideEvent) -> Result<()>;
}

/// Handler that only logs.
#[derive(Debug, Default)]
pub struct LogSideChannel;

impl SideChannelHandler for LogSideChannel {
    fn handle(&mut self, event: SideEvent) -> Result<()> {
        debug!(?event, "Side-channel event");
        Ok(())
    }
}

/// [`OutputSink`] over a [`TerminalWidget`].
pub struct RenderAdapter<W> {
    widget: W,
    theme: Theme,
    side_channel: Box<dyn SideChannelHandler>,
}

impl<W: TerminalWidget> RenderAdapter<W> {
    /// Adapter with a logging side channel.
    pub fn new(widget: W, theme: Theme) -> Self {
        Self {
            widget,
            theme,
            side_channel: Box::new(LogSideChannel),
        }
    }

    /// Route side-channel events to `handler`.
    pub fn with_side_channel(mut self, handler: Box<dyn SideChannelHandler>) -> Self {
        self.side_channel = handler;
        self
    }

    /// The widget.
    pub fn widget(&self) -> &W {
        &self.widget
    }

    /// The widget, mutably.
    pub fn widget_mut(&mut self) -> &mut W {
        &mut self.widget
    }

    /// Change the theme and apply it right away.
    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
        self.widget.apply_theme(&self.theme);
    }

    fn write_and_drain(&mut self, bytes: &[u8]) {
        self.widget.write(bytes);
        for event in self.widget.take_side_events() {
            if let Err(e) = self.side_channel.handle(event) {
                warn!("Side-channel handler failed: {}", e);
            }
        }
    }
}

impl<W: TerminalWidget> OutputSink for RenderAdapter<W> {
    fn replace(&mut self, bytes: &[u8]) {
        self.widget.reset();
        // A full reset drops custom colors on some widgets.
        self.widget.apply_theme(&self.theme);
        self.write_and_drain(bytes);
    }

    fn append(&mut self, bytes: &[u8]) {
        self.write_and_drain(bytes);
    }
}

impl TerminalWidget for Parser {
    fn reset(&mut self) {
        Parser::reset(self);
    }

    fn apply_theme(&mut self, theme: &Theme) {
        self.set_theme(*theme);
    }

    fn write(&mut self, bytes: &[u8]) {
        self.process(bytes);
    }

    fn take_side_events(&mut self) -> Vec<SideEvent> {
        self.take_events()
            .into_iter()
            .filter_map(|event| match event {
                TerminalEvent::Bell => Some(SideEvent::Bell),
                TerminalEvent::Clipboard(text) => Some(SideEvent::Clipboard(text)),
                TerminalEvent::OpenLink(uri) => Some(SideEvent::OpenLink(uri)),
                TerminalEvent::Title(_) => None,
            })
            .collect()
    }
}

/// Lock a shared widget, recovering from a poisoned lock.
pub fn lock_widget<W>(widget: &Mutex<W>) -> MutexGuard<'_, W> {
    widget.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Shared widgets, so a caller can keep reading the widget the reconciler
/// paints into.
impl<W: TerminalWidget> TerminalWidget for Arc<Mutex<W>> {
    fn reset(&mut self) {
        lock_widget(self).reset();
    }

    fn apply_theme(&mut self, theme: &Theme) {
        lock_widget(self).apply_theme(theme);
    }

    fn write(&mut self, bytes: &[u8]) {
        lock_widget(self).write(bytes);
    }

    fn take_side_events(&mut self) -> Vec<SideEvent> {
        lock_widget(self).take_side_events()
    }
}
