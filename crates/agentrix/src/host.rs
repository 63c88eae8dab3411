//! Host-terminal widget: paints straight into the user's terminal.

use std::io::{self, Write};

use tracing::debug;

use agentrix_core::Theme;
use agentrix_session::TerminalWidget;

/// Full reset (RIS).
const RESET: &[u8] = b"\x1bc";

/// [`TerminalWidget`] writing to a host terminal.
///
/// Bell, clipboard and link sequences pass through to the host, which
/// handles them itself.
pub struct HostTerminal<W: Write + Send> {
    out: W,
}

impl HostTerminal<io::Stdout> {
    /// Widget over stdout.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> HostTerminal<W> {
    /// Widget over any writer.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// The underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.out
    }

    fn emit(&mut self, bytes: &[u8]) {
        let result = self.out.write_all(bytes).and_then(|_| self.out.flush());
        if let Err(e) = result {
            debug!("Host terminal write failed: {}", e);
        }
    }
}

/// OSC 10/11/12 sequences setting the default colors. Default colors
/// emit nothing.
pub fn theme_sequences(theme: &Theme) -> Vec<u8> {
    let mut out = Vec::new();
    for (code, color) in [(10, theme.foreground), (11, theme.background), (12, theme.cursor)] {
        if let Some(spec) = color.x11_spec() {
            out.extend_from_slice(format!("\x1b]{code};{spec}\x07").as_bytes());
        }
    }
    out
}

impl<W: Write + Send> TerminalWidget for HostTerminal<W> {
    fn reset(&mut self) {
        self.emit(RESET);
    }

    fn apply_theme(&mut self, theme: &Theme) {
        let sequences = theme_sequences(theme);
        if !sequences.is_empty() {
            self.emit(&sequences);
        }
    }

    fn write(&mut self, bytes: &[u8]) {
        self.emit(bytes);
    }
}
