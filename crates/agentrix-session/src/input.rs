//! Keystroke forwarding.
//!
//! Widgets never echo typed text locally. Their text-commit path calls a
//! [`TextInputHandler`], which sends exactly one frame per keystroke; the
//! character shows up when the remote echo comes back as output.

use tokio::sync::mpsc;
use tracing::debug;

use agentrix_core::{Dimensions, InputSettings};

use crate::protocol::{ClientFrame, InputData};

/// DEL, what terminals send for backspace.
pub const DELETE_BACKWARD: u8 = 0x7f;

/// Narrow capability every widget binding implements by intercepting its
/// native text-insertion path.
pub trait TextInputHandler {
    /// Text committed by the user (one keystroke, or one IME commit).
    fn on_insert_text(&mut self, text: &str);
    /// Backspace.
    fn on_delete_backward(&mut self);
}

/// Sending half of the attachment's input queue.
pub type InputSender = mpsc::UnboundedSender<ClientFrame>;

/// Forwards input to the attachment, which routes it to the live channel.
///
/// The queue outlives individual channels, so a forwarder handed to a
/// widget stays valid across reconnects.
#[derive(Debug, Clone)]
pub struct InputForwarder {
    tx: InputSender,
    binary_frames: bool,
}

impl InputForwarder {
    /// Forwarder over `tx`.
    pub fn new(tx: InputSender, settings: &InputSettings) -> Self {
        Self {
            tx,
            binary_frames: settings.binary_frames,
        }
    }

    /// Send raw bytes (escape sequences, control keys).
    pub fn send_bytes(&self, bytes: &[u8]) -> bool {
        if bytes.is_empty() {
            return true;
        }
        let data = if self.binary_frames {
            InputData::Bytes(bytes.to_vec())
        } else {
            InputData::Text(String::from_utf8_lossy(bytes).into_owned())
        };
        self.send(ClientFrame::Input(data))
    }

    /// Send a whole paste as one frame.
    pub fn on_paste(&self, text: &str) -> bool {
        self.send_bytes(text.as_bytes())
    }

    /// Report a new viewport size.
    pub fn send_resize(&self, dims: Dimensions) -> bool {
        self.send(ClientFrame::Resize(dims))
    }

    fn send(&self, frame: ClientFrame) -> bool {
        let sent = self.tx.send(frame).is_ok();
        if !sent {
            debug!("Input dropped: attachment gone");
        }
        sent
    }
}

impl TextInputHandler for InputForwarder {
    fn on_insert_text(&mut self, text: &str) {
        self.send_bytes(text.as_bytes());
    }

    fn on_delete_backward(&mut self) {
        self.send_bytes(&[DELETE_BACKWARD]);
    }
}
