//! # agentrix-session
//!
//! Streaming-session protocol for agentrix.
//!
//! This crate provides:
//! - The transport channel (WebSocket receive loop, tagged events)
//! - Output reconciliation (transcript, replace vs. append paints, gating)
//! - Idle tracking and acknowledgements
//! - The render adapter contract and widget bindings
//! - Input forwarding and resize coalescing
//! - The session directory client, attachments and the session manager
//!
//! ## Architecture
//!
//! This is Layer 2 in the architecture - it depends on agentrix-core
//! and agentrix-emulator and drives one reconciler per attached worktree.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod activity;
pub mod attachment;
pub mod directory;
pub mod filter;
pub mod input;
pub mod manager;
pub mod poller;
pub mod protocol;
pub mod reconciler;
pub mod render;
pub mod resize;
pub mod transport;

// Re-export commonly used types
pub use activity::{
    ActivityTracker, Clock, IdleAcknowledgement, ManualClock, SessionMetadata, SystemClock,
};
pub use attachment::{Attachment, Step};
pub use directory::{HttpSessionDirectory, SessionDirectory};
pub use filter::{GlyphFilter, PrintableStats};
pub use input::{InputForwarder, InputSender, TextInputHandler};
pub use manager::SessionManager;
pub use poller::SessionPoller;
pub use protocol::{ClientFrame, InputData, Payload, ServerEvent};
pub use reconciler::{AttachState, OutputSink, Readiness, Reconciler};
pub use render::{
    lock_widget, LogSideChannel, RenderAdapter, SideChannelHandler, SideEvent, TerminalWidget,
};
pub use resize::ResizeCoalescer;
pub use transport::{
    ChannelEvent, ChannelHandle, EventSender, TaggedEvent, Transport, WebSocketTransport,
};
