//! # agentrix-emulator
//!
//! Off-screen terminal emulator used as a render target by agentrix.
//!
//! This crate provides:
//! - VTE-driven parser whose state persists across output chunks
//! - Terminal grid with scrollback, cursor and pen tracking
//! - Side-channel events raised by the stream (bell, clipboard, links)
//!
//! ## Architecture
//!
//! This is Layer 1 in the architecture - it depends on agentrix-core
//! and is consumed by agentrix-session through the render adapter.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod grid;
pub mod parser;

// Re-export commonly used types
pub use grid::{Cursor, Grid, Pen};
pub use parser::{Parser, TerminalEvent};
