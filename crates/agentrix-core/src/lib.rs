//! # agentrix-core
//!
//! Core types for the agentrix terminal streaming client.
//!
//! This crate contains all fundamental types with **no internal dependencies**
//! on other agentrix crates. It provides:
//!
//! - Session types (SessionId, WorktreeKey, Tool, SessionSummary)
//! - Geometry types (Dimensions)
//! - Cell, color and theme types for terminal rendering
//! - Error taxonomy (connection, protocol, session errors)
//! - Client configuration and persisted preferences
//!
//! ## Architecture
//!
//! This is Layer 0 in the architecture - all other crates depend on this one,
//! but this crate has no dependencies on other agentrix crates.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cell;
pub mod config;
pub mod error;
pub mod geometry;
pub mod preferences;
pub mod session;

// Re-export commonly used types
pub use cell::{Cell, CellAttributes, Color, Theme};
pub use config::{
    ActivitySettings, ClientConfig, InputSettings, LoggingSettings, ManagerSettings,
    ReconcileMode, ReconcilerSettings, RenderSettings, ServerSettings, TerminalSettings,
};
pub use error::{ConnectionError, ConnectionErrorKind, Error, Result};
pub use geometry::{Dimensions, Position};
pub use preferences::Preferences;
pub use session::{OpenedSession, SessionId, SessionSummary, Tool, WorktreeKey};
