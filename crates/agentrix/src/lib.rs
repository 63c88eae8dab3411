//! agentrix client library
//!
//! Command-line layer over the session crates: argument parsing, logging
//! setup, the host-terminal widget and the subcommands. The binary entry
//! point is in main.rs.

pub mod cli;
pub mod commands;
pub mod host;
pub mod keys;
pub mod logging;

// Re-export commonly used types
pub use cli::{Cli, Command};
pub use host::HostTerminal;
pub use keys::KeyAction;
