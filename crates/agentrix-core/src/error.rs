//! Error types for the agentrix client.

use std::fmt;

use thiserror::Error;

use crate::WorktreeKey;

/// Classification of transport-level failures.
///
/// Network-class kinds carry their own user-facing wording so the UI can
/// tell a dropped connection apart from a generic failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionErrorKind {
    /// The connection attempt or a read timed out
    Timeout,
    /// An established connection was lost
    Lost,
    /// The remote end refused the connection
    Refused,
    /// An operation required a connection that does not exist
    NotConnected,
    /// Anything else (TLS, malformed URL, HTTP status, ...)
    Other,
}

impl ConnectionErrorKind {
    /// Whether this kind is one of the network-class failures.
    pub fn is_network(&self) -> bool {
        !matches!(self, ConnectionErrorKind::Other)
    }

    /// Human-readable message shown in the error banner.
    pub fn user_message(&self) -> &'static str {
        match self {
            ConnectionErrorKind::Timeout => "Connection timed out",
            ConnectionErrorKind::Lost => "Connection to the session was lost",
            ConnectionErrorKind::Refused => "Connection refused by the server",
            ConnectionErrorKind::NotConnected => "Not connected to the server",
            ConnectionErrorKind::Other => "Terminal connection failed",
        }
    }
}

impl fmt::Display for ConnectionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.user_message())
    }
}

/// A transport-level failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionError {
    /// Failure classification
    pub kind: ConnectionErrorKind,
    /// Low-level detail (socket error text), used for logs and generic errors
    pub detail: String,
}

impl ConnectionError {
    /// Create a new connection error.
    pub fn new(kind: ConnectionErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// Message for the error banner.
    ///
    /// Network-class errors use a fixed message per kind; generic errors
    /// include the underlying detail.
    pub fn user_message(&self) -> String {
        if self.kind.is_network() || self.detail.is_empty() {
            self.kind.user_message().to_string()
        } else {
            format!("{}: {}", self.kind.user_message(), self.detail)
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.detail.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{} ({})", self.kind, self.detail)
        }
    }
}

impl std::error::Error for ConnectionError {}

/// Main error type for agentrix operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport-level failure
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Malformed or unrecognized frame
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Error reported by the server for the attached session
    #[error("Session error: {0}")]
    Session(String),

    /// Session directory (REST) rejected a request
    #[error("Session directory error: {0}")]
    Directory(String),

    /// Attachment limit reached
    #[error("Attachment limit reached (max: {0})")]
    SessionLimitReached(usize),

    /// No attachment exists for the worktree
    #[error("No attachment for worktree: {0}")]
    NotAttached(WorktreeKey),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input or parameters (generic)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Message suitable for an inline error banner.
    pub fn user_message(&self) -> String {
        match self {
            Error::Connection(err) => err.user_message(),
            Error::Session(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
