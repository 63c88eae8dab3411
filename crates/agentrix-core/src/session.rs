//! Session and worktree identity types.

use chrono::DateTime;
use serde::{Deserialize, Deserializer, Serialize};

/// Opaque identifier of a server-side terminal session.
///
/// Issued by the session directory; the client never invents one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap an identifier issued by the server.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Composite identity of a worktree: `(org, repo, branch)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorktreeKey {
    /// Organisation (owner) name
    pub org: String,
    /// Repository name
    pub repo: String,
    /// Branch checked out in the worktree
    pub branch: String,
}

impl WorktreeKey {
    /// Create a new worktree key.
    pub fn new(org: impl Into<String>, repo: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            repo: repo.into(),
            branch: branch.into(),
        }
    }
}

impl std::fmt::Display for WorktreeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}", self.org, self.repo, self.branch)
    }
}

/// Kind of process launched in a session. Affects display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    /// Plain interactive shell
    #[default]
    Terminal,
    /// Coding agent
    Agent,
}

impl std::str::FromStr for Tool {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "terminal" => Ok(Tool::Terminal),
            "agent" => Ok(Tool::Agent),
            other => Err(crate::Error::InvalidInput(format!("Unknown tool: {other}"))),
        }
    }
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tool::Terminal => f.write_str("terminal"),
            Tool::Agent => f.write_str("agent"),
        }
    }
}

/// One entry of the session-list call.
///
/// A server may report several entries for the same worktree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// Organisation name
    pub org: String,
    /// Repository name
    pub repo: String,
    /// Branch name
    pub branch: String,
    /// Server-computed idle flag (advisory)
    #[serde(default)]
    pub idle: bool,
    /// Last activity in epoch milliseconds
    #[serde(
        default,
        rename = "lastActivityAt",
        deserialize_with = "timestamp_ms",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_activity_at_ms: Option<i64>,
    /// Creation time in epoch milliseconds
    #[serde(
        default,
        rename = "createdAt",
        deserialize_with = "timestamp_ms",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at_ms: Option<i64>,
    /// Session identifier, when the server exposes it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// Launched tool, when the server exposes it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<Tool>,
}

impl SessionSummary {
    /// Worktree this entry belongs to.
    pub fn key(&self) -> WorktreeKey {
        WorktreeKey::new(&self.org, &self.repo, &self.branch)
    }
}

/// Response of the session-open call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenedSession {
    /// Identifier of the (new or already running) session
    pub session_id: SessionId,
    /// Transcript produced so far
    #[serde(default)]
    pub log: String,
    /// Whether the call spawned a new process
    #[serde(default)]
    pub created: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireTimestamp {
    Millis(i64),
    Text(String),
}

/// Accept either epoch milliseconds or an RFC 3339 string.
fn timestamp_ms<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<WireTimestamp>::deserialize(deserializer)? {
        None => Ok(None),
        Some(WireTimestamp::Millis(ms)) => Ok(Some(ms)),
        Some(WireTimestamp::Text(text)) => DateTime::parse_from_rfc3339(&text)
            .map(|dt| Some(dt.timestamp_millis()))
            .map_err(serde::de::Error::custom),
    }
}
