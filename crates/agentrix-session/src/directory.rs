//! Session directory: the REST side of the server.
//!
//! Opening a session is idempotent per worktree; the server returns the
//! running session (and its transcript so far) when one exists.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use agentrix_core::{
    ConnectionError, ConnectionErrorKind, Error, OpenedSession, Result, ServerSettings,
    SessionId, SessionSummary, Tool, WorktreeKey,
};

/// Server-side session registry.
#[async_trait]
pub trait SessionDirectory: Send + Sync {
    /// Open (or find) the session for a worktree.
    async fn open_session(&self, key: &WorktreeKey, tool: Tool) -> Result<OpenedSession>;

    /// All sessions the server knows about.
    async fn list_sessions(&self) -> Result<Vec<SessionSummary>>;

    /// Terminate a session.
    async fn close_session(&self, session_id: &SessionId) -> Result<()>;
}

#[derive(Serialize)]
struct OpenRequest<'a> {
    org: &'a str,
    repo: &'a str,
    branch: &'a str,
    tool: Tool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CloseRequest<'a> {
    session_id: &'a SessionId,
}

#[derive(Deserialize)]
struct SessionList {
    #[serde(default)]
    sessions: Vec<SessionSummary>,
}

/// [`SessionDirectory`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSessionDirectory {
    client: Client,
    base_url: Url,
}

impl HttpSessionDirectory {
    /// Build a client from server settings.
    pub fn new(settings: &ServerSettings) -> Result<Self> {
        let base_url = Url::parse(settings.base_url.trim())
            .map_err(|e| Error::Config(format!("invalid server.base_url: {e}")))?;
        let client = Client::builder()
            .timeout(settings.request_timeout())
            .connect_timeout(settings.connect_timeout())
            .build()
            .map_err(|e| Error::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client, base_url })
    }

    /// Absolute URL of an API endpoint under `/api/terminal/`.
    pub fn endpoint(&self, name: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config("server.base_url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["api", "terminal", name]);
        url.set_query(None);
        Ok(url)
    }

    async fn read_json<T: DeserializeOwned>(
        what: &str,
        response: reqwest::Response,
    ) -> Result<T> {
        let response = check_status(what, response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| Error::Directory(format!("{what}: malformed response: {e}")))
    }
}

#[async_trait]
impl SessionDirectory for HttpSessionDirectory {
    async fn open_session(&self, key: &WorktreeKey, tool: Tool) -> Result<OpenedSession> {
        let url = self.endpoint("open")?;
        debug!(%key, %tool, "Opening session");
        let response = self
            .client
            .post(url)
            .json(&OpenRequest {
                org: &key.org,
                repo: &key.repo,
                branch: &key.branch,
                tool,
            })
            .send()
            .await
            .map_err(classify_request_error)?;
        let opened: OpenedSession = Self::read_json("open session", response).await?;
        info!(
            %key,
            session_id = %opened.session_id,
            created = opened.created,
            log_bytes = opened.log.len(),
            "Session opened"
        );
        Ok(opened)
    }

    async fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        let url = self.endpoint("sessions")?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(classify_request_error)?;
        let list: SessionList = Self::read_json("list sessions", response).await?;
        debug!(count = list.sessions.len(), "Sessions listed");
        Ok(list.sessions)
    }

    async fn close_session(&self, session_id: &SessionId) -> Result<()> {
        let url = self.endpoint("close")?;
        let response = self
            .client
            .post(url)
            .json(&CloseRequest { session_id })
            .send()
            .await
            .map_err(classify_request_error)?;
        check_status("close session", response).await?;
        info!(%session_id, "Session closed");
        Ok(())
    }
}

async fn check_status(what: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(what, status, &body))
}

fn status_error(what: &str, status: StatusCode, body: &str) -> Error {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .and_then(|e| e.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string());
    if detail.is_empty() {
        Error::Directory(format!("{what}: HTTP {status}"))
    } else {
        Error::Directory(format!("{what}: HTTP {status}: {detail}"))
    }
}

/// Map a request failure onto the connection taxonomy.
pub fn classify_request_error(err: reqwest::Error) -> Error {
    let kind = if err.is_timeout() {
        ConnectionErrorKind::Timeout
    } else if err.is_connect() {
        ConnectionErrorKind::Refused
    } else {
        ConnectionErrorKind::Other
    };
    ConnectionError::new(kind, err.to_string()).into()
}
