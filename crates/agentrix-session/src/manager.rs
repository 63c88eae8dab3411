//! Session manager for coordinating attachments across worktrees.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use agentrix_core::{ClientConfig, Error, Result, SessionSummary, Tool, WorktreeKey};

use crate::activity::ActivityTracker;
use crate::attachment::Attachment;
use crate::directory::SessionDirectory;
use crate::transport::Transport;

/// Owns every attachment (at most one per worktree) and the activity
/// tracker.
pub struct SessionManager {
    attachments: HashMap<WorktreeKey, Attachment>,
    tracker: ActivityTracker,
    directory: Arc<dyn SessionDirectory>,
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    selected: Option<WorktreeKey>,
}

impl SessionManager {
    /// Create a manager using the wall clock for acknowledgements.
    pub fn new(
        directory: Arc<dyn SessionDirectory>,
        transport: Arc<dyn Transport>,
        config: ClientConfig,
    ) -> Self {
        let tracker = ActivityTracker::new(&config.activity);
        Self::with_tracker(directory, transport, config, tracker)
    }

    /// Create a manager around an existing tracker.
    pub fn with_tracker(
        directory: Arc<dyn SessionDirectory>,
        transport: Arc<dyn Transport>,
        config: ClientConfig,
        tracker: ActivityTracker,
    ) -> Self {
        Self {
            attachments: HashMap::new(),
            tracker,
            directory,
            transport,
            config,
            selected: None,
        }
    }

    /// Attach to a worktree's session and select it.
    ///
    /// An existing attachment is reused as is. A new one counts against
    /// `manager.max_attachments` and is only kept if opening succeeds.
    pub async fn attach(&mut self, key: WorktreeKey, tool: Tool) -> Result<&mut Attachment> {
        if !self.attachments.contains_key(&key) {
            let max = self.config.manager.max_attachments;
            if self.attachments.len() >= max {
                return Err(Error::SessionLimitReached(max));
            }

            let mut attachment = Attachment::new(
                key.clone(),
                tool,
                Arc::clone(&self.directory),
                Arc::clone(&self.transport),
                &self.config,
            );
            attachment.open().await?;
            info!(%key, count = self.attachments.len() + 1, "Attachment added");
            self.attachments.insert(key.clone(), attachment);
        } else {
            debug!(%key, "Reusing attachment");
        }

        self.select(&key);
        self.get_mut(&key)
    }

    /// Attachment for `key`.
    pub fn get(&self, key: &WorktreeKey) -> Result<&Attachment> {
        self.attachments
            .get(key)
            .ok_or_else(|| Error::NotAttached(key.clone()))
    }

    /// Attachment for `key`, mutably.
    pub fn get_mut(&mut self, key: &WorktreeKey) -> Result<&mut Attachment> {
        self.attachments
            .get_mut(key)
            .ok_or_else(|| Error::NotAttached(key.clone()))
    }

    /// Mark `key` as the worktree in view, acknowledging it if idle.
    pub fn select(&mut self, key: &WorktreeKey) -> bool {
        self.selected = Some(key.clone());
        self.tracker.acknowledge_idle(key)
    }

    /// Worktree in view.
    pub fn selected(&self) -> Option<&WorktreeKey> {
        self.selected.as_ref()
    }

    /// Drop the attachment for `key` and forget its activity state.
    pub async fn detach(&mut self, key: &WorktreeKey, close_remote: bool) -> Result<()> {
        let mut attachment = self
            .attachments
            .remove(key)
            .ok_or_else(|| Error::NotAttached(key.clone()))?;
        self.tracker.remove(key);
        if self.selected.as_ref() == Some(key) {
            self.selected = None;
        }
        info!(%key, close_remote, "Attachment removed");
        attachment.disconnect(close_remote).await
    }

    /// Detach everything. Remote close failures are logged.
    pub async fn detach_all(&mut self, close_remote: bool) {
        let keys: Vec<WorktreeKey> = self.attachments.keys().cloned().collect();
        for key in keys {
            if let Err(e) = self.detach(&key, close_remote).await {
                warn!(%key, "Detach failed: {}", e);
            }
        }
    }

    /// Feed a session-list snapshot to the tracker.
    pub fn sync_sessions(&mut self, sessions: &[SessionSummary]) {
        self.tracker.sync_known_sessions(sessions);
    }

    /// Fetch the session list from the directory and sync it.
    pub async fn refresh(&mut self) -> Result<Vec<SessionSummary>> {
        let sessions = self.directory.list_sessions().await?;
        self.sync_sessions(&sessions);
        Ok(sessions)
    }

    /// Activity tracker.
    pub fn tracker(&self) -> &ActivityTracker {
        &self.tracker
    }

    /// Number of attachments.
    pub fn attachment_count(&self) -> usize {
        self.attachments.len()
    }

    /// Attached worktrees, sorted.
    pub fn keys(&self) -> Vec<&WorktreeKey> {
        let mut keys: Vec<_> = self.attachments.keys().collect();
        keys.sort();
        keys
    }

    /// Client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}
