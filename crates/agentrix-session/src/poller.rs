//! Periodic session-list polling.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use agentrix_core::SessionSummary;

use crate::directory::SessionDirectory;

/// Background task that lists sessions on an interval.
///
/// Snapshots are delivered over a channel so the tracker is only mutated
/// by its owner. Dropping the poller stops it.
#[derive(Debug)]
pub struct SessionPoller {
    task: JoinHandle<()>,
}

impl SessionPoller {
    /// Start polling. The first list call happens immediately.
    pub fn spawn(
        directory: Arc<dyn SessionDirectory>,
        interval: Duration,
    ) -> (Self, mpsc::Receiver<Vec<SessionSummary>>) {
        let (tx, rx) = mpsc::channel(4);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match directory.list_sessions().await {
                    Ok(sessions) => {
                        if tx.send(sessions).await.is_err() {
                            debug!("Session poller receiver dropped");
                            break;
                        }
                    }
                    Err(e) => warn!("Session list failed: {}", e),
                }
            }
        });
        (Self { task }, rx)
    }

    /// Whether the task has stopped.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop polling.
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for SessionPoller {
    fn drop(&mut self) {
        self.task.abort();
    }
}
