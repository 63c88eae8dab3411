//! Per-worktree activity metadata and idle acknowledgements.
//!
//! The tracker outlives any single connection: it is fed by the session
//! poller and consulted by the UI to decide which worktrees to highlight.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use tracing::debug;

use agentrix_core::{ActivitySettings, SessionSummary, WorktreeKey};

/// Source of "now" in epoch milliseconds.
pub trait Clock: Send + Sync {
    /// Current time in epoch milliseconds.
    fn now_ms(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Arc<AtomicI64>);

impl ManualClock {
    /// Clock starting at `now_ms`.
    pub fn new(now_ms: i64) -> Self {
        Self(Arc::new(AtomicI64::new(now_ms)))
    }

    /// Jump to `now_ms`.
    pub fn set(&self, now_ms: i64) {
        self.0.store(now_ms, Ordering::SeqCst);
    }

    /// Move forward by `delta_ms`.
    pub fn advance(&self, delta_ms: i64) {
        self.0.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Aggregated metadata for one worktree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionMetadata {
    /// True only if every reported entry is idle
    pub idle: bool,
    /// Most recent reported activity
    pub last_activity_at_ms: Option<i64>,
}

/// Record that the user has seen an idle worktree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleAcknowledgement {
    /// When the user acknowledged
    pub acknowledged_at_ms: i64,
    /// Activity timestamp known at the last validation
    pub last_seen_activity_ms: Option<i64>,
}

/// Activity and idle-acknowledgement state for all known worktrees.
pub struct ActivityTracker {
    metadata: HashMap<WorktreeKey, SessionMetadata>,
    acknowledgements: HashMap<WorktreeKey, IdleAcknowledgement>,
    tolerance_ms: i64,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ActivityTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityTracker")
            .field("metadata", &self.metadata)
            .field("acknowledgements", &self.acknowledgements)
            .field("tolerance_ms", &self.tolerance_ms)
            .finish_non_exhaustive()
    }
}

impl ActivityTracker {
    /// Tracker using the wall clock.
    pub fn new(settings: &ActivitySettings) -> Self {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    /// Tracker using a custom clock.
    pub fn with_clock(settings: &ActivitySettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            metadata: HashMap::new(),
            acknowledgements: HashMap::new(),
            tolerance_ms: settings.ack_tolerance_ms,
            clock,
        }
    }

    /// Replace metadata with a fresh session list and re-validate every
    /// acknowledgement against it.
    pub fn sync_known_sessions(&mut self, sessions: &[SessionSummary]) {
        let mut metadata: HashMap<WorktreeKey, SessionMetadata> = HashMap::new();
        for summary in sessions {
            metadata
                .entry(summary.key())
                .and_modify(|meta| {
                    meta.idle &= summary.idle;
                    meta.last_activity_at_ms =
                        meta.last_activity_at_ms.max(summary.last_activity_at_ms);
                })
                .or_insert(SessionMetadata {
                    idle: summary.idle,
                    last_activity_at_ms: summary.last_activity_at_ms,
                });
        }
        self.metadata = metadata;

        let tolerance_ms = self.tolerance_ms;
        let metadata = &self.metadata;
        self.acknowledgements.retain(|key, ack| {
            let Some(meta) = metadata.get(key) else {
                debug!(%key, "Dropping acknowledgement for vanished session");
                return false;
            };
            if is_newer(meta, ack, tolerance_ms) {
                debug!(%key, "Dropping acknowledgement invalidated by new activity");
                return false;
            }
            ack.last_seen_activity_ms = meta.last_activity_at_ms;
            true
        });
    }

    /// Record that the user has seen `key` while idle.
    ///
    /// No-op (returning false) unless the worktree is currently idle.
    pub fn acknowledge_idle(&mut self, key: &WorktreeKey) -> bool {
        let Some(meta) = self.metadata.get(key).filter(|meta| meta.idle) else {
            return false;
        };
        let ack = IdleAcknowledgement {
            acknowledged_at_ms: self.clock.now_ms(),
            last_seen_activity_ms: meta.last_activity_at_ms,
        };
        debug!(%key, at = ack.acknowledged_at_ms, "Idle acknowledged");
        self.acknowledgements.insert(key.clone(), ack);
        true
    }

    /// Whether `key` has a current acknowledgement.
    pub fn is_acknowledged(&self, key: &WorktreeKey) -> bool {
        match (self.acknowledgements.get(key), self.metadata.get(key)) {
            (Some(ack), Some(meta)) => !is_newer(meta, ack, self.tolerance_ms),
            _ => false,
        }
    }

    /// Whether the UI should highlight `key` as idle.
    pub fn should_highlight(&self, key: &WorktreeKey) -> bool {
        self.metadata.get(key).is_some_and(|meta| meta.idle) && !self.is_acknowledged(key)
    }

    /// Forget everything about `key`.
    pub fn remove(&mut self, key: &WorktreeKey) {
        self.metadata.remove(key);
        self.acknowledgements.remove(key);
    }

    /// Aggregated metadata for `key`.
    pub fn metadata(&self, key: &WorktreeKey) -> Option<&SessionMetadata> {
        self.metadata.get(key)
    }

    /// Acknowledgement for `key`, if any.
    pub fn acknowledgement(&self, key: &WorktreeKey) -> Option<&IdleAcknowledgement> {
        self.acknowledgements.get(key)
    }

    /// Known worktrees, sorted.
    pub fn keys(&self) -> Vec<&WorktreeKey> {
        let mut keys: Vec<_> = self.metadata.keys().collect();
        keys.sort();
        keys
    }
}

fn is_newer(meta: &SessionMetadata, ack: &IdleAcknowledgement, tolerance_ms: i64) -> bool {
    meta.last_activity_at_ms
        .is_some_and(|activity| activity > ack.acknowledged_at_ms + tolerance_ms)
}
