//! Resize coalescing.
//!
//! A layout change is reported on the next frame tick and once more after
//! a settle delay, to catch late layout passes. Dimensions equal to the
//! last ones sent are never re-sent.

use std::time::{Duration, Instant};

use agentrix_core::{Dimensions, RenderSettings};

/// Coalesces viewport size changes into at most two emissions.
#[derive(Debug, Clone)]
pub struct ResizeCoalescer {
    frame_tick: Duration,
    settle: Duration,
    requested: Option<Dimensions>,
    last_sent: Option<Dimensions>,
    deadlines: Vec<Instant>,
}

impl ResizeCoalescer {
    /// Coalescer with the configured delays.
    pub fn new(settings: &RenderSettings) -> Self {
        Self::with_delays(
            Duration::from_millis(settings.frame_tick_ms),
            Duration::from_millis(settings.resize_settle_ms),
        )
    }

    /// Coalescer with explicit delays.
    pub fn with_delays(frame_tick: Duration, settle: Duration) -> Self {
        Self {
            frame_tick,
            settle,
            requested: None,
            last_sent: None,
            deadlines: Vec::new(),
        }
    }

    /// Record a size change observed at `now`. Reschedules both emissions.
    pub fn request(&mut self, dims: Dimensions, now: Instant) {
        if dims.is_empty() {
            return;
        }
        self.requested = Some(dims);
        self.deadlines = vec![now + self.frame_tick, now + self.settle];
    }

    /// Earliest pending emission, for the caller's timer.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.iter().min().copied()
    }

    /// Emit the requested size if an emission is due and it differs from
    /// what was last sent.
    pub fn poll_due(&mut self, now: Instant) -> Option<Dimensions> {
        let before = self.deadlines.len();
        self.deadlines.retain(|deadline| *deadline > now);
        if self.deadlines.len() == before {
            return None;
        }
        let dims = self.requested?;
        if self.last_sent == Some(dims) {
            return None;
        }
        self.last_sent = Some(dims);
        Some(dims)
    }

    /// Forget what was sent, so the next poll re-sends the current size
    /// (used after attaching a fresh channel).
    pub fn resend(&mut self, now: Instant) {
        self.last_sent = None;
        if let Some(dims) = self.requested {
            self.request(dims, now);
        }
    }

    /// Last size sent.
    pub fn last_sent(&self) -> Option<Dimensions> {
        self.last_sent
    }
}
