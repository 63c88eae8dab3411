//! Leading control-noise filter for gated reconciliation.
//!
//! Shells and multiplexers emit a burst of cursor and mode sequences right
//! after attach. Until the stream has shown a visible glyph, such deltas
//! are dropped. The test is a heuristic over printable ASCII, not a parser
//! of escape sequences: a prompt made only of non-ASCII box drawing may
//! never flip the flag, and escape parameters such as `[2J` count as
//! printable. Both thresholds are tunable through [`ReconcilerSettings`].

use agentrix_core::ReconcilerSettings;

/// Printable statistics for one delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrintableStats {
    /// Bytes in 0x20..=0x7E
    pub printable: usize,
    /// Bytes considered (everything except CR and LF)
    pub considered: usize,
}

impl PrintableStats {
    /// Scan a delta.
    pub fn scan(delta: &[u8]) -> Self {
        delta
            .iter()
            .filter(|b| !matches!(b, b'\r' | b'\n'))
            .fold(Self::default(), |mut stats, b| {
                stats.considered += 1;
                if (0x20..=0x7e).contains(b) {
                    stats.printable += 1;
                }
                stats
            })
    }

    /// Printable share of the considered bytes (0 when nothing was considered).
    pub fn ratio(&self) -> f64 {
        if self.considered == 0 {
            0.0
        } else {
            self.printable as f64 / self.considered as f64
        }
    }
}

/// Tracks whether the stream has printed a visible glyph this attach cycle.
#[derive(Debug, Clone)]
pub struct GlyphFilter {
    min_printable_bytes: usize,
    printable_ratio: f64,
    printable_seen: usize,
    visible: bool,
}

impl GlyphFilter {
    /// Filter with the configured thresholds.
    pub fn new(settings: &ReconcilerSettings) -> Self {
        Self::with_thresholds(settings.min_printable_bytes, settings.printable_ratio)
    }

    /// Filter with explicit thresholds.
    pub fn with_thresholds(min_printable_bytes: usize, printable_ratio: f64) -> Self {
        Self {
            min_printable_bytes,
            printable_ratio,
            printable_seen: 0,
            visible: false,
        }
    }

    /// Whether a visible glyph has been seen. Sticky until [`reset`](Self::reset).
    pub fn has_visible_glyph(&self) -> bool {
        self.visible
    }

    /// Feed a delta. Returns true if the delta should be kept, which is
    /// the case once the flag has flipped (including on the flipping delta).
    ///
    /// Printable bytes of dropped deltas still count toward the cumulative
    /// threshold.
    pub fn observe(&mut self, delta: &[u8]) -> bool {
        if self.visible {
            return true;
        }
        let stats = PrintableStats::scan(delta);
        self.printable_seen += stats.printable;
        if self.printable_seen >= self.min_printable_bytes
            || (stats.considered > 0 && stats.ratio() >= self.printable_ratio)
        {
            self.visible = true;
        }
        self.visible
    }

    /// Start a new attach cycle.
    pub fn reset(&mut self) {
        self.printable_seen = 0;
        self.visible = false;
    }
}

impl Default for GlyphFilter {
    fn default() -> Self {
        Self::new(&ReconcilerSettings::default())
    }
}
