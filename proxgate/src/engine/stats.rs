//! Lock-free engine counters.
//!
//! ```text
//! Session actor / refresh ─────► EngineStats ─────► StatsSnapshot ─────► CLI
//!                               (atomic counters)   (point-in-time copy)
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the engine as readings flow through it.
#[derive(Debug, Default)]
pub struct EngineStats {
    watch_fixes: AtomicU64,
    watch_errors: AtomicU64,
    initial_reads: AtomicU64,
    initial_failures: AtomicU64,
    refreshes: AtomicU64,
    refresh_failures: AtomicU64,
    stale_dropped: AtomicU64,
}

impl EngineStats {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn watch_fix(&self) {
        self.watch_fixes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn watch_error(&self) {
        self.watch_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn initial_read(&self, failed: bool) {
        self.initial_reads.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.initial_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn refresh(&self, failed: bool) {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.refresh_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn stale_dropped(&self) {
        self.stale_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current values.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            watch_fixes: self.watch_fixes.load(Ordering::Relaxed),
            watch_errors: self.watch_errors.load(Ordering::Relaxed),
            initial_reads: self.initial_reads.load(Ordering::Relaxed),
            initial_failures: self.initial_failures.load(Ordering::Relaxed),
            refreshes: self.refreshes.load(Ordering::Relaxed),
            refresh_failures: self.refresh_failures.load(Ordering::Relaxed),
            stale_dropped: self.stale_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`EngineStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Watch fixes applied to the published result.
    pub watch_fixes: u64,
    /// Watch failures absorbed without publishing.
    pub watch_errors: u64,
    /// Initial reads completed (successful or not).
    pub initial_reads: u64,
    /// Initial reads that failed.
    pub initial_failures: u64,
    /// Refreshes that reached the sensor.
    pub refreshes: u64,
    /// Refreshes whose read failed.
    pub refresh_failures: u64,
    /// Updates discarded because the session had already stopped.
    pub stale_dropped: u64,
}
