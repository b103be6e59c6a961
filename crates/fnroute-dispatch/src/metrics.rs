//! Dispatcher counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
/// Snapshot of dispatcher counters at a point in time.
pub struct MetricsSnapshot {
    /// Calls to `invoke`.
    pub invocations: u64,
    /// Invocations that returned a successful result.
    pub invocation_successes: u64,
    /// Attempts started (primary plus backup).
    pub attempts: u64,
    /// Attempts that ended without a usable response.
    pub attempt_failures: u64,
    /// Attempts that hit the per-call timeout.
    pub attempt_timeouts: u64,
    /// Backup attempts launched.
    pub hedges: u64,
    /// Invocations whose adopted result came from the backup.
    pub hedge_wins: u64,
    /// Invocations cut off by the overall deadline.
    pub deadline_expirations: u64,
    /// Times a target entered (or re-entered) quarantine.
    pub quarantine_events: u64,
    /// hedges / invocations.
    pub hedge_rate: f64,
    /// hedge_wins / hedges.
    pub hedge_win_rate: f64,
}

/// Thread-safe dispatcher counters.
pub struct DispatchMetrics {
    invocations: AtomicU64,
    invocation_successes: AtomicU64,
    attempts: AtomicU64,
    attempt_failures: AtomicU64,
    attempt_timeouts: AtomicU64,
    hedges: AtomicU64,
    hedge_wins: AtomicU64,
    deadline_expirations: AtomicU64,
    quarantine_events: AtomicU64,
}

impl Default for DispatchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DispatchMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchMetrics")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

impl DispatchMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            invocations: AtomicU64::new(0),
            invocation_successes: AtomicU64::new(0),
            attempts: AtomicU64::new(0),
            attempt_failures: AtomicU64::new(0),
            attempt_timeouts: AtomicU64::new(0),
            hedges: AtomicU64::new(0),
            hedge_wins: AtomicU64::new(0),
            deadline_expirations: AtomicU64::new(0),
            quarantine_events: AtomicU64::new(0),
        }
    }

    pub fn inc_invocations(&self) {
        self.invocations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_invocation_successes(&self) {
        self.invocation_successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_attempts(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_attempt_failures(&self) {
        self.attempt_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_attempt_timeouts(&self) {
        self.attempt_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_hedges(&self) {
        self.hedges.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_hedge_wins(&self) {
        self.hedge_wins.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_deadline_expirations(&self) {
        self.deadline_expirations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_quarantine_events(&self) {
        self.quarantine_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let invocations = self.invocations.load(Ordering::Relaxed);
        let hedges = self.hedges.load(Ordering::Relaxed);
        let hedge_wins = self.hedge_wins.load(Ordering::Relaxed);
        MetricsSnapshot {
            invocations,
            invocation_successes: self.invocation_successes.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            attempt_failures: self.attempt_failures.load(Ordering::Relaxed),
            attempt_timeouts: self.attempt_timeouts.load(Ordering::Relaxed),
            hedges,
            hedge_wins,
            deadline_expirations: self.deadline_expirations.load(Ordering::Relaxed),
            quarantine_events: self.quarantine_events.load(Ordering::Relaxed),
            hedge_rate: ratio(hedges, invocations),
            hedge_win_rate: ratio(hedge_wins, hedges),
        }
    }
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}
