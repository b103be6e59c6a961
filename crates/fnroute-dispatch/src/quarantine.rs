//! Time-based exclusion of slow targets.
//!
//! Once a target's smoothed latency reaches the slow threshold it is excluded
//! for a fixed window. Recovery is purely a clock comparison: there is no
//! probe, and the window lifts whether or not the target actually got faster.
//! Every further slow sample re-arms the window from that moment.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
pub struct QuarantineTracker {
    slow_threshold_ms: f64,
    window: Duration,
    expiry: Mutex<Option<Instant>>,
}

impl QuarantineTracker {
    pub fn new(slow_threshold_ms: f64, window: Duration) -> Self {
        Self {
            slow_threshold_ms,
            window,
            expiry: Mutex::new(None),
        }
    }

    /// Starts (or restarts) the quarantine window if `estimate_ms` is at or
    /// above the slow threshold. Returns true when the window was armed.
    pub fn mark_slow_if_needed(&self, estimate_ms: f64) -> bool {
        if estimate_ms < self.slow_threshold_ms {
            return false;
        }
        *self.expiry.lock() = Some(Instant::now() + self.window);
        true
    }

    /// True while the current time is before the quarantine expiry.
    pub fn is_slow(&self) -> bool {
        self.is_slow_at(Instant::now())
    }

    pub fn is_slow_at(&self, now: Instant) -> bool {
        match *self.expiry.lock() {
            Some(expiry) => now < expiry,
            None => false,
        }
    }

    /// Time left in the current window, if any.
    pub fn remaining(&self) -> Option<Duration> {
        let expiry = (*self.expiry.lock())?;
        let now = Instant::now();
        (now < expiry).then(|| expiry - now)
    }

    pub fn slow_threshold_ms(&self) -> f64 {
        self.slow_threshold_ms
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}
