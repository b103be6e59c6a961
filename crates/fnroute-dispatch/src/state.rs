//! Live state kept for each target in the pool.

use serde::Serialize;

use crate::config::DispatcherConfig;
use crate::ewma::LatencyEstimator;
use crate::limiter::ConcurrencyLimiter;
use crate::quarantine::QuarantineTracker;
use crate::target::Target;

/// Estimator, slot counter and quarantine flag of one target.
///
/// Each piece locks independently, so traffic to one target never
/// contends with traffic to another.
#[derive(Debug)]
pub struct TargetState {
    pub target: Target,
    pub latency: LatencyEstimator,
    pub slots: ConcurrencyLimiter,
    pub quarantine: QuarantineTracker,
}

/// Point-in-time view of a target, for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetSnapshot {
    pub target: Target,
    pub latency_estimate_ms: f64,
    pub quarantined: bool,
    pub in_flight: usize,
    pub capacity: usize,
}

impl TargetState {
    pub fn new(target: Target, config: &DispatcherConfig) -> Self {
        Self {
            target,
            latency: LatencyEstimator::new(config.alpha, config.initial_latency_estimate_ms),
            slots: ConcurrencyLimiter::new(config.per_target_concurrency),
            quarantine: QuarantineTracker::new(
                config.slow_threshold_ms,
                config.quarantine_window(),
            ),
        }
    }

    /// Builds state for every configured target, in pool order.
    pub fn pool(config: &DispatcherConfig) -> Vec<TargetState> {
        config
            .targets
            .iter()
            .cloned()
            .map(|t| TargetState::new(t, config))
            .collect()
    }

    /// Folds a finished attempt's duration into the estimate, then re-checks
    /// the quarantine threshold. Returns true if the target was (re)quarantined.
    pub fn record_latency_ms(&self, elapsed_ms: f64) -> bool {
        self.latency.update_ms(elapsed_ms);
        self.quarantine.mark_slow_if_needed(self.latency.value_ms())
    }

    pub fn snapshot(&self) -> TargetSnapshot {
        TargetSnapshot {
            target: self.target.clone(),
            latency_estimate_ms: self.latency.value_ms(),
            quarantined: self.quarantine.is_slow(),
            in_flight: self.slots.in_flight(),
            capacity: self.slots.capacity(),
        }
    }
}
