//! Ranking of targets for one invocation.
//!
//! Targets under quarantine are filtered out and the rest are ordered by their
//! current latency estimate, lowest first, ties kept in pool order. If every
//! target is quarantined the whole pool is ranked instead, so quarantine alone
//! can never leave an invocation with nowhere to go.
//!
//! Nothing is cached; each call reads the live state.

use tokio::time::Instant;

use crate::state::TargetState;

pub struct CandidateSelector<'a> {
    pool: &'a [TargetState],
}

impl<'a> CandidateSelector<'a> {
    pub fn new(pool: &'a [TargetState]) -> Self {
        Self { pool }
    }

    /// Returns up to `k` pool indices, best first.
    pub fn pick_candidates(&self, k: usize) -> Vec<usize> {
        let now = Instant::now();

        let mut ranked: Vec<(usize, f64)> = self
            .pool
            .iter()
            .enumerate()
            .filter(|(_, state)| !state.quarantine.is_slow_at(now))
            .map(|(idx, state)| (idx, state.latency.value_ms()))
            .collect();

        if ranked.is_empty() {
            ranked = self
                .pool
                .iter()
                .enumerate()
                .map(|(idx, state)| (idx, state.latency.value_ms()))
                .collect();
        }

        // Stable sort keeps pool order between equal estimates.
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
        ranked.into_iter().take(k).map(|(idx, _)| idx).collect()
    }
}
