//! Composition root.
//!
//! [`Dispatcher`] owns the per-target state, the backend and the round-robin
//! cursor, and exposes `invoke`. It is cheap to clone; clones share state.

use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::debug;

use crate::backend::{Backend, HttpGateway};
use crate::config::DispatcherConfig;
use crate::error::Result;
use crate::hedge::{HedgedInvoker, InvocationRecord};
use crate::metrics::{DispatchMetrics, MetricsSnapshot};
use crate::selector::CandidateSelector;
use crate::state::{TargetSnapshot, TargetState};
use crate::target::Target;

/// Everything shared by concurrent invocations and their attempts.
pub(crate) struct DispatchContext {
    pub(crate) config: DispatcherConfig,
    pub(crate) pool: Vec<TargetState>,
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) metrics: DispatchMetrics,
    rr_cursor: AtomicUsize,
}

impl DispatchContext {
    /// Next target from the shared round-robin cursor. With more than one
    /// target in the pool, `exclude` is skipped.
    fn next_round_robin(&self, exclude: Option<usize>) -> usize {
        let len = self.pool.len();
        let mut idx = self.rr_cursor.fetch_add(1, Ordering::Relaxed) % len;
        for _ in 1..len {
            if Some(idx) != exclude {
                break;
            }
            idx = self.rr_cursor.fetch_add(1, Ordering::Relaxed) % len;
        }
        idx
    }

    fn index_of(&self, target: &Target) -> Option<usize> {
        self.pool.iter().position(|s| &s.target == target)
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    pub(crate) ctx: Arc<DispatchContext>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("targets", &self.ctx.config.targets)
            .field("metrics", &self.ctx.metrics.snapshot())
            .finish()
    }
}

impl Dispatcher {
    /// Builds a dispatcher that calls the configured HTTP gateway.
    pub fn new(config: DispatcherConfig) -> Result<Self> {
        config.validate()?;
        let gateway = HttpGateway::new(config.base_url(), config.request_timeout())?;
        Self::with_backend(config, Arc::new(gateway))
    }

    /// Builds a dispatcher over an arbitrary backend.
    pub fn with_backend(config: DispatcherConfig, backend: Arc<dyn Backend>) -> Result<Self> {
        config.validate()?;
        let pool = TargetState::pool(&config);
        debug!(
            targets = pool.len(),
            hedge_delay_ms = config.hedge_delay_ms,
            per_target_concurrency = config.per_target_concurrency,
            "dispatcher ready"
        );
        Ok(Self {
            ctx: Arc::new(DispatchContext {
                config,
                pool,
                backend,
                metrics: DispatchMetrics::new(),
                rr_cursor: AtomicUsize::new(0),
            }),
        })
    }

    /// Routes one payload, hedging if the primary is slow.
    ///
    /// Never fails: every failure mode is reported through the record.
    pub async fn invoke(&self, payload: Value) -> InvocationRecord {
        let started = Instant::now();
        self.ctx.metrics.inc_invocations();

        let candidates = self.pick_candidate_indices(self.ctx.config.candidate_count);
        let primary = candidates
            .first()
            .copied()
            .unwrap_or_else(|| self.ctx.next_round_robin(None));
        let backup = candidates
            .get(1)
            .copied()
            .unwrap_or_else(|| self.ctx.next_round_robin(Some(primary)));

        HedgedInvoker::new(&self.ctx)
            .invoke(payload, primary, backup, started)
            .await
    }

    /// Up to `k` targets, best first, as the next invocation would rank them.
    pub fn pick_candidates(&self, k: usize) -> Vec<Target> {
        self.pick_candidate_indices(k)
            .into_iter()
            .map(|idx| self.ctx.pool[idx].target.clone())
            .collect()
    }

    fn pick_candidate_indices(&self, k: usize) -> Vec<usize> {
        CandidateSelector::new(&self.ctx.pool).pick_candidates(k)
    }

    /// Whether `target` is currently quarantined; `None` if it is not in the pool.
    pub fn is_slow(&self, target: &Target) -> Option<bool> {
        self.ctx
            .index_of(target)
            .map(|idx| self.ctx.pool[idx].quarantine.is_slow())
    }

    pub fn latency_estimate_ms(&self, target: &Target) -> Option<f64> {
        self.ctx
            .index_of(target)
            .map(|idx| self.ctx.pool[idx].latency.value_ms())
    }

    /// Sends `payload` once to every target, one after another, to wake cold
    /// functions. Bypasses slots, estimates and quarantine. Returns how many
    /// targets answered successfully.
    pub async fn prewarm(&self, payload: &Value) -> usize {
        let timeout = self.ctx.config.prewarm_timeout();
        let mut warmed = 0;
        for state in &self.ctx.pool {
            match tokio::time::timeout(timeout, self.ctx.backend.call(&state.target, payload))
                .await
            {
                Ok(Ok(_)) => warmed += 1,
                Ok(Err(e)) => debug!(function = %state.target, error = %e, "prewarm failed"),
                Err(_) => debug!(function = %state.target, "prewarm timed out"),
            }
        }
        warmed
    }

    pub fn target_snapshots(&self) -> Vec<TargetSnapshot> {
        self.ctx.pool.iter().map(TargetState::snapshot).collect()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics.snapshot()
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.ctx.config
    }

    pub fn targets(&self) -> &[Target] {
        &self.ctx.config.targets
    }
}
