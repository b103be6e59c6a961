//! Speculative request hedging.
//!
//! An invocation starts one attempt against its primary target. If that
//! attempt has not settled within the hedge delay, a duplicate attempt is sent
//! to the backup target and the two race. The first successful response is
//! adopted.
//!
//! The losing attempt is never cancelled. It keeps its concurrency slot until
//! it finishes or times out, and its duration still feeds the target's latency
//! estimate and quarantine check; only its result is thrown away.

use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::dispatcher::DispatchContext;
use crate::error::BackendError;
use crate::target::Target;

/// Which leg of a hedged invocation an attempt belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptRole {
    Primary,
    Backup,
}

/// Result of one attempt against one target.
#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    pub role: AttemptRole,
    pub target: Target,
    pub success: bool,
    /// Parsed response body; an empty object when the attempt failed.
    pub response: Value,
    /// Wall time of the remote call, in milliseconds.
    pub elapsed_ms: f64,
    pub error: Option<BackendError>,
}

impl AttemptOutcome {
    fn succeeded(role: AttemptRole, target: Target, response: Value, elapsed_ms: f64) -> Self {
        Self {
            role,
            target,
            success: true,
            response,
            elapsed_ms,
            error: None,
        }
    }

    fn failed(
        role: AttemptRole,
        target: Target,
        error: Option<BackendError>,
        elapsed_ms: f64,
    ) -> Self {
        Self {
            role,
            target,
            success: false,
            response: empty_response(),
            elapsed_ms,
            error,
        }
    }
}

/// What `invoke` hands back to its caller.
#[derive(Debug, Clone, Serialize)]
pub struct InvocationRecord {
    pub success: bool,
    /// Adopted response body; an empty object on failure.
    pub response: Value,
    /// Duration of the adopted attempt's remote call.
    pub elapsed_ms: f64,
    /// Target whose result was adopted.
    pub target: Target,
    pub payload: Value,
    pub primary: Target,
    /// Set only when the hedge fired.
    pub backup: Option<Target>,
    pub hedged: bool,
    /// Wall time of the whole invocation, hedge wait included.
    pub total_ms: f64,
}

impl InvocationRecord {
    /// `(success, response, elapsed_ms, target_used)`
    pub fn into_tuple(self) -> (bool, Value, f64, Target) {
        (self.success, self.response, self.elapsed_ms, self.target)
    }
}

pub(crate) fn empty_response() -> Value {
    Value::Object(Map::new())
}

fn millis_since(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Runs one attempt: take a slot, call the backend under the request
/// timeout, give the slot back, then record the duration.
///
/// Never fails; every error becomes an unsuccessful outcome.
pub(crate) async fn run_attempt(
    ctx: Arc<DispatchContext>,
    idx: usize,
    role: AttemptRole,
    payload: Arc<Value>,
) -> AttemptOutcome {
    let state = &ctx.pool[idx];
    let target = state.target.clone();
    ctx.metrics.inc_attempts();

    let slot = state.slots.acquire().await;
    let started = Instant::now();
    let timeout = ctx.config.request_timeout();
    let result = match tokio::time::timeout(timeout, ctx.backend.call(&target, &payload)).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout {
            target: target.to_string(),
            timeout_ms: ctx.config.request_timeout_ms,
        }),
    };
    drop(slot);
    let elapsed_ms = millis_since(started);

    if state.record_latency_ms(elapsed_ms) {
        ctx.metrics.inc_quarantine_events();
        info!(
            function = %target,
            estimate_ms = state.latency.value_ms(),
            window_ms = ctx.config.quarantine_window_ms,
            "target quarantined"
        );
    }

    match result {
        Ok(response) => {
            debug!(function = %target, ?role, elapsed_ms, "attempt succeeded");
            AttemptOutcome::succeeded(role, target, response, elapsed_ms)
        }
        Err(e) => {
            ctx.metrics.inc_attempt_failures();
            if matches!(e, BackendError::Timeout { .. }) {
                ctx.metrics.inc_attempt_timeouts();
            }
            debug!(
                function = %target,
                ?role,
                elapsed_ms,
                kind = e.kind(),
                error = %e,
                "attempt failed"
            );
            AttemptOutcome::failed(role, target, Some(e), elapsed_ms)
        }
    }
}

fn spawn_attempt(
    ctx: &Arc<DispatchContext>,
    idx: usize,
    role: AttemptRole,
    payload: &Arc<Value>,
    tx: mpsc::Sender<AttemptOutcome>,
) {
    let ctx = Arc::clone(ctx);
    let payload = Arc::clone(payload);
    tokio::spawn(async move {
        let outcome = run_attempt(ctx, idx, role, payload).await;
        // The invocation may already have adopted the other attempt.
        let _ = tx.send(outcome).await;
    });
}

/// Races a primary attempt and, after the hedge delay, a backup attempt.
pub struct HedgedInvoker<'a> {
    ctx: &'a Arc<DispatchContext>,
}

impl<'a> HedgedInvoker<'a> {
    pub(crate) fn new(ctx: &'a Arc<DispatchContext>) -> Self {
        Self { ctx }
    }

    /// Runs the hedge protocol for one payload. `started` is when the
    /// invocation began; the whole call is bounded by request timeout plus
    /// hedge delay measured from it.
    pub(crate) async fn invoke(
        &self,
        payload: Value,
        primary: usize,
        backup: usize,
        started: Instant,
    ) -> InvocationRecord {
        let payload = Arc::new(payload);
        let primary_target = self.ctx.pool[primary].target.clone();
        let backup_target = self.ctx.pool[backup].target.clone();

        let (tx, mut rx) = mpsc::channel(2);
        spawn_attempt(self.ctx, primary, AttemptRole::Primary, &payload, tx.clone());

        if let Ok(Some(outcome)) =
            tokio::time::timeout(self.ctx.config.hedge_delay(), rx.recv()).await
        {
            return self.finish(outcome, &payload, primary_target, None, started);
        }

        self.ctx.metrics.inc_hedges();
        debug!(
            primary = %primary_target,
            backup = %backup_target,
            hedge_delay_ms = self.ctx.config.hedge_delay_ms,
            "primary still outstanding, hedging"
        );
        spawn_attempt(self.ctx, backup, AttemptRole::Backup, &payload, tx);

        let expiry = tokio::time::sleep_until(started + self.ctx.config.invoke_deadline());
        tokio::pin!(expiry);

        let mut primary_failure = None;
        let mut backup_failure = None;
        loop {
            tokio::select! {
                biased;
                received = rx.recv() => match received {
                    Some(outcome) if outcome.success => {
                        return self.finish(
                            outcome,
                            &payload,
                            primary_target,
                            Some(backup_target),
                            started,
                        );
                    }
                    Some(outcome) => match outcome.role {
                        AttemptRole::Primary => primary_failure = Some(outcome),
                        AttemptRole::Backup => backup_failure = Some(outcome),
                    },
                    // Both attempts settled.
                    None => break,
                },
                _ = &mut expiry => {
                    self.ctx.metrics.inc_deadline_expirations();
                    warn!(
                        primary = %primary_target,
                        backup = %backup_target,
                        deadline_ms = self.ctx.config.invoke_deadline().as_millis() as u64,
                        "invocation deadline expired before a successful attempt"
                    );
                    break;
                }
            }
        }

        let outcome = primary_failure.or(backup_failure).unwrap_or_else(|| {
            AttemptOutcome::failed(
                AttemptRole::Primary,
                primary_target.clone(),
                None,
                millis_since(started),
            )
        });
        self.finish(outcome, &payload, primary_target, Some(backup_target), started)
    }

    fn finish(
        &self,
        outcome: AttemptOutcome,
        payload: &Arc<Value>,
        primary: Target,
        backup: Option<Target>,
        started: Instant,
    ) -> InvocationRecord {
        if outcome.success {
            self.ctx.metrics.inc_invocation_successes();
            if outcome.role == AttemptRole::Backup {
                self.ctx.metrics.inc_hedge_wins();
            }
        }
        let hedged = backup.is_some();
        if hedged {
            debug!(
                function = %outcome.target,
                role = ?outcome.role,
                success = outcome.success,
                "hedge race settled"
            );
        }
        InvocationRecord {
            success: outcome.success,
            response: outcome.response,
            elapsed_ms: outcome.elapsed_ms,
            target: outcome.target,
            payload: payload.as_ref().clone(),
            primary,
            backup,
            hedged,
            total_ms: millis_since(started),
        }
    }
}
