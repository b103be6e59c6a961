//! fnroute dispatch subsystem: latency-aware, hedged routing of function
//! invocations across a fixed pool of equivalent targets.
//!
//! Each target carries an EWMA latency estimate, a bounded number of
//! in-flight slots and a time-based quarantine flag. `Dispatcher::invoke`
//! ranks the healthy targets, sends the request to the best one and, if it is
//! still outstanding after the hedge delay, duplicates it to the runner-up,
//! adopting whichever succeeds first.

pub mod backend;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod ewma;
pub mod hedge;
pub mod limiter;
pub mod metrics;
pub mod quarantine;
pub mod selector;
pub mod state;
pub mod target;

#[cfg(test)]
mod test_support;

pub use backend::{Backend, HttpGateway};
pub use config::DispatcherConfig;
pub use dispatcher::Dispatcher;
pub use error::{BackendError, DispatchError, Result};
pub use ewma::LatencyEstimator;
pub use hedge::{AttemptOutcome, AttemptRole, HedgedInvoker, InvocationRecord};
pub use limiter::{ConcurrencyLimiter, SlotGuard};
pub use metrics::{DispatchMetrics, MetricsSnapshot};
pub use quarantine::QuarantineTracker;
pub use selector::CandidateSelector;
pub use state::{TargetSnapshot, TargetState};
pub use target::Target;
