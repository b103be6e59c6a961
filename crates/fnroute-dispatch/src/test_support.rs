//! In-memory backend with scripted per-target behavior.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

use crate::backend::Backend;
use crate::error::BackendError;
use crate::target::Target;

#[derive(Debug, Default, Clone)]
struct Script {
    delay: Duration,
    failing: bool,
}

#[derive(Debug, Default)]
struct Counters {
    calls: u64,
    in_flight: usize,
    peak_in_flight: usize,
}

/// Replies `{"target": .., "echo": payload}` after the scripted delay, or
/// fails with a 500 after the delay when marked failing.
#[derive(Debug, Default)]
pub(crate) struct ScriptedBackend {
    scripts: Mutex<HashMap<String, Script>>,
    counters: Mutex<HashMap<String, Counters>>,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_delay(&self, target: &str, delay: Duration) {
        self.scripts.lock().entry(target.to_string()).or_default().delay = delay;
    }

    pub(crate) fn set_failing(&self, target: &str) {
        self.scripts.lock().entry(target.to_string()).or_default().failing = true;
    }

    pub(crate) fn calls(&self, target: &Target) -> u64 {
        self.counters
            .lock()
            .get(target.as_str())
            .map(|c| c.calls)
            .unwrap_or(0)
    }

    pub(crate) fn total_calls(&self) -> u64 {
        self.counters.lock().values().map(|c| c.calls).sum()
    }

    pub(crate) fn peak_in_flight(&self, target: &Target) -> usize {
        self.counters
            .lock()
            .get(target.as_str())
            .map(|c| c.peak_in_flight)
            .unwrap_or(0)
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn call(&self, target: &Target, payload: &Value) -> Result<Value, BackendError> {
        let script = self
            .scripts
            .lock()
            .get(target.as_str())
            .cloned()
            .unwrap_or_default();
        {
            let mut counters = self.counters.lock();
            let c = counters.entry(target.to_string()).or_default();
            c.calls += 1;
            c.in_flight += 1;
            c.peak_in_flight = c.peak_in_flight.max(c.in_flight);
        }

        if !script.delay.is_zero() {
            tokio::time::sleep(script.delay).await;
        }

        if let Some(c) = self.counters.lock().get_mut(target.as_str()) {
            c.in_flight -= 1;
        }

        if script.failing {
            Err(BackendError::BadStatus {
                target: target.to_string(),
                status: 500,
            })
        } else {
            Ok(json!({ "target": target.as_str(), "echo": payload }))
        }
    }
}
