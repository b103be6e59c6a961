//! Dispatcher configuration.
//!
//! Every field has a default, so a config file only needs to name what it changes.
//! Files are loaded by extension: `.toml` or `.json`.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::error::{DispatchError, Result};
use crate::target::Target;

/// Default EWMA smoothing factor.
pub const DEFAULT_ALPHA: f64 = 0.25;
/// Default wait before the backup attempt is launched.
pub const DEFAULT_HEDGE_DELAY_MS: u64 = 40;
/// Default seed for every target's latency estimate.
pub const DEFAULT_INITIAL_LATENCY_ESTIMATE_MS: f64 = 120.0;
/// Default estimate at or above which a target is quarantined.
pub const DEFAULT_SLOW_THRESHOLD_MS: f64 = 180.0;
/// Default quarantine duration.
pub const DEFAULT_QUARANTINE_WINDOW_MS: u64 = 1000;
/// Default in-flight slots per target.
pub const DEFAULT_PER_TARGET_CONCURRENCY: usize = 2;
/// Default per-attempt network timeout.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
/// Default number of ranked candidates requested per invocation.
pub const DEFAULT_CANDIDATE_COUNT: usize = 3;
/// Default timeout for each prewarm call.
pub const DEFAULT_PREWARM_TIMEOUT_MS: u64 = 5000;

const DEFAULT_POOL_SIZE: usize = 15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Base address; `/function/{target}` is appended per call.
    pub gateway_base_url: String,
    /// Fixed, ordered pool of targets.
    pub targets: Vec<Target>,
    pub alpha: f64,
    pub hedge_delay_ms: u64,
    pub initial_latency_estimate_ms: f64,
    pub slow_threshold_ms: f64,
    pub quarantine_window_ms: u64,
    pub per_target_concurrency: usize,
    pub request_timeout_ms: u64,
    pub candidate_count: usize,
    pub prewarm_timeout_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            gateway_base_url: String::from("http://127.0.0.1:8080"),
            targets: (0..DEFAULT_POOL_SIZE)
                .map(|i| Target::from(format!("func-{:02}", i)))
                .collect(),
            alpha: DEFAULT_ALPHA,
            hedge_delay_ms: DEFAULT_HEDGE_DELAY_MS,
            initial_latency_estimate_ms: DEFAULT_INITIAL_LATENCY_ESTIMATE_MS,
            slow_threshold_ms: DEFAULT_SLOW_THRESHOLD_MS,
            quarantine_window_ms: DEFAULT_QUARANTINE_WINDOW_MS,
            per_target_concurrency: DEFAULT_PER_TARGET_CONCURRENCY,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            candidate_count: DEFAULT_CANDIDATE_COUNT,
            prewarm_timeout_ms: DEFAULT_PREWARM_TIMEOUT_MS,
        }
    }
}

impl DispatcherConfig {
    /// Creates a config for the given gateway and pool, everything else defaulted.
    pub fn new<I, T>(gateway_base_url: impl Into<String>, targets: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Target>,
    {
        Self {
            gateway_base_url: gateway_base_url.into(),
            targets: targets.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        let config: DispatcherConfig = match ext.to_lowercase().as_str() {
            "toml" => {
                toml::from_str(&contents).map_err(|e| DispatchError::ConfigParse(e.to_string()))?
            }
            "json" => serde_json::from_str(&contents)
                .map_err(|e| DispatchError::ConfigParse(e.to_string()))?,
            _ => {
                return Err(DispatchError::UnsupportedConfigFormat {
                    ext: ext.to_string(),
                })
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.gateway_base_url.trim().is_empty() {
            return Err(invalid("gateway_base_url must not be empty"));
        }
        if self.targets.is_empty() {
            return Err(invalid("targets must not be empty"));
        }
        let mut seen = HashSet::with_capacity(self.targets.len());
        for target in &self.targets {
            if target.as_str().is_empty() {
                return Err(invalid("target names must not be empty"));
            }
            if !seen.insert(target) {
                return Err(invalid(format!("duplicate target {}", target)));
            }
        }
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(invalid(format!("alpha must be in (0, 1], got {}", self.alpha)));
        }
        if !self.initial_latency_estimate_ms.is_finite() || self.initial_latency_estimate_ms < 0.0
        {
            return Err(invalid(
                "initial_latency_estimate_ms must be finite and non-negative",
            ));
        }
        if !self.slow_threshold_ms.is_finite() || self.slow_threshold_ms < 0.0 {
            return Err(invalid("slow_threshold_ms must be finite and non-negative"));
        }
        if self.per_target_concurrency == 0 {
            return Err(invalid("per_target_concurrency must be at least 1"));
        }
        if self.candidate_count == 0 {
            return Err(invalid("candidate_count must be at least 1"));
        }
        Ok(())
    }

    /// Gateway base with any trailing `/` removed.
    pub fn base_url(&self) -> &str {
        self.gateway_base_url.trim_end_matches('/')
    }

    pub fn hedge_delay(&self) -> Duration {
        Duration::from_millis(self.hedge_delay_ms)
    }

    pub fn quarantine_window(&self) -> Duration {
        Duration::from_millis(self.quarantine_window_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn prewarm_timeout(&self) -> Duration {
        Duration::from_millis(self.prewarm_timeout_ms)
    }

    /// Upper bound on one `invoke`: request timeout plus hedge delay.
    pub fn invoke_deadline(&self) -> Duration {
        self.request_timeout() + self.hedge_delay()
    }
}

fn invalid(reason: impl Into<String>) -> DispatchError {
    DispatchError::InvalidConfig {
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_values() {
        let config = DispatcherConfig::default();
        assert_eq!(config.gateway_base_url, "http://127.0.0.1:8080");
        assert_eq!(config.targets.len(), 15);
        assert_eq!(config.targets[0], Target::from("func-00"));
        assert_eq!(config.targets[14], Target::from("func-14"));
        assert_eq!(config.alpha, 0.25);
        assert_eq!(config.hedge_delay_ms, 40);
        assert_eq!(config.initial_latency_estimate_ms, 120.0);
        assert_eq!(config.slow_threshold_ms, 180.0);
        assert_eq!(config.quarantine_window_ms, 1000);
        assert_eq!(config.per_target_concurrency, 2);
        assert_eq!(config.request_timeout_ms, 30_000);
        assert_eq!(config.candidate_count, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_base_url_strips_trailing_slash() {
        let config = DispatcherConfig::new("http://gw:8080//", ["a"]);
        assert_eq!(config.base_url(), "http://gw:8080");
    }

    #[test]
    fn test_invoke_deadline_is_timeout_plus_hedge() {
        let mut config = DispatcherConfig::new("http://gw", ["a"]);
        config.request_timeout_ms = 500;
        config.hedge_delay_ms = 40;
        assert_eq!(config.invoke_deadline(), Duration::from_millis(540));
    }

    #[test]
    fn test_validate_rejects_empty_pool() {
        let config = DispatcherConfig::new("http://gw", Vec::<Target>::new());
        assert!(matches!(
            config.validate(),
            Err(DispatchError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_targets() {
        let config = DispatcherConfig::new("http://gw", ["a", "b", "a"]);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate target a"));
    }

    #[test]
    fn test_validate_rejects_bad_alpha() {
        for alpha in [0.0, -0.1, 1.5, f64::NAN] {
            let mut config = DispatcherConfig::new("http://gw", ["a"]);
            config.alpha = alpha;
            assert!(config.validate().is_err(), "alpha {} accepted", alpha);
        }
        let mut config = DispatcherConfig::new("http://gw", ["a"]);
        config.alpha = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = DispatcherConfig::new("http://gw", ["a"]);
        config.per_target_concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_negative_seed() {
        let mut config = DispatcherConfig::new("http://gw", ["a"]);
        config.initial_latency_estimate_ms = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_toml_partial() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            r#"
gateway_base_url = "http://10.0.0.1:8080/"
targets = ["func-a", "func-b"]
hedge_delay_ms = 25
per_target_concurrency = 4
            "#
        )
        .unwrap();

        let config = DispatcherConfig::from_file(file.path()).unwrap();
        assert_eq!(config.base_url(), "http://10.0.0.1:8080");
        assert_eq!(
            config.targets,
            vec![Target::from("func-a"), Target::from("func-b")]
        );
        assert_eq!(config.hedge_delay_ms, 25);
        assert_eq!(config.per_target_concurrency, 4);
        assert_eq!(config.alpha, DEFAULT_ALPHA);
        assert_eq!(config.quarantine_window_ms, DEFAULT_QUARANTINE_WINDOW_MS);
    }

    #[test]
    fn test_from_file_json() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        writeln!(
            file,
            r#"{{
                "gateway_base_url": "http://gw:9000",
                "targets": ["x"],
                "alpha": 0.5,
                "slow_threshold_ms": 200.0
            }}"#
        )
        .unwrap();

        let config = DispatcherConfig::from_file(file.path()).unwrap();
        assert_eq!(config.targets, vec![Target::from("x")]);
        assert_eq!(config.alpha, 0.5);
        assert_eq!(config.slow_threshold_ms, 200.0);
    }

    #[test]
    fn test_from_file_rejects_invalid_contents() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(file, "targets = []").unwrap();
        assert!(matches!(
            DispatcherConfig::from_file(file.path()),
            Err(DispatchError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_from_file_unsupported_extension() {
        let file = NamedTempFile::with_suffix(".yaml").unwrap();
        assert!(matches!(
            DispatcherConfig::from_file(file.path()),
            Err(DispatchError::UnsupportedConfigFormat { .. })
        ));
    }
}
