//! Smoothed per-target latency.
//!
//! Each target carries one exponentially weighted moving average of its
//! round-trip time. Every finished attempt, successful or not, is folded in:
//!
//! ```text
//! v <- alpha * x + (1 - alpha) * v
//! ```
//!
//! The result depends on the order samples arrive in. Concurrent updates are
//! serialized by a per-estimator lock, nothing more.

use parking_lot::Mutex;
use std::time::Duration;

/// EWMA of one target's observed latency, in milliseconds.
#[derive(Debug)]
pub struct LatencyEstimator {
    alpha: f64,
    value_ms: Mutex<f64>,
}

impl LatencyEstimator {
    /// Creates an estimator seeded with `initial_ms`.
    ///
    /// `alpha` must lie in `(0, 1]`; the config layer enforces this.
    pub fn new(alpha: f64, initial_ms: f64) -> Self {
        Self {
            alpha,
            value_ms: Mutex::new(initial_ms.max(0.0)),
        }
    }

    /// Folds one measured duration into the estimate.
    pub fn update(&self, sample: Duration) {
        self.update_ms(sample.as_secs_f64() * 1000.0);
    }

    /// Folds one sample given in milliseconds. Negative samples count as zero,
    /// non-finite ones are dropped.
    pub fn update_ms(&self, sample_ms: f64) {
        if !sample_ms.is_finite() {
            return;
        }
        let x = sample_ms.max(0.0);
        let mut v = self.value_ms.lock();
        *v = self.alpha * x + (1.0 - self.alpha) * *v;
    }

    /// Current smoothed estimate in milliseconds.
    pub fn value_ms(&self) -> f64 {
        *self.value_ms.lock()
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    #[test]
    fn test_seeded_value() {
        let est = LatencyEstimator::new(0.25, 120.0);
        assert_eq!(est.value_ms(), 120.0);
        assert_eq!(est.alpha(), 0.25);
    }

    #[test]
    fn test_ewma_sequence_is_exact() {
        let est = LatencyEstimator::new(0.25, 120.0);
        est.update_ms(60.0);
        assert_eq!(est.value_ms(), 105.0);
        est.update_ms(60.0);
        assert_eq!(est.value_ms(), 93.75);
        est.update_ms(60.0);
        assert_eq!(est.value_ms(), 85.3125);
    }

    #[test]
    fn test_update_from_duration() {
        let est = LatencyEstimator::new(0.5, 100.0);
        est.update(Duration::from_millis(300));
        assert!((est.value_ms() - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_alpha_one_tracks_last_sample() {
        let est = LatencyEstimator::new(1.0, 120.0);
        est.update_ms(7.0);
        assert_eq!(est.value_ms(), 7.0);
        est.update_ms(900.0);
        assert_eq!(est.value_ms(), 900.0);
    }

    #[test]
    fn test_negative_and_nan_samples_never_go_negative() {
        let est = LatencyEstimator::new(0.5, 10.0);
        est.update_ms(-50.0);
        assert_eq!(est.value_ms(), 5.0);
        est.update_ms(f64::NAN);
        assert_eq!(est.value_ms(), 5.0);
    }

    #[test]
    fn test_concurrent_updates_stay_bounded() {
        let est = Arc::new(LatencyEstimator::new(0.25, 120.0));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let est = Arc::clone(&est);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        est.update_ms(if i % 2 == 0 { 50.0 } else { 150.0 });
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let v = est.value_ms();
        assert!((50.0..=150.0).contains(&v), "estimate {} out of range", v);
    }

    proptest! {
        #[test]
        fn prop_estimate_stays_within_sample_range(
            alpha in 0.01f64..=1.0,
            init in 0.0f64..10_000.0,
            samples in proptest::collection::vec(0.0f64..10_000.0, 1..64),
        ) {
            let est = LatencyEstimator::new(alpha, init);
            let mut lo = init;
            let mut hi = init;
            for s in &samples {
                est.update_ms(*s);
                lo = lo.min(*s);
                hi = hi.max(*s);
            }
            let v = est.value_ms();
            prop_assert!(v >= 0.0);
            prop_assert!(v >= lo - 1e-6 && v <= hi + 1e-6);
        }
    }
}
