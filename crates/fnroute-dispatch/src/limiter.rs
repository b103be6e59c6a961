//! Per-target in-flight cap.
//!
//! A counting semaphore with a fixed capacity. `acquire` waits until a slot is
//! free; the returned guard hands the slot back when dropped, so the release
//! runs on every exit path of an attempt.
//!
//! There is no acquire timeout. If a remote call never finishes, its slot is
//! held until the per-call timeout fires; callers that need a hard bound must
//! wrap the whole operation in their own deadline.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug)]
pub struct ConcurrencyLimiter {
    capacity: usize,
    slots: Arc<Semaphore>,
}

/// One held slot. Dropping it releases the slot and wakes one waiter.
#[derive(Debug)]
pub struct SlotGuard {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyLimiter {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: Arc::new(Semaphore::new(capacity)),
        }
    }

    /// Waits for a free slot and takes it.
    pub async fn acquire(&self) -> SlotGuard {
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .expect("limiter semaphore is never closed");
        SlotGuard { _permit: permit }
    }

    /// Takes a slot only if one is free right now.
    pub fn try_acquire(&self) -> Option<SlotGuard> {
        Arc::clone(&self.slots)
            .try_acquire_owned()
            .ok()
            .map(|permit| SlotGuard { _permit: permit })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    pub fn in_flight(&self) -> usize {
        self.capacity.saturating_sub(self.available())
    }
}
