//! Farecast Query Queues
//! Copyright (c) 2026 Mamy Ratsimbazafy
//! Licensed and distributed under either of
//!   * MIT license (license terms at the root of the package or at http://opensource.org/licenses/MIT).
//!   * Apache v2 license (license terms at the root of the package or at http://www.apache.org/licenses/LICENSE-2.0).
//! at your option. This file may not be copied, modified, or distributed except according to those terms.

//! farecast-internals/query-queues
//! Building blocks for polite access to an external service:
//! a concurrency limiter, exponential backoff with jitter,
//! and a per-key gate enforcing a minimum spacing between dispatches.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::{self, Instant};

/// Custom error for the work queue
#[derive(Debug, Error)]
pub enum QueryQueueError {
    #[error("queue is closed")]
    QueueClosed,
}

/// Limits the number of operations in flight against an external service.
///
/// Permits are owned so they can travel into spawned tasks.
///
/// # Examples
///
/// ```ignore
/// let queue = QueryQueue::with_concurrency_limit(4);
/// let _permit = queue.acquire().await?;
/// ```
#[derive(Clone, Debug)]
pub struct QueryQueue {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl Default for QueryQueue {
    fn default() -> Self {
        Self::with_concurrency_limit(4)
    }
}

impl QueryQueue {
    /// Create a new work queue with max concurrent operations (at least one)
    pub fn with_concurrency_limit(max_concurrent: u64) -> Self {
        let capacity = max_concurrent.max(1) as usize;
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Wait for a free slot.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, QueryQueueError> {
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| QueryQueueError::QueueClosed)
    }

    /// Stop handing out permits. Pending and future `acquire` calls fail.
    pub fn close(&self) {
        self.semaphore.close();
    }
}

/// Exponential backoff with additive jitter.
///
/// The delay before retry `n` (1-based) is `initial_delay * 2^(n-1)`,
/// capped at `max_delay`, plus a random jitter in `[0, jitter_factor * delay]`.
/// Jitter never shortens the base delay.
#[derive(Clone, Debug)]
pub struct Backoff {
    initial_delay: Duration,
    max_delay: Duration,
    jitter_factor: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(30000),
            jitter_factor: 0.5,
        }
    }
}

impl Backoff {
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay: max_delay.max(initial_delay),
            ..Default::default()
        }
    }

    pub fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor.clamp(0.0, 1.0);
        self
    }

    /// Base delay before retry number `retry` (1-based), without jitter.
    pub fn base_delay(&self, retry: u32) -> Duration {
        if retry <= 1 {
            return self.initial_delay.min(self.max_delay);
        }
        let factor = 2u32.saturating_pow(retry - 1);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Delay before retry number `retry` (1-based), with jitter applied.
    pub fn delay(&self, retry: u32) -> Duration {
        self.apply_jitter(self.base_delay(retry))
    }

    /// Apply jitter to the delay
    fn apply_jitter(&self, delay: Duration) -> Duration {
        if self.jitter_factor == 0.0 {
            return delay;
        }

        let jitter_ms = (delay.as_millis() as f64 * self.jitter_factor) as u64;
        let rand_jitter = rand::thread_rng().gen_range(0..=jitter_ms);

        delay + Duration::from_millis(rand_jitter)
    }
}

/// Enforces a minimum spacing between dispatches sharing the same key,
/// independently of how many callers run concurrently.
///
/// Slots are reserved under a single lock, so two callers can never observe
/// and update the same last-dispatch timestamp at once. The lock is released
/// before sleeping.
#[derive(Debug)]
pub struct DispatchGate<K> {
    spacing: Duration,
    next_slot: Mutex<HashMap<K, Instant>>,
}

impl<K: Eq + Hash + Clone> DispatchGate<K> {
    pub fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    pub fn spacing(&self) -> Duration {
        self.spacing
    }

    /// Reserve the next dispatch slot for `key` and return when it is due.
    pub async fn reserve(&self, key: &K) -> Instant {
        let mut slots = self.next_slot.lock().await;
        let now = Instant::now();
        let due = match slots.get(key) {
            Some(&next) if next > now => next,
            _ => now,
        };
        slots.insert(key.clone(), due + self.spacing);
        due
    }

    /// Wait until `key` may be dispatched again.
    pub async fn wait_turn(&self, key: &K) {
        if self.spacing.is_zero() {
            return;
        }
        let due = self.reserve(key).await;
        time::sleep_until(due).await;
    }
}
