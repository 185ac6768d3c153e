//! The two randomized inputs of an acquisition: the pause between attempts
//! and the client identity. Both sit behind traits so tests can pin them.

use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use rand::{Rng, seq::IndexedRandom};

/// Pause inserted before attempt `attempt` (1-based; never called for the first).
pub trait BackoffPolicy: Send + Sync {
    fn delay(&self, attempt: u32) -> Duration;
}

/// Uniformly random delay within `[min, max]`.
#[derive(Debug, Clone, Copy)]
pub struct JitterBackoff {
    min: Duration,
    max: Duration,
}

impl JitterBackoff {
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn from_millis(min_ms: u64, max_ms: u64) -> Self {
        Self::new(Duration::from_millis(min_ms), Duration::from_millis(max_ms))
    }
}

impl BackoffPolicy for JitterBackoff {
    fn delay(&self, _attempt: u32) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        rand::rng().random_range(self.min..=self.max)
    }
}

/// Zero delay, for tests and one-shot CLI runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl BackoffPolicy for NoDelay {
    fn delay(&self, _attempt: u32) -> Duration {
        Duration::ZERO
    }
}

/// Chooses the user agent for strategies without a fixed one.
pub trait IdentityPicker: Send + Sync {
    fn pick(&self, pool: &[String], attempt: u32) -> Option<String>;
}

/// Random choice from the pool on every attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdentity;

impl IdentityPicker for RandomIdentity {
    fn pick(&self, pool: &[String], _attempt: u32) -> Option<String> {
        pool.choose(&mut rand::rng()).cloned()
    }
}

/// Deterministic rotation through the pool.
#[derive(Debug, Default)]
pub struct RoundRobinIdentity {
    next: AtomicUsize,
}

impl IdentityPicker for RoundRobinIdentity {
    fn pick(&self, pool: &[String], _attempt: u32) -> Option<String> {
        if pool.is_empty() {
            return None;
        }
        let i = self.next.fetch_add(1, Ordering::Relaxed) % pool.len();
        Some(pool[i].clone())
    }
}
