//! Time sources for conflict windows and claim lifetimes.
//!
//! Ages are measured in milliseconds from an arbitrary, process-local origin.
//! Timestamps never leave the node, so wall-clock synchronization between
//! nodes does not matter here.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Millisecond timestamp relative to the clock's origin.
pub type Millis = u64;

/// Monotonic time source.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current time in milliseconds since the clock's origin.
    fn now_millis(&self) -> Millis;
}

/// Elapsed time between two readings, saturating at zero.
#[inline]
pub fn age(now: Millis, then: Millis) -> Duration {
    Duration::from_millis(now.saturating_sub(then))
}

/// Production clock backed by [`Instant`].
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> Millis {
        self.origin.elapsed().as_millis() as Millis
    }
}

/// Manually advanced clock for tests.
///
/// Clones share the same reading, so a test can keep one handle and give
/// another to the coordinator.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock starting at `start` milliseconds.
    pub fn new(start: Millis) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        self.now
            .fetch_add(by.as_millis() as Millis, Ordering::SeqCst);
    }

    /// Jump to an absolute reading.
    pub fn set(&self, millis: Millis) {
        self.now.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> Millis {
        self.now.load(Ordering::SeqCst)
    }
}
