//! Monotonic microsecond clocks
//!
//! Probe durations are plain `f64` microseconds, so consecutive measurements
//! can chain the value returned by `record()` without re-reading the clock.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use portable_atomic::AtomicF64;

/// Source of monotonic time in microseconds.
///
/// Called on the render thread, so implementations must not block or allocate.
pub trait Clock: Send + Sync + 'static {
    fn now_micros(&self) -> f64;
}

/// Microseconds elapsed since the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_micros(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1_000_000.0
    }
}

/// Hand-driven clock for deterministic measurements
///
/// Clones share the same time, so a test can keep one handle and give the
/// other to the profiler.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<AtomicF64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(0.0)
    }

    pub fn starting_at(micros: f64) -> Self {
        Self {
            now: Arc::new(AtomicF64::new(micros)),
        }
    }

    pub fn set(&self, micros: f64) {
        self.now.store(micros, Ordering::Relaxed);
    }

    /// Move time forward and return the new value
    pub fn advance(&self, micros: f64) -> f64 {
        self.now.fetch_add(micros, Ordering::Relaxed) + micros
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now_micros(&self) -> f64 {
        self.now.load(Ordering::Relaxed)
    }
}
