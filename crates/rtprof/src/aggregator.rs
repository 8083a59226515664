//! Measurement aggregator
//!
//! Turns "a region that started at `reference`" into one observation on a
//! probe. Runs inside the render path: one clock read, one slot update.

use crate::clock::Clock;
use crate::probe::ProbeId;
use crate::registry::ProbeRegistry;

/// Record `now - reference` on `probe` and return `now`.
///
/// The returned time is the reference for the next region, so back-to-back
/// regions are measured with a single clock read each.
#[inline]
pub fn record<C: Clock + ?Sized>(
    registry: &ProbeRegistry,
    clock: &C,
    probe: ProbeId,
    reference: f64,
    voices: u32,
    samples: u32,
) -> f64 {
    let now = clock.now_micros();
    registry.slot(probe).observe(now - reference, voices, samples);
    now
}
