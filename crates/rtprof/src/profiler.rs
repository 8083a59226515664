//! The profiler: registry, session register, lock gate and clock in one place
//!
//! One `Profiler` is built at host startup and shared by `Arc` between the
//! shell (control plane) and the render thread. There is no global state;
//! everything the two sides exchange lives in this struct and is accessed
//! through atomics only.
//!
//! ```text
//!  Shell thread                 Profiler                  Render thread
//!  ────────────                 ────────                  ─────────────
//!  gate().try_lock() ───────▶  LockGate
//!  start(ms, clear) ────────▶  SessionControl ◀──────── on_block_rendered(tick)
//!  poll() ──────────────────▶    status        ◀──────── record(probe, ref, ..)
//!  report(sample_rate) ─────▶  ProbeRegistry  ◀────────┘
//! ```
//!
//! The render side goes through the [`Instrument`] trait so hosts can install
//! [`NullInstrument`] when profiling is switched off, keeping instrumented
//! call sites unconditional.

use tracing::{debug, info, warn};

use crate::aggregator;
use crate::clock::{Clock, MonotonicClock};
use crate::error::ProfileError;
use crate::gate::LockGate;
use crate::probe::ProbeId;
use crate::registry::ProbeRegistry;
use crate::report::{PrintMode, Report};
use crate::session::{SessionControl, SessionStatus};

/// Render-thread side of profiling.
///
/// Every method must be callable from a realtime thread: no locks, no
/// allocation, no blocking, no logging.
pub trait Instrument: Send + Sync {
    /// Time reference marking the start of a region.
    fn reference(&self) -> f64;

    /// Close the region that began at `reference` and return the reference
    /// for the next one.
    fn record(&self, probe: ProbeId, reference: f64, voices: u32, samples: u32) -> f64;

    /// Called once per rendered block with the tick position after the block.
    ///
    /// `reference` is the time the block started; the whole block is
    /// recorded on [`ProbeId::Write`] before the end position is checked.
    fn on_block_rendered(
        &self,
        current_tick: u64,
        reference: f64,
        voices: u32,
        samples: u32,
    ) -> f64;
}

/// Instrument that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullInstrument;

impl Instrument for NullInstrument {
    #[inline]
    fn reference(&self) -> f64 {
        0.0
    }

    #[inline]
    fn record(&self, _probe: ProbeId, reference: f64, _voices: u32, _samples: u32) -> f64 {
        reference
    }

    #[inline]
    fn on_block_rendered(
        &self,
        _current_tick: u64,
        reference: f64,
        _voices: u32,
        _samples: u32,
    ) -> f64 {
        reference
    }
}

#[derive(Debug)]
pub struct Profiler<C: Clock = MonotonicClock> {
    registry: ProbeRegistry,
    session: SessionControl,
    gate: LockGate,
    clock: C,
    sample_rate: f64,
}

impl Profiler<MonotonicClock> {
    pub fn new(sample_rate: f64) -> Self {
        Self::with_clock(sample_rate, MonotonicClock::new())
    }

    pub fn from_config(config: &rtprofconf::RenderConfig) -> Self {
        Self::new(f64::from(config.sample_rate))
    }
}

impl<C: Clock> Profiler<C> {
    pub fn with_clock(sample_rate: f64, clock: C) -> Self {
        Self {
            registry: ProbeRegistry::new(),
            session: SessionControl::new(),
            gate: LockGate::new(),
            clock,
            sample_rate,
        }
    }

    pub fn registry(&self) -> &ProbeRegistry {
        &self.registry
    }

    pub fn session(&self) -> &SessionControl {
        &self.session
    }

    pub fn gate(&self) -> &LockGate {
        &self.gate
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Convert a duration in milliseconds of audio to ticks (frames).
    pub fn ms_to_ticks(&self, duration_ms: u32) -> u64 {
        (f64::from(duration_ms) * self.sample_rate / 1000.0) as u64
    }

    /// Start a session lasting `duration_ms` of audio time.
    pub fn start(&self, duration_ms: u32, clear: bool) -> Result<(), ProfileError> {
        self.start_session(self.ms_to_ticks(duration_ms), clear)
    }

    /// Start a session ending `duration_ticks` after the last rendered block.
    ///
    /// Only valid from `Stopped`. Any other state is logged and left
    /// untouched: no probe is reset and the running session keeps its end.
    pub fn start_session(&self, duration_ticks: u64, clear: bool) -> Result<(), ProfileError> {
        if let Err(e) = self.session.ensure_stopped() {
            warn!("profiling start ignored: {}", e);
            return Err(e);
        }

        let end_ticks = self.session.current_tick().saturating_add(duration_ticks);
        if clear {
            self.registry.reset_all();
        }
        self.session.begin(end_ticks).inspect_err(|e| {
            warn!("profiling start lost a race: {}", e);
        })?;

        debug!(
            "profiling session started: {} ticks, ends at tick {}",
            duration_ticks, end_ticks
        );
        Ok(())
    }

    /// Current session state, as the shell should act on it.
    ///
    /// A pending cancel request turns a running session into `Canceled`
    /// here, on the shell's own thread, without waiting for the renderer.
    pub fn poll(&self) -> SessionStatus {
        if self.session.cancel_requested() && self.session.cancel() {
            info!("profiling session canceled by operator");
        }
        self.session.status()
    }

    pub fn request_cancel(&self) {
        self.session.request_cancel();
    }

    pub fn cancel_requested(&self) -> bool {
        self.session.cancel_requested()
    }

    /// Abandon a running session immediately.
    pub fn cancel(&self) -> bool {
        self.session.cancel()
    }

    /// Return to `Stopped`, acknowledging a finished or canceled session.
    pub fn stop(&self) -> SessionStatus {
        let previous = self.session.stop();
        debug!("profiling session stopped (was {})", previous);
        previous
    }

    /// Capture the current aggregates.
    pub fn snapshot_report(&self, sample_rate: f64) -> Report {
        Report::capture(&self.registry, sample_rate)
    }

    /// Full per-probe table at `sample_rate`.
    pub fn report(&self, sample_rate: f64) -> String {
        self.snapshot_report(sample_rate).format(PrintMode::Full)
    }

    /// Report at the profiler's own sample rate in the given layout.
    pub fn report_with(&self, mode: PrintMode) -> String {
        self.snapshot_report(self.sample_rate).format(mode)
    }

    /// Log every probe that holds data, e.g. when the host shuts down.
    pub fn log_summary(&self) {
        let report = self.snapshot_report(self.sample_rate);
        if report.is_empty() {
            debug!("no profiling data to log");
            return;
        }
        for row in report.rows() {
            info!(
                probe = %row.probe,
                count = row.snapshot.count,
                min_us = row.snapshot.min,
                avg_us = row.average(),
                max_us = row.snapshot.max,
                "profiling summary"
            );
        }
    }
}

impl<C: Clock> Instrument for Profiler<C> {
    #[inline]
    fn reference(&self) -> f64 {
        self.clock.now_micros()
    }

    /// Skips the clock read entirely unless a session is running.
    #[inline]
    fn record(&self, probe: ProbeId, reference: f64, voices: u32, samples: u32) -> f64 {
        if !self.session.is_started() {
            return reference;
        }
        aggregator::record(&self.registry, &self.clock, probe, reference, voices, samples)
    }

    #[inline]
    fn on_block_rendered(
        &self,
        current_tick: u64,
        reference: f64,
        voices: u32,
        samples: u32,
    ) -> f64 {
        self.session.publish_tick(current_tick);
        if !self.session.is_started() {
            return reference;
        }

        // Record before the end check: a session that ends on this block
        // still carries this block's sample.
        let now = aggregator::record(
            &self.registry,
            &self.clock,
            ProbeId::Write,
            reference,
            voices,
            samples,
        );
        self.session.mark_ready_if_due(current_tick);
        now
    }
}
