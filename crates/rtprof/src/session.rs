//! Session control: the shared command/status register
//!
//! ```text
//!            begin()               tick >= end_ticks
//!  Stopped ──────────▶ Started ──────────────────▶ Ready
//!     ▲                   │                          │
//!     │                   │ cancel()                 │
//!     │                   ▼                          │
//!     ├──── stop() ─── Canceled                      │
//!     └──────────────── stop() ──────────────────────┘
//! ```
//!
//! Shell-side writers publish with `Release`; the render thread reads the
//! status with `Acquire` once per block, which makes the probe resets and
//! `end_ticks` written before `begin()` visible before it records anything.
//! The render thread only ever moves `Started -> Ready`, via compare-and-swap,
//! so it can never clobber a concurrent cancel.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};

use crate::error::ProfileError;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    /// No measurement running
    Stopped = 0,
    /// Render thread is recording
    Started = 1,
    /// End position reached, data can be reported
    Ready = 2,
    /// Abandoned by the operator before reaching Ready
    Canceled = 3,
}

impl SessionStatus {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => SessionStatus::Started,
            2 => SessionStatus::Ready,
            3 => SessionStatus::Canceled,
            _ => SessionStatus::Stopped,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionStatus::Stopped => "stopped",
            SessionStatus::Started => "started",
            SessionStatus::Ready => "ready",
            SessionStatus::Canceled => "canceled",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct SessionControl {
    status: AtomicU8,
    end_ticks: AtomicU64,
    /// Latest tick published by the render thread
    current_tick: AtomicU64,
    cancel_requested: AtomicBool,
}

impl SessionControl {
    pub fn new() -> Self {
        Self {
            status: AtomicU8::new(SessionStatus::Stopped as u8),
            end_ticks: AtomicU64::new(0),
            current_tick: AtomicU64::new(0),
            cancel_requested: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn status(&self) -> SessionStatus {
        SessionStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_started(&self) -> bool {
        self.status() == SessionStatus::Started
    }

    /// Precondition check for `begin`, done before any probe is touched.
    pub fn ensure_stopped(&self) -> Result<(), ProfileError> {
        match self.status() {
            SessionStatus::Stopped => Ok(()),
            from => Err(ProfileError::InvalidStateTransition {
                from,
                to: SessionStatus::Started,
            }),
        }
    }

    /// Arm the end position and move `Stopped -> Started`.
    pub fn begin(&self, end_ticks: u64) -> Result<(), ProfileError> {
        self.ensure_stopped()?;
        self.end_ticks.store(end_ticks, Ordering::Relaxed);
        self.cancel_requested.store(false, Ordering::Relaxed);
        self.status
            .compare_exchange(
                SessionStatus::Stopped as u8,
                SessionStatus::Started as u8,
                Ordering::Release,
                Ordering::Relaxed,
            )
            .map(|_| ())
            .map_err(|raw| ProfileError::InvalidStateTransition {
                from: SessionStatus::from_u8(raw),
                to: SessionStatus::Started,
            })
    }

    /// Render-side end check. Returns true when this call completed the session.
    #[inline]
    pub fn mark_ready_if_due(&self, current_tick: u64) -> bool {
        if current_tick < self.end_ticks.load(Ordering::Relaxed) {
            return false;
        }
        self.status
            .compare_exchange(
                SessionStatus::Started as u8,
                SessionStatus::Ready as u8,
                Ordering::Release,
                Ordering::Relaxed,
            )
            .is_ok()
    }

    /// `Started -> Canceled`. False if the session was not running.
    pub fn cancel(&self) -> bool {
        self.status
            .compare_exchange(
                SessionStatus::Started as u8,
                SessionStatus::Canceled as u8,
                Ordering::Release,
                Ordering::Relaxed,
            )
            .is_ok()
    }

    /// Force `Stopped` from any state, returning the previous state.
    ///
    /// Used both to abort a running session and to acknowledge a
    /// reported (`Ready`) or abandoned (`Canceled`) one.
    pub fn stop(&self) -> SessionStatus {
        self.cancel_requested.store(false, Ordering::Relaxed);
        SessionStatus::from_u8(
            self.status
                .swap(SessionStatus::Stopped as u8, Ordering::Release),
        )
    }

    pub fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::Release);
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::Acquire)
    }

    #[inline]
    pub fn publish_tick(&self, tick: u64) {
        self.current_tick.store(tick, Ordering::Relaxed);
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick.load(Ordering::Relaxed)
    }

    pub fn end_ticks(&self) -> u64 {
        self.end_ticks.load(Ordering::Relaxed)
    }

    /// Ticks left before the running session ends (0 once due)
    pub fn remaining_ticks(&self) -> u64 {
        self.end_ticks().saturating_sub(self.current_tick())
    }
}

impl Default for SessionControl {
    fn default() -> Self {
        Self::new()
    }
}
