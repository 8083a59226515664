//! Lock gate: at most one measurement session at a time
//!
//! A single compare-and-swap, never a blocking lock, so a second shell gets
//! an immediate "busy" answer instead of queueing behind the first.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::ProfileError;

#[derive(Debug, Default)]
pub struct LockGate {
    held: AtomicBool,
}

impl LockGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the gate. False when another session already holds it.
    pub fn try_acquire(&self) -> bool {
        self.held
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    pub fn release(&self) {
        self.held.store(false, Ordering::Release);
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Relaxed)
    }

    /// Take the gate for the lifetime of the returned guard.
    pub fn try_lock(&self) -> Result<GateGuard<'_>, ProfileError> {
        if self.try_acquire() {
            Ok(GateGuard { gate: self })
        } else {
            Err(ProfileError::SessionAlreadyActive)
        }
    }
}

/// Releases the gate on drop
#[derive(Debug)]
pub struct GateGuard<'a> {
    gate: &'a LockGate,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}
