//! Errors surfaced to the control side.
//!
//! Nothing here ever crosses into the render thread: audio-side operations
//! are infallible and simply do nothing when the session is not running.

use crate::session::SessionStatus;

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("profiling busy: another measurement session holds the lock gate")]
    SessionAlreadyActive,

    #[error("invalid session transition from {from} to {to}")]
    InvalidStateTransition {
        from: SessionStatus,
        to: SessionStatus,
    },

    #[error("no profiling data available")]
    NoDataAvailable,

    #[error("profiling is disabled")]
    Disabled,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("report output failed: {0}")]
    Io(#[from] std::io::Error),
}
