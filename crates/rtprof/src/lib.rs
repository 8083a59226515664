//! rtprof: Realtime Profiling Probes
//!
//! Low-overhead timing of named code regions on an audio render thread,
//! controlled from a command shell on another thread.
//!
//! The render thread never locks, allocates or blocks: it only touches
//! atomics in a shared [`Profiler`]. The shell side owns everything that may
//! block or fail:
//!
//! - **Lock gate**: one measurement run at a time ([`LockGate`])
//! - **Session**: start, poll until Ready or Canceled, stop ([`SessionControl`])
//! - **Reporting**: snapshot the probes and format a table ([`Report`])
//! - **Cancellation**: non-blocking operator abort ([`CancelPoller`])
//!
//! A session ends on audio time, not wall-clock time: the render thread
//! publishes its tick after each block and flips the session to Ready once
//! the end tick is reached, recording that final block first so a finished
//! session always holds data.

pub mod aggregator;
pub mod cancel;
pub mod clock;
pub mod error;
pub mod gate;
pub mod probe;
pub mod profiler;
pub mod registry;
pub mod render;
pub mod report;
pub mod session;
pub mod shell;

pub use cancel::{spawn_stdin_reader, CancelPoller, FlagCancel, LineCancel, NeverCancel};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use error::ProfileError;
pub use gate::{GateGuard, LockGate};
pub use probe::{ProbeId, ProbeSlot, ProbeSnapshot};
pub use profiler::{Instrument, NullInstrument, Profiler};
pub use registry::ProbeRegistry;
pub use render::{RenderEngine, RenderThread, MAX_VOICES};
pub use report::{format_report, LoadSummary, PrintMode, Report, ReportRow};
pub use session::{SessionControl, SessionStatus};
pub use shell::{MeasureOutcome, ProfileShell, ShellCommand, ShellFlow, ShellSettings};
