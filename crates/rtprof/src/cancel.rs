//! Operator cancellation
//!
//! While measures run, the shell checks a `CancelPoller` between status
//! polls. The interactive host feeds stdin lines through an unbounded tokio
//! channel; a line read while measuring (usually just ENTER) cancels.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver};
use tracing::debug;

/// Non-blocking check for an operator cancel request.
pub trait CancelPoller {
    fn cancel_pressed(&mut self) -> bool;
}

/// Never cancels. Used for scripted runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

impl CancelPoller for NeverCancel {
    fn cancel_pressed(&mut self) -> bool {
        false
    }
}

/// Cancels once the shared flag is raised.
#[derive(Debug, Clone, Default)]
pub struct FlagCancel {
    flag: Arc<AtomicBool>,
}

impl FlagCancel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for whoever raises the flag
    pub fn handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }
}

impl CancelPoller for FlagCancel {
    fn cancel_pressed(&mut self) -> bool {
        self.flag.swap(false, Ordering::AcqRel)
    }
}

/// Cancels on an empty line, `c` or `cancel` arriving on the line channel.
///
/// Other lines typed during a measure are dropped.
#[derive(Debug)]
pub struct LineCancel<'a> {
    lines: &'a mut UnboundedReceiver<String>,
}

impl<'a> LineCancel<'a> {
    pub fn new(lines: &'a mut UnboundedReceiver<String>) -> Self {
        Self { lines }
    }
}

impl CancelPoller for LineCancel<'_> {
    fn cancel_pressed(&mut self) -> bool {
        loop {
            match self.lines.try_recv() {
                Ok(line) => match line.trim() {
                    "" | "c" | "cancel" => return true,
                    other => debug!("ignoring input while measuring: {:?}", other),
                },
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return false,
            }
        }
    }
}

/// Forward stdin lines into a channel from a dedicated reader thread.
///
/// The channel closes when stdin reaches EOF.
pub fn spawn_stdin_reader() -> std::io::Result<UnboundedReceiver<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    thread::Builder::new()
        .name("rtprof-stdin".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
            debug!("stdin reader finished");
        })?;
    Ok(rx)
}
