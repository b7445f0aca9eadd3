//! Background line reader.
//!
//! `ReaderTask` owns a thread that blocks on `PortSession::read_line` and
//! forwards every non-blank line to the consumer. A fatal read error lands in
//! the shared `ErrorSlot` and ends the thread; reopening is up to whoever owns
//! the session.

use crate::channel::LineSender;
use crate::error::ReadError;
use crate::session::PortSession;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// Name given to the reader thread.
pub const READER_THREAD_NAME: &str = "serial-reader";

/// A session shared between its owner and the reader thread.
///
/// The owner takes the session out on close; the reader only ever reads.
pub type SharedSession = Arc<Mutex<Option<PortSession>>>;

/// Last-write-wins holder for the most recent fatal reader error.
#[derive(Debug, Default)]
pub struct ErrorSlot {
    slot: Mutex<Option<ReadError>>,
}

impl ErrorSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `error`, replacing anything not yet taken.
    pub fn set(&self, error: ReadError) {
        *self.slot.lock() = Some(error);
    }

    /// Read and clear.
    pub fn take(&self) -> Option<ReadError> {
        self.slot.lock().take()
    }

    pub fn is_set(&self) -> bool {
        self.slot.lock().is_some()
    }
}

/// Handle to a running reader thread.
#[derive(Debug)]
pub struct ReaderTask {
    running: Arc<AtomicBool>,
    /// Disconnects when the thread exits, however it exits.
    exited: Receiver<()>,
    handle: Option<JoinHandle<()>>,
}

impl ReaderTask {
    /// Start reading from `session` on a new thread.
    pub fn spawn(
        session: SharedSession,
        lines: LineSender,
        errors: Arc<ErrorSlot>,
        timeout: Duration,
    ) -> std::io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let (exit_tx, exited) = mpsc::channel::<()>();
        let flag = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name(READER_THREAD_NAME.to_string())
            .spawn(move || {
                let _exit_tx = exit_tx;
                read_loop(&session, &lines, &errors, &flag, timeout);
            })?;

        Ok(Self {
            running,
            exited,
            handle: Some(handle),
        })
    }

    /// Whether the thread is still running.
    pub fn is_alive(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal the thread to stop and wait up to `wait` for it to exit.
    ///
    /// Returns `false` if the thread was still running when the wait ran out;
    /// it is then detached and finishes on its own.
    pub fn stop(mut self, wait: Duration) -> bool {
        self.running.store(false, Ordering::Release);

        match self.exited.recv_timeout(wait) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(handle) = self.handle.take() {
                    if handle.join().is_err() {
                        warn!("Serial reader thread panicked");
                    }
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
        }
    }
}

impl Drop for ReaderTask {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

fn read_loop(
    session: &Mutex<Option<PortSession>>,
    lines: &LineSender,
    errors: &ErrorSlot,
    running: &AtomicBool,
    timeout: Duration,
) {
    debug!("Serial reader started");

    while running.load(Ordering::Acquire) {
        let result = match session.lock().as_mut() {
            Some(session) => session.read_line(timeout),
            None => Err(ReadError::Closed),
        };

        match result {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if !lines.push(line.to_string()) {
                    debug!("Line receiver dropped, stopping reader");
                    break;
                }
            }
            Err(ReadError::Timeout(_)) => continue,
            Err(e) => {
                if running.load(Ordering::Acquire) {
                    errors.set(e);
                } else {
                    // The owner pulled the port out from under us.
                    debug!(error = %e, "Read failed during shutdown");
                }
                break;
            }
        }
    }

    debug!("Serial reader stopped");
}
