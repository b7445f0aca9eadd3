//! Session lifecycle and the consumer-facing poll.
//!
//! ```text
//! Closed --open()--> Opening --ok--> Streaming --close()--> Closing --> Closed
//!                       \--err--> Closed
//! ```
//!
//! `SessionController` is the only owner of the port session and the line
//! queue. The host loop calls [`SessionController::poll`] once per tick; it
//! never blocks.

use crate::channel::{line_channel, LineReceiver};
use crate::error::{BridgeError, BridgeResult, ReadError};
use crate::port::{PortBackend, PortConfig, PortDetector, SystemBackend};
use crate::reader::{ErrorSlot, ReaderTask, SharedSession};
use crate::record::{self, Record};
use crate::session::PortSession;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long `close()` waits for the reader, and then for the port.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Lifecycle state of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Closed,
    Opening,
    Streaming,
    Closing,
}

/// What one `poll()` produced.
#[derive(Debug, Default)]
pub struct PollOutcome {
    /// The current record after this drain.
    pub record: Option<Record>,
    /// Whether this drain replaced the record.
    pub updated: bool,
    /// A fatal reader error, reported once.
    pub error: Option<ReadError>,
}

/// Owns one serial session at a time and hands its latest record to a
/// polling consumer.
pub struct SessionController<B: PortBackend = SystemBackend> {
    config: PortConfig,
    backend: B,
    detector: PortDetector,
    join_timeout: Duration,
    state: SessionState,
    session: Option<SharedSession>,
    reader: Option<ReaderTask>,
    lines: Option<LineReceiver>,
    errors: Arc<ErrorSlot>,
    current: Option<Record>,
    port_name: Option<String>,
}

impl SessionController<SystemBackend> {
    /// Controller for real serial ports.
    pub fn new(config: PortConfig) -> Self {
        Self::with_backend(config, SystemBackend)
    }
}

impl<B: PortBackend> SessionController<B> {
    /// Controller using a custom backend.
    pub fn with_backend(config: PortConfig, backend: B) -> Self {
        Self {
            config,
            backend,
            detector: PortDetector::default(),
            join_timeout: DEFAULT_JOIN_TIMEOUT,
            state: SessionState::Closed,
            session: None,
            reader: None,
            lines: None,
            errors: Arc::new(ErrorSlot::new()),
            current: None,
            port_name: None,
        }
    }

    /// Replace the port detector.
    pub fn with_detector(mut self, detector: PortDetector) -> Self {
        self.detector = detector;
        self
    }

    /// Replace the bound on how long `close()` waits.
    pub fn with_join_timeout(mut self, join_timeout: Duration) -> Self {
        self.join_timeout = join_timeout;
        self
    }

    pub fn config(&self) -> &PortConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The most recent record, if one has arrived.
    pub fn current(&self) -> Option<Record> {
        self.current
    }

    /// Name of the open port while streaming.
    pub fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    /// Whether the reader thread is still delivering lines.
    ///
    /// False after a fatal read error even though the state stays
    /// `Streaming` until `close()`.
    pub fn is_reading(&self) -> bool {
        self.reader.as_ref().is_some_and(ReaderTask::is_alive)
    }

    /// Detect, open and start streaming.
    ///
    /// Fails with `BridgeError::AlreadyOpen` unless the controller is closed.
    /// On any other failure the controller is left `Closed`.
    pub fn open(&mut self) -> BridgeResult<()> {
        if self.state != SessionState::Closed {
            return Err(BridgeError::AlreadyOpen);
        }

        self.state = SessionState::Opening;
        match self.start() {
            Ok(()) => {
                self.state = SessionState::Streaming;
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Closed;
                warn!(error = %e, "Failed to open serial session");
                Err(e)
            }
        }
    }

    fn start(&mut self) -> BridgeResult<()> {
        let session = PortSession::open_with(self.config.clone(), &self.backend, &self.detector)?;
        let name = session.name().to_string();
        let session: SharedSession = Arc::new(Mutex::new(Some(session)));

        // A reader detached by an earlier close keeps the old slot.
        self.errors = Arc::new(ErrorSlot::new());
        let (tx, rx) = line_channel();
        let reader = ReaderTask::spawn(
            Arc::clone(&session),
            tx,
            Arc::clone(&self.errors),
            self.config.read_timeout,
        )
        .map_err(BridgeError::Spawn)?;

        self.session = Some(session);
        self.reader = Some(reader);
        self.lines = Some(rx);
        self.port_name = Some(name);
        Ok(())
    }

    /// Drain queued lines and report the latest record.
    ///
    /// Of all lines that parse in this drain the last one wins; lines that
    /// don't parse are dropped. A pending reader error is handed out once.
    pub fn poll(&mut self) -> PollOutcome {
        let mut updated = false;
        if let Some(lines) = &self.lines {
            if let Some(record) = record::latest(lines.drain()) {
                self.current = Some(record);
                updated = true;
            }
        }

        PollOutcome {
            record: self.current,
            updated,
            error: self.errors.take(),
        }
    }

    /// Stop the reader and release the port. A no-op when already closed.
    ///
    /// Waits at most the join timeout for the reader; after that the port is
    /// released regardless. A read error not yet handed out by `poll()` is
    /// discarded with the session.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closing;

        if let Some(reader) = self.reader.take() {
            if !reader.stop(self.join_timeout) {
                warn!(
                    timeout = ?self.join_timeout,
                    "Serial reader did not stop in time, releasing port anyway"
                );
            }
        }

        // An error nobody polled belongs to this session and ends with it.
        if let Some(e) = self.errors.take() {
            debug!(error = %e, "Dropping unreported read error on close");
        }

        if let Some(session) = self.session.take() {
            match session.try_lock_for(self.join_timeout) {
                Some(mut guard) => {
                    if let Some(mut session) = guard.take() {
                        session.close();
                    }
                }
                // Dropping our reference leaves the reader's as the last one.
                None => warn!("Serial port busy, it will be released when the reader exits"),
            }
        }

        if let Some(name) = self.port_name.take() {
            info!(port = %name, "Serial session closed");
        }
        self.state = SessionState::Closed;
    }
}

impl<B: PortBackend> Drop for SessionController<B> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<B: PortBackend> std::fmt::Debug for SessionController<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state)
            .field("port_name", &self.port_name)
            .field("current", &self.current)
            .finish()
    }
}
