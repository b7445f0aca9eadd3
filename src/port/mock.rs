//! Mock serial port implementation for testing.
//!
//! Provides a `MockSerialPort` that replays a script of reads (data chunks,
//! timeouts, transport errors) without requiring actual hardware, and a
//! `MockBackend` that hands those ports out by name.

use super::error::PortError;
use super::traits::{PortBackend, SerialPortAdapter};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Longest a read on an empty script actually sleeps, so tests stay fast
/// even with production-sized timeouts.
const MAX_IDLE_SLEEP: Duration = Duration::from_millis(5);

/// One scripted outcome of `read_bytes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockRead {
    /// Bytes delivered by the device. Split across reads if the caller's
    /// buffer is smaller.
    Data(Vec<u8>),
    /// The read timeout expires with no data.
    Timeout,
    /// The transport fails with this I/O error kind.
    Error(std::io::ErrorKind),
    /// The read hangs for this long, ignoring the port timeout, then times
    /// out. Models a driver stuck inside a blocking call.
    Stall(Duration),
}

/// Inner state of the mock port, shared by every clone.
#[derive(Debug, Default)]
struct MockPortState {
    script: VecDeque<MockRead>,
    timeout: Duration,
    buffers_cleared: bool,
    dtr: bool,
    rts: bool,
    control_lines_unsupported: bool,
    released: bool,
    reads: usize,
}

/// Mock serial port implementation for testing.
///
/// Clones share state, so a test keeps one handle to feed data while the
/// session reads from another.
///
/// # Example
/// ```
/// use serial_telemetry_bridge::port::{MockSerialPort, SerialPortAdapter};
///
/// let mut port = MockSerialPort::new("MOCK0");
/// port.enqueue_read(b"1 200 2\n");
///
/// let mut buffer = [0u8; 16];
/// let n = port.read_bytes(&mut buffer).unwrap();
/// assert_eq!(&buffer[..n], b"1 200 2\n");
/// ```
#[derive(Clone)]
pub struct MockSerialPort {
    name: String,
    state: Arc<Mutex<MockPortState>>,
}

impl MockSerialPort {
    /// Create a new mock serial port with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockPortState {
                timeout: Duration::from_millis(100),
                ..Default::default()
            })),
        }
    }

    /// Enqueue bytes to be returned by subsequent read operations.
    pub fn enqueue_read(&self, data: &[u8]) {
        self.state
            .lock()
            .script
            .push_back(MockRead::Data(data.to_vec()));
    }

    /// Enqueue a newline-terminated text line.
    pub fn enqueue_line(&self, line: &str) {
        let mut bytes = line.as_bytes().to_vec();
        bytes.push(b'\n');
        self.state.lock().script.push_back(MockRead::Data(bytes));
    }

    /// Enqueue an expired read timeout.
    pub fn enqueue_timeout(&self) {
        self.state.lock().script.push_back(MockRead::Timeout);
    }

    /// Enqueue a transport failure.
    pub fn enqueue_error(&self, kind: std::io::ErrorKind) {
        self.state.lock().script.push_back(MockRead::Error(kind));
    }

    /// Enqueue a read that blocks for `duration` before timing out.
    pub fn enqueue_stall(&self, duration: Duration) {
        self.state.lock().script.push_back(MockRead::Stall(duration));
    }

    /// Make `set_control_lines` fail, like adapters without modem lines.
    pub fn set_control_lines_unsupported(&self, unsupported: bool) {
        self.state.lock().control_lines_unsupported = unsupported;
    }

    /// Whether the input buffer has been cleared.
    pub fn was_cleared(&self) -> bool {
        self.state.lock().buffers_cleared
    }

    /// Current (DTR, RTS) levels.
    pub fn control_lines(&self) -> (bool, bool) {
        let state = self.state.lock();
        (state.dtr, state.rts)
    }

    /// Whether the session released the handle.
    pub fn was_released(&self) -> bool {
        self.state.lock().released
    }

    /// Timeout most recently configured on the port.
    pub fn timeout(&self) -> Duration {
        self.state.lock().timeout
    }

    /// Number of `read_bytes` calls so far.
    pub fn read_count(&self) -> usize {
        self.state.lock().reads
    }

    /// Number of scripted reads not yet consumed.
    pub fn pending_reads(&self) -> usize {
        self.state.lock().script.len()
    }
}

impl SerialPortAdapter for MockSerialPort {
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let (next, timeout) = {
            let mut state = self.state.lock();
            state.reads += 1;
            (state.script.pop_front(), state.timeout)
        };

        match next {
            Some(MockRead::Data(mut data)) => {
                let n = data.len().min(buffer.len());
                buffer[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    let rest = data.split_off(n);
                    self.state.lock().script.push_front(MockRead::Data(rest));
                }
                Ok(n)
            }
            Some(MockRead::Timeout) => Err(PortError::timeout(timeout)),
            Some(MockRead::Error(kind)) => Err(PortError::Io(std::io::Error::new(
                kind,
                "mock transport failure",
            ))),
            Some(MockRead::Stall(duration)) => {
                std::thread::sleep(duration);
                Err(PortError::timeout(timeout))
            }
            None => {
                // Behave like a blocking read that runs out its timeout.
                std::thread::sleep(timeout.min(MAX_IDLE_SLEEP));
                Err(PortError::timeout(timeout))
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError> {
        self.state.lock().timeout = timeout;
        Ok(())
    }

    fn clear_input(&mut self) -> Result<(), PortError> {
        let mut state = self.state.lock();
        state.script.clear();
        state.buffers_cleared = true;
        Ok(())
    }

    fn set_control_lines(&mut self, dtr: bool, rts: bool) -> Result<(), PortError> {
        let mut state = self.state.lock();
        if state.control_lines_unsupported {
            return Err(PortError::config("control lines not supported"));
        }
        state.dtr = dtr;
        state.rts = rts;
        Ok(())
    }

    fn release(&mut self) -> Result<(), PortError> {
        self.state.lock().released = true;
        Ok(())
    }
}

impl std::fmt::Debug for MockSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialPort")
            .field("name", &self.name)
            .field("pending_reads", &self.pending_reads())
            .finish()
    }
}

#[derive(Debug, Default)]
struct MockBackendState {
    ports: Vec<MockSerialPort>,
    unlisted: Vec<MockSerialPort>,
    busy: Vec<String>,
    enumeration_unsupported: bool,
    opens: usize,
}

/// `PortBackend` serving `MockSerialPort`s.
///
/// Ports are enumerated in registration order.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockBackendState>>,
}

impl MockBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a port and return a handle that shares its state.
    pub fn add_port(&self, name: impl Into<String>) -> MockSerialPort {
        let port = MockSerialPort::new(name);
        self.state.lock().ports.push(port.clone());
        port
    }

    /// Register a port that opens by name but is missing from enumeration.
    pub fn add_unlisted_port(&self, name: impl Into<String>) -> MockSerialPort {
        let port = MockSerialPort::new(name);
        self.state.lock().unlisted.push(port.clone());
        port
    }

    /// Make opening `name` fail as if another process held it.
    pub fn mark_busy(&self, name: impl Into<String>) {
        self.state.lock().busy.push(name.into());
    }

    /// Simulate a platform without port enumeration.
    pub fn set_enumeration_unsupported(&self, unsupported: bool) {
        self.state.lock().enumeration_unsupported = unsupported;
    }

    /// Number of successful opens.
    pub fn open_count(&self) -> usize {
        self.state.lock().opens
    }
}

impl PortBackend for MockBackend {
    fn available_ports(&self) -> Option<Vec<String>> {
        let state = self.state.lock();
        if state.enumeration_unsupported {
            return None;
        }
        Some(state.ports.iter().map(|p| p.name.clone()).collect())
    }

    fn open(
        &self,
        name: &str,
        _baud_rate: u32,
        timeout: Duration,
    ) -> Result<Box<dyn SerialPortAdapter>, PortError> {
        let mut state = self.state.lock();
        if state.busy.iter().any(|b| b == name) {
            return Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "Device or resource busy",
            )));
        }

        let found = state
            .ports
            .iter()
            .chain(state.unlisted.iter())
            .find(|p| p.name == name)
            .cloned();

        match found {
            Some(mut port) => {
                port.set_timeout(timeout)?;
                state.opens += 1;
                Ok(Box::new(port))
            }
            None => Err(PortError::not_found(name)),
        }
    }
}
