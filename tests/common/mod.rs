//! Common test utilities and fixtures.
//!
//! Shared helpers for the integration suites: a controller wired to a
//! `MockBackend` with short timeouts, and polling helpers that wait for the
//! reader thread without fixed sleeps.

#![allow(dead_code)]

use serial_telemetry_bridge::{
    MockBackend, MockSerialPort, PollOutcome, PortConfig, SessionController,
};
use std::time::{Duration, Instant};

/// Read timeout used by every mock-backed controller.
pub const TEST_READ_TIMEOUT: Duration = Duration::from_millis(10);

/// Upper bound for anything a test waits on.
pub const WAIT_LIMIT: Duration = Duration::from_secs(2);

/// Name given to the default mock device.
pub const MOCK_DEVICE: &str = "/dev/cu.usbmodem101";

/// Test fixture: a mock backend with one registered device and a controller
/// on top of it.
pub struct TestBridge {
    pub backend: MockBackend,
    pub port: MockSerialPort,
    pub controller: SessionController<MockBackend>,
}

impl TestBridge {
    /// Fixture with the default device, auto-detection on.
    pub fn new() -> Self {
        Self::with_device(MOCK_DEVICE)
    }

    /// Fixture with a single device named `name`.
    pub fn with_device(name: &str) -> Self {
        let backend = MockBackend::new();
        let port = backend.add_port(name);
        let controller = SessionController::with_backend(test_config(""), backend.clone())
            .with_join_timeout(Duration::from_millis(200));
        Self {
            backend,
            port,
            controller,
        }
    }

    /// Replace the bound on how long `close()` waits.
    pub fn join_timeout(mut self, timeout: Duration) -> Self {
        self.controller = self.controller.with_join_timeout(timeout);
        self
    }

    /// Open the controller and fail the test if that doesn't work.
    pub fn opened(mut self) -> Self {
        self.controller
            .open()
            .expect("mock session should open");
        self
    }

    /// Feed lines to the device after it has been opened.
    pub fn send_lines(&self, lines: &[&str]) {
        for line in lines {
            self.port.enqueue_line(line);
        }
    }
}

/// Port configuration with a short read timeout.
pub fn test_config(name: &str) -> PortConfig {
    PortConfig {
        read_timeout: TEST_READ_TIMEOUT,
        ..PortConfig::named(name)
    }
}

/// Poll until `done` accepts an outcome, returning that outcome.
///
/// Panics after [`WAIT_LIMIT`].
pub fn poll_until<F>(controller: &mut SessionController<MockBackend>, mut done: F) -> PollOutcome
where
    F: FnMut(&PollOutcome) -> bool,
{
    let start = Instant::now();
    loop {
        let outcome = controller.poll();
        if done(&outcome) {
            return outcome;
        }
        assert!(
            start.elapsed() < WAIT_LIMIT,
            "condition not met within {:?}, last outcome: {:?}",
            WAIT_LIMIT,
            outcome
        );
        std::thread::sleep(Duration::from_millis(2));
    }
}

/// Wait until the device script has been fully consumed and the reader has
/// had time to hand over what it read.
pub fn wait_for_drain(port: &MockSerialPort) {
    wait_until(|| port.pending_reads() == 0);
    // One more read cycle so the last chunk has been pushed to the queue.
    let reads = port.read_count();
    wait_until(|| port.read_count() > reads + 1);
}

/// Spin until `condition` holds. Panics after [`WAIT_LIMIT`].
pub fn wait_until<F: FnMut() -> bool>(mut condition: F) {
    let start = Instant::now();
    while !condition() {
        assert!(
            start.elapsed() < WAIT_LIMIT,
            "condition not met within {:?}",
            WAIT_LIMIT
        );
        std::thread::sleep(Duration::from_millis(1));
    }
}
