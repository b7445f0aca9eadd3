//! Core traits for serial port abstraction.
//!
//! `SerialPortAdapter` is a single open device handle; `PortBackend` is the
//! operating system side (enumerate and open). Both have a real and a mock
//! implementation so the session machinery can be driven without hardware.

use super::error::PortError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default baud rate used by the telemetry firmware.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default blocking-read timeout.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Parameters for one port session.
///
/// Immutable for the lifetime of a session; supplied by the caller when the
/// session is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfig {
    /// Port name or path. Empty means "let detection pick one".
    pub name: String,

    /// Baud rate (bits per second).
    pub baud_rate: u32,

    /// Upper bound for a single blocking line read.
    pub read_timeout: Duration,

    /// Run port detection before opening.
    pub auto_detect: bool,

    /// Assert Data Terminal Ready after opening.
    pub assert_dtr: bool,

    /// Assert Request To Send after opening.
    pub assert_rts: bool,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
            auto_detect: true,
            // Native USB boards (Leonardo, Pro Micro, most CDC firmware) hold
            // their output until the host raises DTR.
            assert_dtr: true,
            assert_rts: true,
        }
    }
}

impl PortConfig {
    /// Config for a named port, everything else default.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Trait for serial port I/O operations.
///
/// Only the read side is needed: the telemetry device talks, the host listens.
pub trait SerialPortAdapter: Send + std::fmt::Debug {
    /// Read bytes from the serial port into the provided buffer.
    ///
    /// Blocks for at most the configured timeout. An expired timeout is
    /// reported as an error for which `PortError::is_timeout` is true.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    /// Get the name/path of this serial port.
    fn name(&self) -> &str;

    /// Set the read timeout for this port.
    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError>;

    /// Discard everything the OS has buffered on the receive side.
    fn clear_input(&mut self) -> Result<(), PortError>;

    /// Drive the DTR and RTS control lines.
    fn set_control_lines(&mut self, dtr: bool, rts: bool) -> Result<(), PortError>;

    /// Best-effort teardown before the handle is dropped.
    fn release(&mut self) -> Result<(), PortError> {
        Ok(())
    }
}

/// The operating-system side of serial access.
pub trait PortBackend: Send + Sync {
    /// Enumerate port names in the platform's enumeration order.
    ///
    /// Returns `None` when the platform offers no meaningful enumeration or
    /// the enumeration failed.
    fn available_ports(&self) -> Option<Vec<String>>;

    /// Open the named port at the given baud rate with the given timeout.
    fn open(
        &self,
        name: &str,
        baud_rate: u32,
        timeout: Duration,
    ) -> Result<Box<dyn SerialPortAdapter>, PortError>;
}
