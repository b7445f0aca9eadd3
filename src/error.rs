//! Session-level error types.
//!
//! `OpenError` covers everything that can stop a session from starting,
//! `ReadError` everything that can interrupt one, and `BridgeError` is what
//! the controller hands back to its caller.

use crate::config::ConfigError;
use crate::port::PortError;
use std::time::Duration;
use thiserror::Error;

/// Why a session could not be opened.
#[derive(Debug, Error)]
pub enum OpenError {
    /// Detection found nothing and no name was configured.
    #[error("No serial port specified or found")]
    NoPortSpecified,

    /// The resolved device does not exist.
    #[error("Serial port '{0}' not found")]
    NotFound(String),

    /// The device exists but could not be opened (permissions, in use, ...).
    #[error("Error opening serial port '{port}': {source}")]
    Device {
        port: String,
        #[source]
        source: PortError,
    },

    /// The device opened but could not be prepared for streaming.
    #[error("Error configuring serial port '{port}': {source}")]
    Configure {
        port: String,
        #[source]
        source: PortError,
    },
}

impl OpenError {
    /// Classify a backend open failure for `port`.
    pub fn from_port_error(port: &str, source: PortError) -> Self {
        match source {
            PortError::NotFound(name) => Self::NotFound(name),
            source => Self::Device {
                port: port.to_string(),
                source,
            },
        }
    }

    /// True for the "nothing to open" case, as opposed to a device failure.
    pub fn is_detection_failure(&self) -> bool {
        matches!(self, Self::NoPortSpecified)
    }
}

/// Why a line read did not produce a line.
#[derive(Debug, Error)]
pub enum ReadError {
    /// No complete line arrived in time. Expected; retry.
    #[error("Serial read timed out after {0:?}")]
    Timeout(Duration),

    /// The transport failed. Fatal for the reader.
    #[error("Serial read error: {0}")]
    Io(#[source] PortError),

    /// The session was closed.
    #[error("Serial port is closed")]
    Closed,
}

impl ReadError {
    /// Whether this is the normal idle condition rather than a failure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Errors returned by `SessionController`.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Open(#[from] OpenError),

    /// `open()` was called while a session is still active.
    #[error("A session is already open; close it before opening another")]
    AlreadyOpen,

    /// The reader thread could not be started.
    #[error("Failed to spawn serial reader thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for controller operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_error_classification() {
        let err = OpenError::from_port_error("/dev/ttyUSB0", PortError::not_found("/dev/ttyUSB0"));
        assert!(matches!(err, OpenError::NotFound(ref p) if p == "/dev/ttyUSB0"));

        let busy = PortError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "busy",
        ));
        let err = OpenError::from_port_error("/dev/ttyUSB0", busy);
        assert!(matches!(err, OpenError::Device { .. }));
        assert!(err.to_string().contains("/dev/ttyUSB0"));
        assert!(!err.is_detection_failure());
        assert!(OpenError::NoPortSpecified.is_detection_failure());
    }

    #[test]
    fn test_bridge_error_display() {
        let err: BridgeError = OpenError::NoPortSpecified.into();
        assert_eq!(err.to_string(), "No serial port specified or found");

        let err = ReadError::Io(PortError::Io(std::io::ErrorKind::BrokenPipe.into()));
        assert!(err.to_string().starts_with("Serial read error"));
        assert!(!err.is_timeout());
        assert!(ReadError::Timeout(Duration::from_millis(100)).is_timeout());
    }
}
