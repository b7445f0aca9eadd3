//! Synchronous serial port implementation.
//!
//! Wraps the `serialport` crate's `SerialPort` trait with our own
//! `SerialPortAdapter` trait, and provides `SystemBackend`, the
//! `PortBackend` that talks to the real operating system.

use super::error::PortError;
use super::traits::{PortBackend, SerialPortAdapter};
use std::io::{Read, Write};
use std::time::Duration;

/// Synchronous serial port implementation wrapping `serialport::SerialPort`.
pub struct SyncSerialPort {
    /// The underlying serial port implementation.
    port: Box<dyn serialport::SerialPort>,
    /// The port name/path for identification.
    name: String,
}

impl SyncSerialPort {
    /// Open a serial port at 8N1 with no flow control.
    ///
    /// # Example
    /// ```no_run
    /// use serial_telemetry_bridge::port::SyncSerialPort;
    /// use std::time::Duration;
    ///
    /// let port = SyncSerialPort::open("/dev/ttyACM0", 115_200, Duration::from_millis(100))?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(port_name: &str, baud_rate: u32, timeout: Duration) -> Result<Self, PortError> {
        let port = serialport::new(port_name, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .flow_control(serialport::FlowControl::None)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .timeout(timeout)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => PortError::not_found(port_name),
                serialport::ErrorKind::InvalidInput => PortError::config(e.to_string()),
                _ => PortError::Serial(e),
            })?;

        Ok(Self {
            port,
            name: port_name.to_string(),
        })
    }
}

impl SerialPortAdapter for SyncSerialPort {
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        self.port.read(buffer).map_err(PortError::Io)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError> {
        self.port.set_timeout(timeout).map_err(PortError::Serial)
    }

    fn clear_input(&mut self) -> Result<(), PortError> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(PortError::Serial)
    }

    fn set_control_lines(&mut self, dtr: bool, rts: bool) -> Result<(), PortError> {
        self.port.write_data_terminal_ready(dtr)?;
        self.port.write_request_to_send(rts)?;
        Ok(())
    }

    fn release(&mut self) -> Result<(), PortError> {
        self.port.flush().map_err(PortError::Io)
    }
}

impl std::fmt::Debug for SyncSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSerialPort")
            .field("name", &self.name)
            .field("baud_rate", &self.port.baud_rate())
            .finish()
    }
}

/// `PortBackend` backed by the `serialport` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBackend;

impl PortBackend for SystemBackend {
    fn available_ports(&self) -> Option<Vec<String>> {
        match serialport::available_ports() {
            Ok(ports) => Some(ports.into_iter().map(|p| p.port_name).collect()),
            Err(e) => {
                tracing::debug!("Port enumeration unavailable: {}", e);
                None
            }
        }
    }

    fn open(
        &self,
        name: &str,
        baud_rate: u32,
        timeout: Duration,
    ) -> Result<Box<dyn SerialPortAdapter>, PortError> {
        Ok(Box::new(SyncSerialPort::open(name, baud_rate, timeout)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_not_found_error() {
        let result =
            SyncSerialPort::open("/dev/nonexistent_port_12345", 115_200, Duration::from_millis(50));

        assert!(result.is_err());
        if let Err(e) = result {
            match e {
                PortError::NotFound(name) => {
                    assert!(name.contains("nonexistent"));
                }
                // Some platforms report a missing node as a plain I/O failure.
                PortError::Serial(_) | PortError::Io(_) => {}
                _ => panic!("Expected NotFound error, got: {:?}", e),
            }
        }
    }

    #[test]
    fn test_system_backend_enumeration_does_not_panic() {
        let _ = SystemBackend.available_ports();
    }
}
