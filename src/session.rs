//! One open-to-close lifetime of the device connection.
//!
//! `PortSession` owns the device handle. It resolves which port to open,
//! prepares it for streaming and turns the raw byte stream into lines.

use crate::error::{OpenError, ReadError};
use crate::port::{PortBackend, PortConfig, PortDetector, SerialPortAdapter};
use memchr::memchr;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Size of a single `read_bytes` call.
const READ_CHUNK: usize = 256;

/// Longest partial line kept while waiting for a terminator.
pub const MAX_LINE_LEN: usize = 4096;

/// An open serial port delivering newline-terminated lines.
#[derive(Debug)]
pub struct PortSession {
    port: Option<Box<dyn SerialPortAdapter>>,
    name: String,
    config: PortConfig,
    /// Timeout currently applied to the port.
    timeout: Duration,
    /// Bytes received after the last terminator.
    pending: Vec<u8>,
}

impl PortSession {
    /// Open a session using the default port detector.
    pub fn open(config: PortConfig, backend: &dyn PortBackend) -> Result<Self, OpenError> {
        Self::open_with(config, backend, &PortDetector::default())
    }

    /// Open a session.
    ///
    /// With `auto_detect` the detector picks the port, otherwise the configured
    /// name is used verbatim. Once open, DTR/RTS are raised as configured and
    /// anything the OS buffered before this point is thrown away.
    pub fn open_with(
        config: PortConfig,
        backend: &dyn PortBackend,
        detector: &PortDetector,
    ) -> Result<Self, OpenError> {
        let name = if config.auto_detect {
            detector.resolve(&config.name, backend)
        } else {
            Some(config.name.clone()).filter(|n| !n.is_empty())
        }
        .ok_or(OpenError::NoPortSpecified)?;

        let mut port = backend
            .open(&name, config.baud_rate, config.read_timeout)
            .map_err(|e| OpenError::from_port_error(&name, e))?;

        if config.assert_dtr || config.assert_rts {
            if let Err(e) = port.set_control_lines(config.assert_dtr, config.assert_rts) {
                // Plenty of adapters have no modem lines; they stream regardless.
                warn!(port = %name, error = %e, "Could not set DTR/RTS");
            }
        }

        if let Err(source) = port.clear_input() {
            let _ = port.release();
            return Err(OpenError::Configure { port: name, source });
        }

        info!("Opened serial port: {} @ {}", name, config.baud_rate);

        Ok(Self {
            port: Some(port),
            name,
            timeout: config.read_timeout,
            config,
            pending: Vec::with_capacity(READ_CHUNK),
        })
    }

    /// Name of the port actually opened.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameters the session was opened with.
    pub fn config(&self) -> &PortConfig {
        &self.config
    }

    /// False once `close` has run.
    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    /// Block until a full line arrives or `timeout` elapses.
    ///
    /// The terminator (`\n`, optionally preceded by `\r`) is stripped. A
    /// partial line is kept for the next call.
    pub fn read_line(&mut self, timeout: Duration) -> Result<String, ReadError> {
        let port = self.port.as_mut().ok_or(ReadError::Closed)?;

        if let Some(line) = split_line(&mut self.pending) {
            return Ok(line);
        }

        if timeout != self.timeout {
            port.set_timeout(timeout).map_err(ReadError::Io)?;
            self.timeout = timeout;
        }

        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match port.read_bytes(&mut chunk) {
                Ok(n) => {
                    self.pending.extend_from_slice(&chunk[..n]);
                    if let Some(line) = split_line(&mut self.pending) {
                        return Ok(line);
                    }
                    if self.pending.len() > MAX_LINE_LEN {
                        warn!(
                            port = %self.name,
                            bytes = self.pending.len(),
                            "Discarding unterminated line"
                        );
                        self.pending.clear();
                    }
                }
                Err(e) if e.is_timeout() => {}
                Err(e) => return Err(ReadError::Io(e)),
            }

            if Instant::now() >= deadline {
                return Err(ReadError::Timeout(timeout));
            }
        }
    }

    /// Release the device. Idempotent; teardown errors are logged and dropped.
    pub fn close(&mut self) {
        if let Some(mut port) = self.port.take() {
            if let Err(e) = port.release() {
                debug!(port = %self.name, error = %e, "Ignoring error while releasing port");
            }
            self.pending.clear();
            info!(port = %self.name, "Closed serial port");
        }
    }
}

impl Drop for PortSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Remove the first complete line from `buf`.
fn split_line(buf: &mut Vec<u8>) -> Option<String> {
    let end = memchr(b'\n', buf)?;
    let mut line: Vec<u8> = buf.drain(..=end).collect();
    line.pop();
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Some(String::from_utf8_lossy(&line).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::MockBackend;

    fn fast_config(name: &str) -> PortConfig {
        PortConfig {
            read_timeout: Duration::from_millis(20),
            ..PortConfig::named(name)
        }
    }

    #[test]
    fn test_split_line() {
        let mut buf = b"1 2 3\r\n4 5".to_vec();
        assert_eq!(split_line(&mut buf).as_deref(), Some("1 2 3"));
        assert_eq!(buf, b"4 5");
        assert_eq!(split_line(&mut buf), None);
    }

    #[test]
    fn test_split_line_invalid_utf8() {
        let mut buf = vec![0xff, b'1', b'\n'];
        assert_eq!(split_line(&mut buf).as_deref(), Some("\u{fffd}1"));
    }

    #[test]
    fn test_open_prepares_port() {
        let backend = MockBackend::new();
        let port = backend.add_port("/dev/ttyACM0");
        port.enqueue_line("0 0 0");

        let session = PortSession::open(fast_config(""), &backend).unwrap();
        assert_eq!(session.name(), "/dev/ttyACM0");
        assert!(port.was_cleared());
        assert_eq!(port.pending_reads(), 0);
        assert_eq!(port.control_lines(), (true, true));
    }

    #[test]
    fn test_open_without_control_lines() {
        let backend = MockBackend::new();
        let port = backend.add_port("/dev/ttyUSB0");
        port.set_control_lines_unsupported(true);

        let session = PortSession::open(fast_config("/dev/ttyUSB0"), &backend);
        assert!(session.is_ok());
    }

    #[test]
    fn test_open_no_port() {
        let backend = MockBackend::new();
        let err = PortSession::open(fast_config(""), &backend).unwrap_err();
        assert!(err.is_detection_failure());

        let manual = PortConfig {
            auto_detect: false,
            ..fast_config("")
        };
        let err = PortSession::open(manual, &backend).unwrap_err();
        assert!(err.is_detection_failure());
    }

    #[test]
    fn test_open_manual_name_skips_detection() {
        let backend = MockBackend::new();
        backend.add_port("/dev/ttyACM0");
        backend.add_unlisted_port("/dev/ttyS5");

        let config = PortConfig {
            auto_detect: false,
            ..fast_config("/dev/ttyS5")
        };
        let session = PortSession::open(config, &backend).unwrap();
        assert_eq!(session.name(), "/dev/ttyS5");
    }

    #[test]
    fn test_open_busy_device() {
        let backend = MockBackend::new();
        backend.add_port("/dev/ttyACM0");
        backend.mark_busy("/dev/ttyACM0");

        let err = PortSession::open(fast_config("/dev/ttyACM0"), &backend).unwrap_err();
        assert!(matches!(err, OpenError::Device { ref port, .. } if port == "/dev/ttyACM0"));
    }

    #[test]
    fn test_read_line_reassembles_fragments() {
        let backend = MockBackend::new();
        let port = backend.add_port("/dev/ttyACM0");
        let mut session = PortSession::open(fast_config(""), &backend).unwrap();

        port.enqueue_read(b"1 2");
        port.enqueue_timeout();
        port.enqueue_read(b"00 3\n0 1");
        port.enqueue_read(b"0 2\n");

        assert_eq!(session.read_line(Duration::from_millis(200)).unwrap(), "1 200 3");
        assert_eq!(session.read_line(Duration::from_millis(200)).unwrap(), "0 10 2");
    }

    #[test]
    fn test_read_line_timeout() {
        let backend = MockBackend::new();
        backend.add_port("/dev/ttyACM0");
        let mut session = PortSession::open(fast_config(""), &backend).unwrap();

        let err = session.read_line(Duration::from_millis(10)).unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn test_read_line_keeps_partial_across_timeout() {
        let backend = MockBackend::new();
        let port = backend.add_port("/dev/ttyACM0");
        let mut session = PortSession::open(fast_config(""), &backend).unwrap();

        port.enqueue_read(b"1 50");
        assert!(session.read_line(Duration::from_millis(10)).unwrap_err().is_timeout());

        port.enqueue_read(b" 1\n");
        assert_eq!(session.read_line(Duration::from_millis(100)).unwrap(), "1 50 1");
    }

    #[test]
    fn test_read_line_io_error() {
        let backend = MockBackend::new();
        let port = backend.add_port("/dev/ttyACM0");
        let mut session = PortSession::open(fast_config(""), &backend).unwrap();

        port.enqueue_error(std::io::ErrorKind::BrokenPipe);
        assert!(matches!(
            session.read_line(Duration::from_millis(50)),
            Err(ReadError::Io(_))
        ));
    }

    #[test]
    fn test_oversized_line_is_discarded() {
        let backend = MockBackend::new();
        let port = backend.add_port("/dev/ttyACM0");
        let mut session = PortSession::open(fast_config(""), &backend).unwrap();

        port.enqueue_read(&vec![b'9'; MAX_LINE_LEN + 10]);
        port.enqueue_read(b"1 2 3\n");

        assert_eq!(session.read_line(Duration::from_millis(500)).unwrap(), "1 2 3");
    }

    #[test]
    fn test_read_timeout_change_is_applied() {
        let backend = MockBackend::new();
        let port = backend.add_port("/dev/ttyACM0");
        let mut session = PortSession::open(fast_config(""), &backend).unwrap();
        assert_eq!(port.timeout(), Duration::from_millis(20));

        let _ = session.read_line(Duration::from_millis(7));
        assert_eq!(port.timeout(), Duration::from_millis(7));
    }

    #[test]
    fn test_close_is_idempotent() {
        let backend = MockBackend::new();
        let port = backend.add_port("/dev/ttyACM0");
        let mut session = PortSession::open(fast_config(""), &backend).unwrap();

        session.close();
        session.close();
        assert!(!session.is_open());
        assert!(port.was_released());
        assert!(matches!(
            session.read_line(Duration::from_millis(10)),
            Err(ReadError::Closed)
        ));
    }
}
