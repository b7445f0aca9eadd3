//! Serial Telemetry Bridge Library
//!
//! Reads newline-delimited telemetry records from a serial device on a
//! background thread and hands the most recent valid record to a consumer
//! that polls once per frame, without the consumer ever blocking on I/O.
//!
//! # Modules
//!
//! - `config`: Configuration management with TOML support
//! - `error`: Open, read and controller errors
//! - `port`: Port abstraction layer, detection and mocks
//! - `session`: An open port delivering lines
//! - `channel`: Line handoff between reader and consumer
//! - `reader`: The background reader thread
//! - `record`: Telemetry records and the line parser
//! - `controller`: Session lifecycle and `poll()`
//! - `logging`: Tracing subscriber setup
//!
//! # Example
//!
//! ```no_run
//! use serial_telemetry_bridge::{PortConfig, SessionController};
//!
//! let mut bridge = SessionController::new(PortConfig::default());
//! bridge.open()?;
//! loop {
//!     let outcome = bridge.poll();
//!     if let Some(err) = outcome.error {
//!         eprintln!("{err}");
//!     }
//!     if let Some(record) = outcome.record {
//!         // drive the fixture from `record`
//!         let _ = record.brightness;
//!     }
//!     # break;
//! }
//! bridge.close();
//! # Ok::<(), serial_telemetry_bridge::BridgeError>(())
//! ```

pub mod channel;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod port;
pub mod reader;
pub mod record;
pub mod session;

// Re-export commonly used types for convenience
pub use controller::{PollOutcome, SessionController, SessionState, DEFAULT_JOIN_TIMEOUT};
pub use error::{BridgeError, BridgeResult, OpenError, ReadError};
pub use port::{
    MockBackend, MockSerialPort, PortBackend, PortConfig, PortDetector, PortError,
    SerialPortAdapter, SyncSerialPort, SystemBackend,
};
pub use record::{parse, Record};
pub use session::PortSession;

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
