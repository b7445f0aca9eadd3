//! Port abstraction layer for serial communication.
//!
//! Provides the adapter and backend traits, the `serialport`-backed
//! implementations, mocks for testing, and port detection.

pub mod detect;
pub mod error;
pub mod mock;
pub mod sync_port;
pub mod traits;

pub use detect::{choose, PortDetector, DEFAULT_FAMILY_MARKERS};
pub use error::PortError;
pub use mock::{MockBackend, MockRead, MockSerialPort};
pub use sync_port::*;
pub use traits::*;
