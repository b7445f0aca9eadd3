//! Configuration module.
//!
//! TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! 1. `TELEMETRY_BRIDGE_CONFIG` environment variable (explicit path)
//! 2. `./telemetry-bridge.toml` (current directory)
//! 3. The platform config directory (`directories::ProjectDirs`)
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! The pattern is `TELEMETRY_BRIDGE_<SECTION>_<KEY>`, e.g.
//! `TELEMETRY_BRIDGE_SERIAL_PORT_NAME=/dev/ttyACM0` or
//! `TELEMETRY_BRIDGE_SERIAL_READ_TIMEOUT_MS=50`.
//!
//! # Example
//!
//! ```toml
//! [serial]
//! port_name = ""            # empty: auto-detect
//! baud_rate = 115200
//! auto_detect_port = true
//! read_timeout_ms = 100
//!
//! [session]
//! tick_rate_hz = 60
//!
//! [logging]
//! level = "info"
//! format = "compact"
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{Config, LogFormat, LoggingConfig, SerialConfig, SessionConfig};
