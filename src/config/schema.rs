//! Configuration schema definitions.
//!
//! Every section is `#[serde(default)]`, so a config file only needs the keys
//! it wants to change.

use super::error::{ConfigError, ConfigResult};
use crate::port::{PortConfig, PortDetector, DEFAULT_FAMILY_MARKERS};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial port configuration
    pub serial: SerialConfig,
    /// Session lifecycle and host loop configuration
    pub session: SessionConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Reject values the bridge cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.serial.baud_rate == 0 {
            return Err(ConfigError::validation("serial.baud_rate", "must be greater than 0"));
        }
        if self.serial.read_timeout_ms == 0 {
            return Err(ConfigError::validation(
                "serial.read_timeout_ms",
                "must be greater than 0",
            ));
        }
        if self.session.tick_rate_hz == 0 {
            return Err(ConfigError::validation(
                "session.tick_rate_hz",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Serial port configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Port name or alias. Empty lets detection choose.
    pub port_name: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Pick a plausible port when `port_name` is empty or missing
    pub auto_detect_port: bool,
    /// Blocking read timeout in milliseconds
    pub read_timeout_ms: u64,
    /// Raise DTR after opening
    pub assert_dtr: bool,
    /// Raise RTS after opening
    pub assert_rts: bool,
    /// Name fragments that mark a likely device during detection
    pub family_markers: Vec<String>,
    /// Port aliases for convenience
    #[serde(default)]
    pub port_aliases: HashMap<String, String>,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: 115200,
            auto_detect_port: true,
            read_timeout_ms: 100,
            assert_dtr: true,
            assert_rts: true,
            family_markers: DEFAULT_FAMILY_MARKERS.iter().map(|m| m.to_string()).collect(),
            port_aliases: HashMap::new(),
        }
    }
}

impl SerialConfig {
    /// Get the read timeout as Duration
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Resolve a port name through aliases
    pub fn resolve_port(&self, name: &str) -> String {
        self.port_aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    /// Session parameters for this section, aliases resolved.
    pub fn port_config(&self) -> PortConfig {
        PortConfig {
            name: self.resolve_port(&self.port_name),
            baud_rate: self.baud_rate,
            read_timeout: self.read_timeout(),
            auto_detect: self.auto_detect_port,
            assert_dtr: self.assert_dtr,
            assert_rts: self.assert_rts,
        }
    }

    /// Detector using the configured markers.
    pub fn detector(&self) -> PortDetector {
        PortDetector::with_markers(self.family_markers.iter().cloned())
    }
}

/// Session lifecycle section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Upper bound on waiting for the reader (and then the port) on close
    pub join_timeout_ms: u64,
    /// Host loop cadence in Hz
    pub tick_rate_hz: u32,
    /// Reopen this long after a failed open or a fatal read error (unset = never)
    pub reconnect_ms: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            join_timeout_ms: 500,
            tick_rate_hz: 60,
            reconnect_ms: None,
        }
    }
}

impl SessionConfig {
    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    /// Get tick interval as Duration
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(1) / self.tick_rate_hz.max(1)
    }

    pub fn reconnect_delay(&self) -> Option<Duration> {
        self.reconnect_ms.map(Duration::from_millis)
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Log file path (optional, stderr otherwise)
    pub file: Option<PathBuf>,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    #[default]
    Pretty,
    /// Compact format
    Compact,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.serial.baud_rate, 115200);
        assert_eq!(config.serial.read_timeout_ms, 100);
        assert!(config.serial.auto_detect_port);
        assert!(config.serial.port_name.is_empty());
        assert_eq!(config.session.join_timeout_ms, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_port_alias_resolution() {
        let mut config = SerialConfig::default();
        config
            .port_aliases
            .insert("lamp".to_string(), "/dev/cu.usbmodem101".to_string());
        config.port_name = "lamp".to_string();

        assert_eq!(config.resolve_port("lamp"), "/dev/cu.usbmodem101");
        assert_eq!(config.resolve_port("COM5"), "COM5");
        assert_eq!(config.port_config().name, "/dev/cu.usbmodem101");
    }

    #[test]
    fn test_port_config_conversion() {
        let config = SerialConfig {
            baud_rate: 57600,
            read_timeout_ms: 250,
            auto_detect_port: false,
            ..SerialConfig::default()
        };
        let port = config.port_config();
        assert_eq!(port.baud_rate, 57600);
        assert_eq!(port.read_timeout, Duration::from_millis(250));
        assert!(!port.auto_detect);
    }

    #[test]
    fn test_tick_interval() {
        let session = SessionConfig {
            tick_rate_hz: 50,
            ..SessionConfig::default()
        };
        assert_eq!(session.tick_interval(), Duration::from_millis(20));
    }

    #[test]
    fn test_validation_rejects_zeroes() {
        let mut config = Config::default();
        config.serial.read_timeout_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("serial.read_timeout_ms"));

        let mut config = Config::default();
        config.serial.baud_rate = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.session.tick_rate_hz = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[serial]"));
        assert!(toml_str.contains("[session]"));
        assert!(toml_str.contains("[logging]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [serial]
            port_name = "/dev/ttyACM1"
            baud_rate = 9600

            [logging]
            format = "json"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.serial.port_name, "/dev/ttyACM1");
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.logging.format, LogFormat::Json);
        // Defaults should still work
        assert_eq!(config.serial.read_timeout_ms, 100);
        assert_eq!(config.session.tick_rate_hz, 60);
    }
}
