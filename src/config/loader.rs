//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::Config;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "TELEMETRY_BRIDGE";

/// Config file name
const CONFIG_FILE_NAME: &str = "telemetry-bridge.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "TELEMETRY_BRIDGE_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `TELEMETRY_BRIDGE_CONFIG` environment variable (explicit path)
    /// 2. `./telemetry-bridge.toml` (current directory)
    /// 3. the platform config directory (`~/.config/telemetry-bridge/` on Linux)
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables override file values, and the result is validated.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = if let Some(ref path) = config_path {
            load_from_file(path)?
        } else {
            Config::default()
        };

        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self { config_path, config })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file).
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        // Still apply env overrides even with defaults
        if let Err(e) = apply_env_overrides(&mut config) {
            warn!(error = %e, "Ignoring environment overrides, using defaults");
            config = Config::default();
        }

        Self {
            config_path: None,
            config,
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get a mutable reference to the configuration.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Save the current configuration to a specific file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        save_to_file(&self.config, path.as_ref())
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    get_default_config_path().filter(|p| p.exists())
}

/// Get the default config directory for creating new config files.
pub fn get_default_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "telemetry-bridge").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the default config file path for creating new config files.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_default_config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

/// Load configuration from a file.
fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(ConfigError::ParseError)
}

/// Save configuration to a file.
fn save_to_file(config: &Config, path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Read `<ENV_PREFIX>_<suffix>` if set.
fn env_var(suffix: &str) -> Option<(String, String)> {
    let name = format!("{}_{}", ENV_PREFIX, suffix);
    std::env::var(&name).ok().map(|val| (name, val))
}

fn parse_env<T: FromStr>(name: &str, val: &str, message: &str) -> ConfigResult<T> {
    val.trim()
        .parse()
        .map_err(|_| ConfigError::env_parse(name, message))
}

fn parse_env_bool(name: &str, val: &str) -> ConfigResult<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::env_parse(name, "Expected a boolean")),
    }
}

/// Apply environment variable overrides to the configuration.
///
/// Environment variables follow the pattern: `TELEMETRY_BRIDGE_<SECTION>_<KEY>`
/// For example:
/// - `TELEMETRY_BRIDGE_SERIAL_PORT_NAME=/dev/ttyACM0`
/// - `TELEMETRY_BRIDGE_SERIAL_BAUD_RATE=9600`
/// - `TELEMETRY_BRIDGE_LOGGING_LEVEL=debug`
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    // Serial overrides
    if let Some((_, val)) = env_var("SERIAL_PORT_NAME") {
        config.serial.port_name = val;
    }
    if let Some((name, val)) = env_var("SERIAL_BAUD_RATE") {
        config.serial.baud_rate = parse_env(&name, &val, "Invalid baud rate")?;
    }
    if let Some((name, val)) = env_var("SERIAL_AUTO_DETECT_PORT") {
        config.serial.auto_detect_port = parse_env_bool(&name, &val)?;
    }
    if let Some((name, val)) = env_var("SERIAL_READ_TIMEOUT_MS") {
        config.serial.read_timeout_ms = parse_env(&name, &val, "Invalid timeout")?;
    }

    // Session overrides
    if let Some((name, val)) = env_var("SESSION_JOIN_TIMEOUT_MS") {
        config.session.join_timeout_ms = parse_env(&name, &val, "Invalid timeout")?;
    }
    if let Some((name, val)) = env_var("SESSION_TICK_RATE_HZ") {
        config.session.tick_rate_hz = parse_env(&name, &val, "Invalid tick rate")?;
    }
    if let Some((name, val)) = env_var("SESSION_RECONNECT_MS") {
        config.session.reconnect_ms = Some(parse_env(&name, &val, "Invalid delay")?);
    }

    // Logging overrides
    if let Some((_, val)) = env_var("LOGGING_LEVEL") {
        config.logging.level = val;
    }

    Ok(())
}
