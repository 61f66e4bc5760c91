//! TOML configuration for the bridge binary.
//!
//! The file lives in the platform config directory unless `--config` names
//! another one:
//! - Windows:  `%APPDATA%\smartport-bridge\config.toml`
//! - Linux:    `~/.config/smartport-bridge/config.toml`
//! - macOS:    `~/Library/Application Support/smartport-bridge/config.toml`
//!
//! Example:
//!
//! ```toml
//! [server]
//! host = "fujinet.local"
//! port = 1985
//!
//! [connection]
//! retry_interval_ms = 1
//! progress_every = 1000
//! max_frame_len = 1024
//!
//! [bus]
//! poll_interval_us = 50
//!
//! [logging]
//! log_level = "info"
//! ```
//!
//! Every section and every field is optional.  Missing values take the
//! defaults shown above, and a missing file is the same as an empty one.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::connection::RetryPolicy;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the SmartPort server listens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host name or IP literal.  Resolved once at startup.
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Connect-retry and framing limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Pause between connect attempts, in milliseconds.
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
    /// Log a progress line every this many failed attempts.
    #[serde(default = "default_progress_every")]
    pub progress_every: u32,
    /// Largest SLIP frame accepted from the server.
    #[serde(default = "default_max_frame_len")]
    pub max_frame_len: usize,
}

/// Host bus loop timing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BusConfig {
    /// Sleep between two idle polls, in microseconds.
    #[serde(default = "default_poll_interval_us")]
    pub poll_interval_us: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    1985
}
fn default_retry_interval_ms() -> u64 {
    1
}
fn default_progress_every() -> u32 {
    1000
}
fn default_max_frame_len() -> usize {
    smartport_core::protocol::slip::DEFAULT_MAX_FRAME_LEN
}
fn default_poll_interval_us() -> u64 {
    50
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            retry_interval_ms: default_retry_interval_ms(),
            progress_every: default_progress_every(),
            max_frame_len: default_max_frame_len(),
        }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            poll_interval_us: default_poll_interval_us(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl ConnectionConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            interval: Duration::from_millis(self.retry_interval_ms),
            progress_every: self.progress_every,
        }
    }
}

impl BusConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.poll_interval_us)
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .map(|dir| dir.join("config.toml"))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads the config from the default location.
///
/// # Errors
///
/// See [`load_config_from`].
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads the config from `path`, returning `AppConfig::default()` if the
/// file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("smartport-bridge"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("smartport-bridge"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("smartport-bridge")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(name: &str, content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "smartport-bridge-config-{}-{name}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).expect("create scratch dir");
        let path = dir.join("config.toml");
        std::fs::write(&path, content).expect("write scratch config");
        path
    }

    #[test]
    fn test_app_config_default_points_at_local_server() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server.host, "localhost");
        assert_eq!(cfg.server.port, 1985);
    }

    #[test]
    fn test_connection_config_default_retries_every_millisecond() {
        // Arrange / Act
        let policy = ConnectionConfig::default().retry_policy();

        // Assert
        assert_eq!(policy, RetryPolicy::default());
        assert_eq!(ConnectionConfig::default().max_frame_len, 1024);
    }

    #[test]
    fn test_bus_and_logging_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.bus.poll_interval(), Duration::from_micros(50));
        assert_eq!(cfg.logging.log_level, "info");
    }

    #[test]
    fn test_deserialize_empty_toml_uses_defaults() {
        let cfg: AppConfig = toml::from_str("").expect("empty config");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_deserialize_partial_sections_override_defaults() {
        // Arrange
        let toml_str = r#"
[server]
host = "10.0.0.5"

[connection]
retry_interval_ms = 250
"#;

        // Act
        let cfg: AppConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.server.host, "10.0.0.5");
        assert_eq!(cfg.server.port, 1985);
        assert_eq!(
            cfg.connection.retry_policy().interval,
            Duration::from_millis(250)
        );
        assert_eq!(cfg.connection.progress_every, 1000);
    }

    #[test]
    fn test_app_config_serializes_and_deserializes_round_trip() {
        let mut cfg = AppConfig::default();
        cfg.server.port = 6502;
        cfg.logging.log_level = "debug".to_string();

        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let restored: AppConfig = toml::from_str(&toml_str).expect("deserialize");

        assert_eq!(cfg, restored);
    }

    #[test]
    fn test_load_config_from_missing_file_returns_defaults() {
        let path = PathBuf::from("/nonexistent/path/that/cannot/exist/config.toml");
        let cfg = load_config_from(&path).expect("missing file is not an error");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_load_config_from_reads_file() {
        // Arrange
        let path = scratch_file("reads", "[server]\nport = 7000\n");

        // Act
        let cfg = load_config_from(&path).expect("load");

        // Assert
        assert_eq!(cfg.server.port, 7000);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_config_from_malformed_file_is_parse_error() {
        let path = scratch_file("malformed", "[[[ not valid toml");

        let result = load_config_from(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_config_from_directory_is_io_error() {
        let dir = std::env::temp_dir();
        assert!(matches!(
            load_config_from(&dir),
            Err(ConfigError::Io { .. })
        ));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_config_file_path_ends_with_app_dir() {
        if let Ok(path) = config_file_path() {
            assert!(path.ends_with("smartport-bridge/config.toml"));
        }
    }
}
