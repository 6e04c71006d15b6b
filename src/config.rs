//! Configuration management module.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::llrp::IMPINJ_VENDOR_ID;

/// Configuration load result.
#[derive(Debug)]
pub enum ConfigLoadResult {
    /// Config loaded successfully.
    Loaded(AppConfig),
    /// Config file missing, defaults apply.
    Missing,
    /// Config file exists but invalid.
    Invalid(ConfigError),
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub reader: ReaderConfig,
    pub session: SessionConfig,
    pub monitor: MonitorConfig,
    pub operation: OperationConfig,
    pub prerequisites: PrerequisiteConfig,
    pub logging: LoggingConfig,
}

/// Reader connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Reader host name or address.
    #[serde(default)]
    pub host: String,
    /// LLRP port (default: 5084).
    #[serde(default = "default_port")]
    pub port: u16,
    /// TCP connect timeout in seconds (default: 10).
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Largest inbound frame accepted (default: 32 KiB).
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

fn default_port() -> u16 {
    crate::llrp::DEFAULT_PORT
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_max_frame_bytes() -> usize {
    32 * 1024
}

/// Session behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// 0 = quiet, 1 = progress, 2 = message dumps.
    #[serde(default)]
    pub verbosity: u8,
    #[serde(default = "default_transact_timeout_ms")]
    pub transact_timeout_ms: u64,
    /// How long to wait for the reader's connection event.
    #[serde(default = "default_connection_status_wait_ms")]
    pub connection_status_wait_ms: u64,
    /// Capacity of one report line, terminator included.
    #[serde(default = "default_line_capacity")]
    pub line_capacity: usize,
}

fn default_transact_timeout_ms() -> u64 {
    5000
}

fn default_connection_status_wait_ms() -> u64 {
    10_000
}

fn default_line_capacity() -> usize {
    1024
}

/// Report collection window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,
    /// Request reports from the reader at this interval instead of streaming.
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    #[serde(default = "default_recv_slice_ms")]
    pub recv_slice_ms: u64,
}

fn default_duration_secs() -> u64 {
    60
}

fn default_recv_slice_ms() -> u64 {
    1000
}

/// What the access specification does to each tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationConfig {
    /// Scenario number, see [`crate::session::Scenario`].
    pub scenario: u8,
    /// Current access password.
    pub password: u32,
    /// Password installed by the set-password scenario.
    pub new_password: u32,
    /// Reduce read range when switching to the private profile.
    pub short_range: bool,
    /// Ask the reader to backscatter the serialized TID.
    pub backscatter_tid: bool,
}

/// How strictly the firmware version is checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FirmwareCheck {
    /// Reject only when both major and minor fall below the minimum.
    #[default]
    Lenient,
    /// Reject anything below the minimum (major, minor).
    Strict,
}

/// Device requirements checked against the capabilities response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrerequisiteConfig {
    #[serde(default = "default_manufacturer")]
    pub manufacturer: u32,
    /// Minimum "major.minor" firmware version.
    #[serde(default = "default_min_firmware")]
    pub min_firmware: String,
    #[serde(default)]
    pub firmware_check: FirmwareCheck,
}

fn default_manufacturer() -> u32 {
    IMPINJ_VENDOR_ID
}

fn default_min_firmware() -> String {
    "4.4".to_string()
}

/// Log output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Also write a daily rolling log file here.
    pub directory: Option<PathBuf>,
}

impl AppConfig {
    /// Get config file path in the user's config directory.
    pub fn default_path() -> PathBuf {
        ProjectDirs::from("", "", "llrp-inventory")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Attempt to load config with detailed result.
    pub fn try_load(path: &Path) -> ConfigLoadResult {
        if !path.exists() {
            return ConfigLoadResult::Missing;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<AppConfig>(&content) {
                Ok(config) => match config.validate() {
                    Ok(()) => ConfigLoadResult::Loaded(config),
                    Err(e) => ConfigLoadResult::Invalid(e),
                },
                Err(e) => ConfigLoadResult::Invalid(ConfigError::Parse(e)),
            },
            Err(e) => ConfigLoadResult::Invalid(ConfigError::Read(e)),
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reader.port == 0 {
            return Err(ConfigError::Validation("Reader port must be greater than 0".to_string()));
        }
        if self.reader.connect_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "Connect timeout must be at least 1 second".to_string(),
            ));
        }
        if self.reader.max_frame_bytes < 64 {
            return Err(ConfigError::Validation("Max frame size must be at least 64 bytes".to_string()));
        }
        if self.session.verbosity > 2 {
            return Err(ConfigError::Validation("Verbosity must be 0, 1 or 2".to_string()));
        }
        if self.session.transact_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "Transaction timeout must be greater than 0".to_string(),
            ));
        }
        if self.session.line_capacity < 2 {
            return Err(ConfigError::Validation("Line capacity must be at least 2".to_string()));
        }
        if self.monitor.recv_slice_ms == 0 {
            return Err(ConfigError::Validation("Receive slice must be greater than 0".to_string()));
        }
        if self.monitor.poll_interval_secs == Some(0) {
            return Err(ConfigError::Validation("Poll interval must be at least 1 second".to_string()));
        }
        if self.operation.scenario > 11 {
            return Err(ConfigError::Validation("Scenario must be between 0 and 11".to_string()));
        }
        if parse_major_minor(&self.prerequisites.min_firmware).is_none() {
            return Err(ConfigError::Validation(format!(
                "Minimum firmware '{}' is not a major.minor version",
                self.prerequisites.min_firmware
            )));
        }
        Ok(())
    }

    /// Save configuration to file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl PrerequisiteConfig {
    /// Minimum (major, minor) firmware version.
    pub fn min_version(&self) -> (u32, u32) {
        parse_major_minor(&self.min_firmware).unwrap_or((4, 4))
    }
}

/// Parse the leading "major.minor" of a version string.
pub(crate) fn parse_major_minor(s: &str) -> Option<(u32, u32)> {
    let mut parts = s.split('.');
    let major = parts.next()?.trim().parse().ok()?;
    let minor = parts.next()?.trim().parse().ok()?;
    Some((major, minor))
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            transact_timeout_ms: default_transact_timeout_ms(),
            connection_status_wait_ms: default_connection_status_wait_ms(),
            line_capacity: default_line_capacity(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            duration_secs: default_duration_secs(),
            poll_interval_secs: None,
            recv_slice_ms: default_recv_slice_ms(),
        }
    }
}

impl Default for PrerequisiteConfig {
    fn default() -> Self {
        Self {
            manufacturer: default_manufacturer(),
            min_firmware: default_min_firmware(),
            firmware_check: FirmwareCheck::default(),
        }
    }
}
