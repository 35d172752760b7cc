//! Configuration management for gcodestream
//!
//! Provides configuration file handling and validation.
//! Supports JSON and TOML file formats; the default file lives in the
//! platform-specific config directory.
//!
//! Configuration is organized into two sections:
//! - Connection settings (port, baud rate, reset handshake)
//! - Streaming settings (acknowledgment timeout, progress accounting)
//!
//! Precedence is defaults, then the config file, then command-line flags.
//! The last layer is applied by the binary.

use crate::error::{ConfigError, ConfigResult, SettingsError, SettingsResult};
use gcodestream_core::{ProgressMetric, DEFAULT_SAMPLE_INTERVAL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory under the platform config dir holding our files
pub const CONFIG_DIR_NAME: &str = "gcodestream";

/// Default config file name
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Shortest settle time accepted for the reset handshake
pub const MIN_RESET_DELAY_MS: u64 = 100;

#[cfg(windows)]
const DEFAULT_PORT: &str = "COM1";
#[cfg(not(windows))]
const DEFAULT_PORT: &str = "/dev/ttyUSB0";

/// Connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Serial device path
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Settle time around the reset input flush, in milliseconds
    pub reset_delay_ms: u64,
    /// Wait for the controller's boot banner before streaming
    pub wait_for_init: bool,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baud_rate: 115_200,
            reset_delay_ms: MIN_RESET_DELAY_MS,
            wait_for_init: false,
        }
    }
}

/// Streaming settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingSettings {
    /// Longest controller silence tolerated per instruction, in milliseconds
    pub ack_timeout_ms: u64,
    /// Progress accounting strategy
    pub progress_metric: ProgressMetric,
    /// Acknowledged moves between progress lines (line metric only)
    pub sample_interval: u32,
}

impl Default for StreamingSettings {
    fn default() -> Self {
        Self {
            ack_timeout_ms: 120_000,
            progress_metric: ProgressMetric::Lines,
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
        }
    }
}

/// Complete streamer configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamerConfig {
    /// Connection settings
    pub connection: ConnectionSettings,
    /// Streaming settings
    pub streaming: StreamingSettings,
}

/// Supported file formats, chosen by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Toml,
}

impl Format {
    fn from_path(path: &Path) -> ConfigResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Self::Json),
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Ok(Self::Toml),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }
}

impl StreamerConfig {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and validate a `.json` or `.toml` config file
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = Format::from_path(path)?;
        let content = std::fs::read_to_string(path).map_err(|e| SettingsError::LoadError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Validate and write the config as `.json` or `.toml`
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match Format::from_path(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        std::fs::write(path, content).map_err(|e| SettingsError::SaveError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        tracing::debug!("Saved config to {}", path.display());
        Ok(())
    }

    /// Load the config file from the platform config directory.
    ///
    /// Returns defaults when no file exists there.
    pub fn load_default() -> SettingsResult<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from_file(&path)
    }

    /// Path of the default config file
    pub fn default_path() -> SettingsResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
            .ok_or_else(|| {
                SettingsError::ConfigDirectory("platform config directory unknown".to_string())
            })
    }

    /// Check every value against its allowed range
    pub fn validate(&self) -> ConfigResult<()> {
        if self.connection.port.trim().is_empty() {
            return Err(ConfigError::out_of_range(
                "connection.port",
                "\"\"",
                "must not be empty",
            ));
        }

        if self.connection.baud_rate == 0 {
            return Err(ConfigError::out_of_range(
                "connection.baud_rate",
                self.connection.baud_rate,
                "must be > 0",
            ));
        }

        if self.connection.reset_delay_ms < MIN_RESET_DELAY_MS {
            return Err(ConfigError::out_of_range(
                "connection.reset_delay_ms",
                self.connection.reset_delay_ms,
                format!("must be >= {}", MIN_RESET_DELAY_MS),
            ));
        }

        if self.streaming.ack_timeout_ms == 0 {
            return Err(ConfigError::out_of_range(
                "streaming.ack_timeout_ms",
                self.streaming.ack_timeout_ms,
                "must be > 0",
            ));
        }

        if self.streaming.sample_interval == 0 {
            return Err(ConfigError::out_of_range(
                "streaming.sample_interval",
                self.streaming.sample_interval,
                "must be > 0",
            ));
        }

        Ok(())
    }
}
