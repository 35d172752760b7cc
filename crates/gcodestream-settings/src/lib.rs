//! gcodestream Settings Crate
//!
//! Handles the streamer configuration file: defaults, loading, saving and
//! validation.

pub mod config;
pub mod error;

pub use config::{
    ConnectionSettings, StreamerConfig, StreamingSettings, CONFIG_DIR_NAME, CONFIG_FILE_NAME,
    MIN_RESET_DELAY_MS,
};
pub use error::{ConfigError, ConfigResult, SettingsError, SettingsResult};
