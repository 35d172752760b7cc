//! Command-line surface
//!
//! Flags override values from the config file, which override the
//! built-in defaults.

use clap::{ArgAction, Parser};
use gcodestream_core::ProgressMetric;
use gcodestream_settings::StreamerConfig;
use std::path::PathBuf;

/// Version string shown by `--version`
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (built ",
    env!("BUILD_DATE"),
    ")"
);

/// Stream a G-code file to a 3D printer controller, one acknowledged line at a time
#[derive(Parser, Debug, Clone)]
#[command(name = "gcodestream", version = LONG_VERSION, about)]
pub struct Cli {
    /// Serial device of the controller [default: /dev/ttyUSB0, COM1 on Windows]
    #[arg(short, long)]
    pub port: Option<String>,

    /// G-code file to stream
    #[arg(short, long, required_unless_present = "list_ports")]
    pub file: Option<PathBuf>,

    /// Increase log verbosity (-v errors, -vv warnings, -vvv info, -vvvv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Append logs to this file instead of standard error
    #[arg(short = 'l', long = "log_file", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Config file (.toml or .json)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Baud rate
    #[arg(short, long)]
    pub baud: Option<u32>,

    /// Progress accounting: lines or extrusion
    #[arg(long)]
    pub metric: Option<ProgressMetric>,

    /// Abort when the controller stays silent this long while a line is in flight
    #[arg(long, value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..))]
    pub ack_timeout: Option<u64>,

    /// Wait for the controller's init banner before streaming
    #[arg(long)]
    pub wait_for_init: bool,

    /// List detected controller ports and exit
    #[arg(long)]
    pub list_ports: bool,
}

impl Cli {
    /// Overlay the flags that were given onto a loaded config
    pub fn apply_to(&self, config: &mut StreamerConfig) {
        if let Some(port) = &self.port {
            config.connection.port = port.clone();
        }
        if let Some(baud) = self.baud {
            config.connection.baud_rate = baud;
        }
        if self.wait_for_init {
            config.connection.wait_for_init = true;
        }
        if let Some(metric) = self.metric {
            config.streaming.progress_metric = metric;
        }
        if let Some(seconds) = self.ack_timeout {
            config.streaming.ack_timeout_ms = seconds.saturating_mul(1000);
        }
    }
}
