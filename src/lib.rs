//! # gcodestream
//!
//! Acknowledgment-paced G-code streamer for 3D printer controllers.
//!
//! Sends a G-code file to a Marlin-style controller over a serial link, one
//! line at a time, waiting for `ok` after each. Progress, heater telemetry
//! and a final duration line are printed to standard output for whatever
//! supervises the process. Any fatal link failure sends a safety shutdown
//! block and exits with status 1.
//!
//! ## Architecture
//!
//! gcodestream is organized as a workspace with multiple crates:
//!
//! 1. **gcodestream-core** - Error taxonomy, line normalization, progress estimation
//! 2. **gcodestream-communication** - Serial transport, Marlin responses, streaming session
//! 3. **gcodestream-settings** - Config file model and validation
//! 4. **gcodestream** - Main binary that wires the crates together

pub mod cli;

pub use cli::Cli;

use anyhow::Context;
use gcodestream_communication::{
    list_ports, ConnectionParams, ConsoleListener, SerialTransport, StreamConfig, StreamSession,
};
use gcodestream_core::InstructionSource;
use gcodestream_settings::StreamerConfig;
use std::path::Path;
use std::time::Duration;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Map a repeated `-v` count to the default log level
pub fn verbosity_level(verbosity: u8) -> tracing::level_filters::LevelFilter {
    use tracing::level_filters::LevelFilter;

    match verbosity {
        0 => LevelFilter::OFF,
        1 => LevelFilter::ERROR,
        2 => LevelFilter::WARN,
        3 => LevelFilter::INFO,
        _ => LevelFilter::DEBUG,
    }
}

/// Initialize logging
///
/// Sets up structured logging with:
/// - Level from the `-v` count, overridden by RUST_LOG
/// - Output appended to `log_file`, or standard error when it is absent or
///   cannot be opened
/// - Target, level, file and line number on every record
pub fn init_logging(verbosity: u8, log_file: Option<&Path>) -> anyhow::Result<()> {
    use std::fs::OpenOptions;
    use std::sync::Mutex;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::builder()
        .with_default_directive(verbosity_level(verbosity).into())
        .from_env_lossy();

    let mut open_error = None;
    let file = log_file.and_then(|path| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| open_error = Some((path.to_path_buf(), e)))
            .ok()
    });

    match file {
        Some(file) => {
            let fmt_layer = fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(true)
                .with_level(true)
                .with_file(true)
                .with_line_number(true);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .try_init()?;
        }
        None => {
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true)
                .with_file(true)
                .with_line_number(true);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .try_init()?;
        }
    }

    if let Some((path, e)) = open_error {
        tracing::warn!(
            "Cannot open log file {}: {}; logging to stderr",
            path.display(),
            e
        );
    }

    Ok(())
}

/// Load the config file named on the command line, or the default one,
/// then apply the command-line overrides
pub fn load_config(cli: &Cli) -> anyhow::Result<StreamerConfig> {
    let mut config = match &cli.config {
        Some(path) => StreamerConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => StreamerConfig::load_default().context("Failed to load default config")?,
    };

    cli.apply_to(&mut config);
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Session settings derived from the config
pub fn stream_config(config: &StreamerConfig) -> StreamConfig {
    StreamConfig {
        ack_timeout: Duration::from_millis(config.streaming.ack_timeout_ms),
        metric: config.streaming.progress_metric,
        sample_interval: config.streaming.sample_interval,
        wait_for_init: config.connection.wait_for_init,
    }
}

/// Serial parameters derived from the config
pub fn connection_params(config: &StreamerConfig) -> ConnectionParams {
    ConnectionParams::new(config.connection.port.as_str())
        .with_baud_rate(config.connection.baud_rate)
        .with_reset_delay(Duration::from_millis(config.connection.reset_delay_ms))
}

/// Run the streamer and return the process exit status.
///
/// Setup failures (bad config, unreadable file, port that will not open)
/// are returned as errors; no session exists yet, so nothing is sent.
pub fn run(cli: Cli) -> anyhow::Result<u8> {
    tracing::info!("gcodestream {} (built {})", VERSION, BUILD_DATE);

    if cli.list_ports {
        for port in list_ports()? {
            println!("{}\t{}", port.port_name, port.description);
        }
        return Ok(0);
    }

    let config = load_config(&cli)?;
    let path = cli.file.as_deref().context("No G-code file given")?;

    let source = InstructionSource::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let params = connection_params(&config);
    let transport = SerialTransport::open(&params)
        .with_context(|| format!("Failed to connect to {}", params.port))?;

    let session = StreamSession::new(
        transport,
        source,
        stream_config(&config),
        Box::new(ConsoleListener::stdout()),
    )
    .with_context(|| format!("Failed to read {}", path.display()))?;

    let outcome = session.run();
    if let Some(error) = outcome.error() {
        tracing::error!("Print aborted: {}", error);
    }
    Ok(outcome.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use gcodestream_core::ProgressMetric;
    use std::fs;
    use tempfile::TempDir;
    use tracing::level_filters::LevelFilter;

    /// Config file in a temp dir so the user's own config never leaks in
    fn config_file(dir: &TempDir, content: &str) -> String {
        let path = dir.path().join("gcodestream.toml");
        fs::write(&path, content).unwrap();
        path.display().to_string()
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(verbosity_level(0), LevelFilter::OFF);
        assert_eq!(verbosity_level(1), LevelFilter::ERROR);
        assert_eq!(verbosity_level(2), LevelFilter::WARN);
        assert_eq!(verbosity_level(3), LevelFilter::INFO);
        assert_eq!(verbosity_level(4), LevelFilter::DEBUG);
        assert_eq!(verbosity_level(9), LevelFilter::DEBUG);
    }

    #[test]
    fn test_config_file_then_flags() {
        let dir = TempDir::new().unwrap();
        let config = config_file(
            &dir,
            "[connection]\nport = \"/dev/ttyUSB3\"\nbaud_rate = 57600\n\n[streaming]\nack_timeout_ms = 5000\nsample_interval = 5\n",
        );

        let cli = Cli::try_parse_from([
            "gcodestream",
            "-f",
            "part.gcode",
            "-c",
            config.as_str(),
            "-b",
            "250000",
            "--metric",
            "extrusion",
        ])
        .unwrap();
        let config = load_config(&cli).unwrap();

        let stream = stream_config(&config);
        assert_eq!(stream.ack_timeout, Duration::from_secs(5));
        assert_eq!(stream.sample_interval, 5);
        assert_eq!(stream.metric, ProgressMetric::Extrusion);
        assert!(!stream.wait_for_init);

        let params = connection_params(&config);
        assert_eq!(params.port, "/dev/ttyUSB3");
        assert_eq!(params.baud_rate, 250_000);
        assert_eq!(params.reset_delay, Duration::from_millis(100));
    }

    #[test]
    fn test_invalid_config_is_a_setup_error() {
        let dir = TempDir::new().unwrap();
        let config = config_file(&dir, "[connection]\nreset_delay_ms = 10\n");

        let cli = Cli::try_parse_from(["gcodestream", "-f", "part.gcode", "-c", config.as_str()])
            .unwrap();
        assert!(load_config(&cli).is_err());
        assert!(run(cli).is_err());
    }

    #[test]
    fn test_missing_gcode_file_is_a_setup_error() {
        let dir = TempDir::new().unwrap();
        let config = config_file(&dir, "");
        let missing = dir.path().join("missing.gcode");

        let cli = Cli::try_parse_from([
            "gcodestream",
            "-f",
            missing.to_str().unwrap(),
            "-c",
            config.as_str(),
        ])
        .unwrap();

        let err = run(cli).unwrap_err();
        assert!(err.to_string().contains("missing.gcode"));
    }

    #[test]
    fn test_unopenable_port_is_a_setup_error() {
        let dir = TempDir::new().unwrap();
        let config = config_file(&dir, "");
        let gcode = dir.path().join("part.gcode");
        fs::write(&gcode, "G28\nG1 X10 Y10\n").unwrap();
        let port = dir.path().join("no-such-tty");

        let cli = Cli::try_parse_from([
            "gcodestream",
            "-f",
            gcode.to_str().unwrap(),
            "-c",
            config.as_str(),
            "-p",
            port.to_str().unwrap(),
        ])
        .unwrap();

        let err = run(cli).unwrap_err();
        assert!(err.to_string().contains("no-such-tty"));
    }
}
