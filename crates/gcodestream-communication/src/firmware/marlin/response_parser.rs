//! Marlin response parser
//!
//! Classifies every line the controller sends while an instruction is in
//! flight. Only `ok` ends the acknowledgment wait; everything else is
//! reported and the wait goes on.

use super::commands::starts_with_ignore_case;
use std::fmt;

/// Acknowledgment token, matched case-insensitively as a prefix
pub const ACK_PREFIX: &str = "ok";

/// Temperature report prefix
pub const TELEMETRY_PREFIX: &str = "T:";

/// Heartbeat sent during long internal operations (homing, leveling)
pub const BUSY_PREFIX: &str = "echo:busy: processing";

/// Classified controller response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerResponse {
    /// The in-flight instruction was accepted
    Ok,
    /// Temperature report, kept verbatim for display
    Telemetry(String),
    /// Controller is busy and has not acknowledged yet
    Busy,
    /// Any other line (echo, debug output, start banner)
    Info(String),
}

impl ControllerResponse {
    /// Check if this response acknowledges the in-flight instruction
    pub fn is_ack(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for ControllerResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Telemetry(line) => write!(f, "telemetry:{}", line),
            Self::Busy => write!(f, "busy"),
            Self::Info(line) => write!(f, "info:{}", line),
        }
    }
}

/// Parser for Marlin protocol responses
#[derive(Debug, Clone, Default)]
pub struct ResponseParser;

impl ResponseParser {
    /// Create a new response parser
    pub fn new() -> Self {
        Self
    }

    /// Classify a single, already trimmed, response line
    pub fn parse(&self, line: &str) -> ControllerResponse {
        if starts_with_ignore_case(line, ACK_PREFIX) {
            return ControllerResponse::Ok;
        }

        if line.starts_with(TELEMETRY_PREFIX) {
            return ControllerResponse::Telemetry(line.to_string());
        }

        if line.starts_with(BUSY_PREFIX) {
            return ControllerResponse::Busy;
        }

        ControllerResponse::Info(line.to_string())
    }
}
