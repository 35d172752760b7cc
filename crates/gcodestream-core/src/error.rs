//! Error handling for gcodestream
//!
//! Provides the error types for every layer of the streamer:
//! - Transport errors (serial link open/write/read)
//! - Stream errors (handshake failures, input source failures)
//!
//! All error types use `thiserror` for ergonomic error handling.
//! Transport errors are classified as recoverable or fatal so the
//! handshake engine never has to guess from a generic failure.

use std::time::Duration;
use thiserror::Error;

/// Transport error type
///
/// Represents errors raised by the connection to the controller.
/// Only [`TransportError::Undecodable`] is recoverable; every other
/// variant means the link can no longer be trusted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Failed to open the port
    #[error("Failed to open port {port}: {reason}")]
    FailedToOpen {
        /// The name of the port that failed to open.
        port: String,
        /// The reason the port failed to open.
        reason: String,
    },

    /// Writing a line to the controller failed
    #[error("Write failed: {reason}")]
    WriteFailed {
        /// The reason for the write failure.
        reason: String,
    },

    /// Reading from the controller failed at the I/O level
    #[error("Read failed: {reason}")]
    ReadFailed {
        /// The reason for the read failure.
        reason: String,
    },

    /// A complete line arrived but could not be decoded as text
    #[error("Undecodable response ({length} bytes): {reason}")]
    Undecodable {
        /// Length of the raw line in bytes.
        length: usize,
        /// The decoder's complaint.
        reason: String,
    },

    /// No complete line arrived within the read timeout
    #[error("No response within {timeout_ms}ms")]
    ResponseTimeout {
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// The transport was already closed
    #[error("Port closed")]
    Closed,
}

impl TransportError {
    /// Create a timeout error from a duration
    pub fn timeout(timeout: Duration) -> Self {
        Self::ResponseTimeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    /// Check if the error can be recovered by retrying the read
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Undecodable { .. })
    }

    /// Check if this is a read timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ResponseTimeout { .. })
    }
}

/// Stream error type
///
/// Represents the conditions that end a streaming session early.
/// Every variant is fatal and routes through the abort sequence.
#[derive(Error, Debug)]
pub enum StreamError {
    /// Fatal transport failure while sending or reading
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The controller went silent while an instruction was in flight
    #[error("No acknowledgment for '{line}' within {timeout_ms}ms")]
    AckTimeout {
        /// The instruction awaiting acknowledgment.
        line: String,
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// The controller never announced itself after reset
    #[error("Controller did not report ready within {timeout_ms}ms")]
    BannerTimeout {
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// Reading the instruction file failed mid-stream
    #[error("Input error: {0}")]
    Input(#[from] std::io::Error),
}

impl StreamError {
    /// Check if this error must end the session.
    ///
    /// Only decode glitches are survivable; the session retries those
    /// in place and never surfaces them.
    pub fn is_fatal(&self) -> bool {
        match self {
            StreamError::Transport(e) => !e.is_recoverable(),
            _ => true,
        }
    }

    /// Check if this error was caused by the serial link itself
    pub fn is_transport_error(&self) -> bool {
        matches!(self, StreamError::Transport(_))
    }

    /// Check if this is any kind of timeout
    pub fn is_timeout(&self) -> bool {
        match self {
            StreamError::AckTimeout { .. } | StreamError::BannerTimeout { .. } => true,
            StreamError::Transport(e) => e.is_timeout(),
            StreamError::Input(_) => false,
        }
    }
}

/// Main error type for gcodestream
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport error
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a transport error
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_decode_errors_are_recoverable() {
        let glitch = TransportError::Undecodable {
            length: 4,
            reason: "invalid utf-8".to_string(),
        };
        assert!(glitch.is_recoverable());

        assert!(!TransportError::Closed.is_recoverable());
        assert!(!TransportError::WriteFailed {
            reason: "broken pipe".to_string()
        }
        .is_recoverable());
        assert!(!TransportError::timeout(Duration::from_secs(1)).is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let err = TransportError::timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "No response within 1500ms");

        let err = StreamError::AckTimeout {
            line: "G28".to_string(),
            timeout_ms: 200,
        };
        assert_eq!(err.to_string(), "No acknowledgment for 'G28' within 200ms");
        assert!(err.is_timeout());
    }

    #[test]
    fn test_error_conversion() {
        let err: StreamError = TransportError::Closed.into();
        assert!(err.is_transport_error());
        assert!(err.is_fatal());

        let glitch: StreamError = TransportError::Undecodable {
            length: 1,
            reason: "invalid utf-8".to_string(),
        }
        .into();
        assert!(!glitch.is_fatal());

        let err: Error = TransportError::Closed.into();
        assert!(err.is_transport_error());

        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
