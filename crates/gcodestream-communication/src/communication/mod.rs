//! Controller connection layer
//!
//! Defines the [`Transport`] seam between the handshake engine and the
//! physical link, plus the serial implementation used in production.

pub mod serial;

use gcodestream_core::TransportError;
use std::time::Duration;

pub use serial::{list_ports, ConnectionParams, SerialPortInfo, SerialTransport};

/// Line-oriented connection to a controller
///
/// Implementations own the link exclusively. The handshake engine relies on
/// the error classification: [`TransportError::Undecodable`] is retried,
/// [`TransportError::ResponseTimeout`] becomes an acknowledgment timeout, and
/// everything else aborts the session.
pub trait Transport {
    /// Send one instruction, appending the newline terminator
    fn send_line(&mut self, line: &str) -> Result<(), TransportError>;

    /// Block until a full line arrives or `timeout` passes without one.
    ///
    /// The returned text is trimmed.
    fn read_line(&mut self, timeout: Duration) -> Result<String, TransportError>;

    /// Release the link. Calling this more than once is a no-op.
    fn close(&mut self) -> Result<(), TransportError>;

    /// Check if the link is still open
    fn is_open(&self) -> bool;

    /// Human-readable name of the link for logging
    fn name(&self) -> String;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send_line(&mut self, line: &str) -> Result<(), TransportError> {
        (**self).send_line(line)
    }

    fn read_line(&mut self, timeout: Duration) -> Result<String, TransportError> {
        (**self).read_line(timeout)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn name(&self) -> String {
        (**self).name()
    }
}
