//! # gcodestream Communication
//!
//! Connection and protocol layer for gcodestream.
//! Provides the serial transport, Marlin response classification, and the
//! acknowledgment-paced streaming session with its abort sequence.

pub mod communication;
pub mod firmware;
pub mod streaming;

pub use communication::{
    list_ports, serial::DEFAULT_BAUD_RATE, serial::DEFAULT_PORT, ConnectionParams,
    SerialPortInfo, SerialTransport, Transport,
};

pub use firmware::marlin::{is_init_banner, ControllerResponse, ResponseParser, SAFETY_SHUTDOWN};

pub use streaming::{
    send_safety_shutdown, ConsoleListener, NoOpListener, SessionOutcome, SessionReport,
    StreamConfig, StreamListener, StreamSession, StreamState, DEFAULT_ACK_TIMEOUT,
};
