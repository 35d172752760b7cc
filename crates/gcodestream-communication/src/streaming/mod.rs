//! Acknowledgment-paced streaming
//!
//! The handshake engine sends one instruction, waits for its `ok`, and only
//! then sends the next. The controller's receive buffer is small; keeping
//! exactly one instruction in flight is the flow control.

pub mod abort;
pub mod listener;
pub mod session;

pub use abort::send_safety_shutdown;
pub use listener::{ConsoleListener, NoOpListener, StreamListener};
pub use session::{
    SessionOutcome, SessionReport, StreamConfig, StreamSession, StreamState,
    DEFAULT_ACK_TIMEOUT,
};
