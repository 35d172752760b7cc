//! Firmware protocol implementations
//!
//! Only the Marlin-style line protocol is spoken: one instruction per line,
//! `ok` as the acknowledgment, temperature reports and busy heartbeats
//! interleaved with the acknowledgments.

pub mod marlin;

pub use marlin::{ControllerResponse, ResponseParser};
