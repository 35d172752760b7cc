//! Marlin-style controller protocol

pub mod commands;
pub mod response_parser;

pub use commands::{is_init_banner, SAFETY_SHUTDOWN};
pub use response_parser::{ControllerResponse, ResponseParser};
