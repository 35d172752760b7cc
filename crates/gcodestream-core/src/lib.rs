//! # gcodestream Core
//!
//! Core types and algorithms for gcodestream.
//! Provides the error taxonomy, instruction normalization and
//! progress estimation shared by the transport and the CLI.

pub mod error;
pub mod instruction;
pub mod progress;

pub use error::{Error, Result, StreamError, TransportError};

pub use instruction::{
    extrusion_delta, normalize, Instruction, InstructionKind, InstructionSource,
    COMMENT_DELIMITER,
};

pub use progress::{
    format_finished, hours_minutes, ProgressEstimator, ProgressMetric, ProgressSample,
    DEFAULT_SAMPLE_INTERVAL, LAYER_DISPLAY_OFFSET,
};
