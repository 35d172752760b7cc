//! Instruction normalization
//!
//! Turns raw lines from a G-code file into the form sent over the wire:
//! - End-of-line characters are stripped
//! - Everything from the first `;` onward is a comment and is dropped
//! - Surrounding whitespace is trimmed
//!
//! A line that is empty after these steps is a no-op: it is never
//! transmitted and no acknowledgment is expected for it.

use crate::progress::ProgressMetric;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// Comment delimiter for G-code lines
pub const COMMENT_DELIMITER: char = ';';

/// Motion command token
const MOTION_TOKEN: &str = "G1";

/// Motion command with a Z word directly after the token
const Z_MOVE_PREFIX: &str = "G1 Z";

/// Classification of a normalized instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionKind {
    /// Linear move (`G1`)
    Motion,
    /// Linear move starting with a Z word (`G1 Z...`), counted as a layer change
    MotionWithZ,
    /// Anything else (temperatures, fans, homing, ...)
    Other,
}

impl InstructionKind {
    /// Classify a normalized command
    pub fn classify(command: &str) -> Self {
        if !is_motion(command) {
            Self::Other
        } else if command.starts_with(Z_MOVE_PREFIX) {
            Self::MotionWithZ
        } else {
            Self::Motion
        }
    }
}

/// One normalized, transmittable instruction
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Normalized command text, without terminator
    pub command: String,
    /// Classification of the command
    pub kind: InstructionKind,
    /// Extrusion delta commanded by the instruction, never negative
    pub extrusion: f64,
}

impl Instruction {
    /// Normalize a raw line.
    ///
    /// Returns `None` when the line is a no-op (blank, whitespace or
    /// comment only).
    pub fn parse(raw: &str) -> Option<Self> {
        let command = normalize(raw);
        if command.is_empty() {
            return None;
        }

        Some(Self {
            command: command.to_string(),
            kind: InstructionKind::classify(command),
            extrusion: extrusion_delta(command),
        })
    }

    /// Check if this is a motion instruction (with or without Z)
    pub fn is_motion(&self) -> bool {
        !matches!(self.kind, InstructionKind::Other)
    }

    /// Check if this motion starts a new layer
    pub fn is_z_move(&self) -> bool {
        self.kind == InstructionKind::MotionWithZ
    }
}

/// Strip line terminators, comments and surrounding whitespace
pub fn normalize(raw: &str) -> &str {
    let line = raw.trim_end_matches(['\r', '\n']);
    let line = match line.find(COMMENT_DELIMITER) {
        Some(pos) => &line[..pos],
        None => line,
    };
    line.trim()
}

/// Check if a normalized command is a `G1` move.
///
/// `G1` must be a whole token: `G10`/`G11` (firmware retract) are not moves.
fn is_motion(command: &str) -> bool {
    match command.strip_prefix(MOTION_TOKEN) {
        Some(rest) => !rest.starts_with(|c: char| c.is_ascii_digit() || c == '.'),
        None => false,
    }
}

/// Extract the extrusion delta from the last `E` word of a command.
///
/// Absent, unparsable, negative or non-finite values yield 0.
pub fn extrusion_delta(command: &str) -> f64 {
    command
        .split_whitespace()
        .filter_map(|word| word.strip_prefix('E'))
        .last()
        .and_then(|value| value.parse::<f64>().ok())
        .filter(|value| value.is_finite() && *value > 0.0)
        .unwrap_or(0.0)
}

/// Line source for a streaming session
///
/// Wraps the instruction file so the total progress metric can be measured
/// in a pre-pass and then streamed from the start again.
#[derive(Debug)]
pub struct InstructionSource<R> {
    reader: BufReader<R>,
    line_number: usize,
    buffer: Vec<u8>,
}

impl InstructionSource<File> {
    /// Open an instruction file
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::new(File::open(path)?))
    }
}

impl<R: Read + Seek> InstructionSource<R> {
    /// Wrap a seekable reader
    pub fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            line_number: 0,
            buffer: Vec::new(),
        }
    }

    /// Sum the metric over every instruction in the source, then rewind.
    pub fn measure(&mut self, metric: ProgressMetric) -> io::Result<f64> {
        self.rewind()?;

        let mut total = 0.0;
        while let Some(line) = self.next_line()? {
            if let Some(instruction) = Instruction::parse(&line) {
                total += metric.contribution(&instruction);
            }
        }

        self.rewind()?;
        Ok(total)
    }

    /// Read the next raw line, including its terminator.
    ///
    /// Bytes that are not valid UTF-8 are replaced rather than rejected;
    /// G-code is plain ASCII and a stray byte must not stop a print.
    pub fn next_line(&mut self) -> io::Result<Option<String>> {
        self.buffer.clear();
        if self.reader.read_until(b'\n', &mut self.buffer)? == 0 {
            return Ok(None);
        }
        self.line_number += 1;
        Ok(Some(String::from_utf8_lossy(&self.buffer).into_owned()))
    }

    /// 1-based number of the line last returned by [`Self::next_line`]
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Seek back to the first line
    pub fn rewind(&mut self) -> io::Result<()> {
        self.reader.seek(SeekFrom::Start(0))?;
        self.line_number = 0;
        Ok(())
    }
}
