//! Stream listener interface
//!
//! Defines the listener trait for session status and the console
//! implementation that writes the line-oriented status contract to stdout.

use gcodestream_core::{format_finished, ProgressSample, StreamError};
use std::io::{self, Write};
use std::time::Duration;

/// Listener trait for session status
///
/// Implement this trait to receive progress, telemetry and completion
/// notifications from a [`crate::StreamSession`].
pub trait StreamListener {
    /// Called when a progress sample is due
    fn on_progress(&mut self, _sample: &ProgressSample) {}

    /// Called for every temperature report received
    fn on_telemetry(&mut self, _line: &str) {}

    /// Called once when the session aborts, before the safety block is sent
    fn on_abort(&mut self, _error: &StreamError) {}

    /// Called exactly once when the session ends, whatever the outcome
    fn on_finished(&mut self, _elapsed: Duration) {}
}

/// Listener that ignores everything
#[derive(Debug, Default)]
pub struct NoOpListener;

impl StreamListener for NoOpListener {}

/// Writes `Progress:`, `Heating:` and `Finished in` lines, one per event.
///
/// Each line is flushed immediately so a supervisor tailing the output sees
/// it without delay. Write failures are logged and otherwise ignored: a
/// closed stdout must not interrupt a running print.
#[derive(Debug)]
pub struct ConsoleListener<W: Write = io::Stdout> {
    out: W,
}

impl ConsoleListener<io::Stdout> {
    /// Create a listener writing to standard output
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> ConsoleListener<W> {
    /// Create a listener writing to any sink
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Consume the listener and return the sink
    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, line: &str) {
        if let Err(e) = writeln!(self.out, "{}", line).and_then(|_| self.out.flush()) {
            tracing::warn!("Failed to write status line: {}", e);
        }
    }
}

impl<W: Write> StreamListener for ConsoleListener<W> {
    fn on_progress(&mut self, sample: &ProgressSample) {
        self.emit(&sample.to_string());
    }

    fn on_telemetry(&mut self, line: &str) {
        self.emit(&format!("Heating: {}", line));
    }

    fn on_finished(&mut self, elapsed: Duration) {
        self.emit(&format_finished(elapsed));
    }
}
