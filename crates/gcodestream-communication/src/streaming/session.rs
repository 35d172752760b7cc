//! Streaming session and handshake engine
//!
//! A [`StreamSession`] owns one instruction source and one transport for its
//! whole lifetime and drives them through the handshake state machine:
//!
//! ```text
//! Ready -> Sending -> AwaitingAck -> Sending (next) ... -> Completed
//!              \            \
//!               +------------+--> Aborting -> Aborted
//! ```
//!
//! Any fatal error while sending or waiting aborts the session, whichever
//! instruction was in flight. The transport is closed on every exit path.

use crate::communication::Transport;
use crate::firmware::marlin::{is_init_banner, ControllerResponse, ResponseParser};
use crate::streaming::abort::send_safety_shutdown;
use crate::streaming::listener::StreamListener;
use gcodestream_core::{
    Instruction, InstructionSource, ProgressEstimator, ProgressMetric, ProgressSample,
    StreamError, DEFAULT_SAMPLE_INTERVAL,
};
use std::fmt;
use std::io::{Read, Seek};
use std::time::{Duration, Instant};

/// Default limit on controller silence while awaiting an acknowledgment
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(120);

/// Handshake engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Session created, nothing sent yet
    Ready,
    /// Writing an instruction to the transport
    Sending,
    /// Instruction in flight, waiting for `ok`
    AwaitingAck,
    /// Fatal failure, safety block being sent
    Aborting,
    /// Every instruction acknowledged
    Completed,
    /// Session ended by a fatal failure
    Aborted,
}

impl StreamState {
    /// Check if the session has ended
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "READY"),
            Self::Sending => write!(f, "SENDING"),
            Self::AwaitingAck => write!(f, "AWAITING_ACK"),
            Self::Aborting => write!(f, "ABORTING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Aborted => write!(f, "ABORTED"),
        }
    }
}

/// Configuration for a streaming session
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    /// Longest silence tolerated while an instruction is in flight
    pub ack_timeout: Duration,
    /// Progress accounting strategy
    pub metric: ProgressMetric,
    /// Acknowledged moves between samples in line mode
    pub sample_interval: u32,
    /// Wait for the controller's `init` banner before the first send
    pub wait_for_init: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            metric: ProgressMetric::Lines,
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            wait_for_init: false,
        }
    }
}

/// Counters describing a finished session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    /// Terminal state
    pub state: StreamState,
    /// Instructions written to the transport (safety block excluded)
    pub transmitted: u64,
    /// Acknowledgment waits entered
    pub ack_waits: u64,
    /// Motion instructions acknowledged
    pub motions_acknowledged: u64,
    /// Progress metric acknowledged
    pub processed: f64,
    /// Progress metric measured before streaming
    pub total: f64,
    /// Z moves acknowledged
    pub z_moves: u64,
    /// Time from the first transmitted motion (or session start) to the end
    pub elapsed: Duration,
}

/// How a session ended
#[derive(Debug)]
pub enum SessionOutcome {
    /// Every instruction was acknowledged
    Completed(SessionReport),
    /// A fatal error ended the session; the safety block was sent
    Aborted {
        /// Counters at the time of the abort
        report: SessionReport,
        /// What went wrong
        error: StreamError,
    },
}

impl SessionOutcome {
    /// Process exit status: 0 when completed, 1 when aborted
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Completed(_) => 0,
            Self::Aborted { .. } => 1,
        }
    }

    /// Check if the session completed
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Session counters
    pub fn report(&self) -> &SessionReport {
        match self {
            Self::Completed(report) => report,
            Self::Aborted { report, .. } => report,
        }
    }

    /// The error that aborted the session, if any
    pub fn error(&self) -> Option<&StreamError> {
        match self {
            Self::Completed(_) => None,
            Self::Aborted { error, .. } => Some(error),
        }
    }
}

/// One streaming session over an exclusively owned transport and source
pub struct StreamSession<T: Transport, R> {
    transport: T,
    source: InstructionSource<R>,
    config: StreamConfig,
    estimator: ProgressEstimator,
    parser: ResponseParser,
    listener: Box<dyn StreamListener>,
    state: StreamState,
    transmitted: u64,
    ack_waits: u64,
    last_fraction: Option<f64>,
}

impl<T: Transport, R: Read + Seek> StreamSession<T, R> {
    /// Create a session, measuring the total metric with a pre-pass.
    ///
    /// The transport is closed if the pre-pass fails.
    pub fn new(
        mut transport: T,
        mut source: InstructionSource<R>,
        config: StreamConfig,
        listener: Box<dyn StreamListener>,
    ) -> Result<Self, StreamError> {
        let total = match source.measure(config.metric) {
            Ok(total) => total,
            Err(e) => {
                let _ = transport.close();
                return Err(StreamError::Input(e));
            }
        };
        tracing::debug!("Total {} metric: {}", config.metric, total);

        Ok(Self {
            estimator: ProgressEstimator::new(config.metric, total, config.sample_interval),
            transport,
            source,
            config,
            parser: ResponseParser::new(),
            listener,
            state: StreamState::Ready,
            transmitted: 0,
            ack_waits: 0,
            last_fraction: None,
        })
    }

    /// Current state of the handshake engine
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Total metric measured before streaming
    pub fn total(&self) -> f64 {
        self.estimator.total()
    }

    /// Stream the whole source and end the session.
    ///
    /// Always closes the transport, always reports the elapsed time to the
    /// listener, and sends the safety block exactly once on abort.
    pub fn run(mut self) -> SessionOutcome {
        let session_start = Instant::now();
        tracing::info!("Starting stream to {}", self.transport.name());

        let result = self.stream();

        let error = match result {
            Ok(()) => {
                self.set_state(StreamState::Completed);
                if let Some(sample) = self.estimator.sample(Instant::now()) {
                    if self.last_fraction.map_or(true, |last| sample.fraction > last) {
                        self.report_progress(&sample);
                    }
                }
                None
            }
            Err(error) => {
                tracing::error!("Stream aborted: {}", error);
                self.set_state(StreamState::Aborting);
                self.listener.on_abort(&error);
                send_safety_shutdown(&mut self.transport);
                self.set_state(StreamState::Aborted);
                Some(error)
            }
        };

        if self.transport.is_open() {
            if let Err(e) = self.transport.close() {
                tracing::warn!("Failed to close {}: {}", self.transport.name(), e);
            }
        }

        let elapsed = self
            .estimator
            .started_at()
            .unwrap_or(session_start)
            .elapsed();
        self.listener.on_finished(elapsed);

        let report = SessionReport {
            state: self.state,
            transmitted: self.transmitted,
            ack_waits: self.ack_waits,
            motions_acknowledged: self.estimator.motions_acknowledged(),
            processed: self.estimator.processed(),
            total: self.estimator.total(),
            z_moves: self.estimator.z_moves(),
            elapsed,
        };
        tracing::info!(
            "Session {} after {} instructions",
            report.state,
            report.transmitted
        );

        match error {
            None => SessionOutcome::Completed(report),
            Some(error) => SessionOutcome::Aborted { report, error },
        }
    }

    fn stream(&mut self) -> Result<(), StreamError> {
        if self.config.wait_for_init {
            self.wait_for_banner()?;
        }

        while let Some(raw) = self.source.next_line()? {
            let Some(instruction) = Instruction::parse(&raw) else {
                continue;
            };

            tracing::debug!(
                "Line: {} Z: {} : {}",
                self.source.line_number(),
                self.estimator.z_moves(),
                instruction.command
            );

            self.transmit(&instruction)?;
            self.await_ack(&instruction)?;

            if let Some(sample) = self.estimator.record_acknowledged(&instruction, Instant::now())
            {
                self.report_progress(&sample);
            }
        }

        Ok(())
    }

    fn transmit(&mut self, instruction: &Instruction) -> Result<(), StreamError> {
        self.set_state(StreamState::Sending);
        self.transport.send_line(&instruction.command)?;
        self.transmitted += 1;
        self.estimator.mark_transmitted(instruction, Instant::now());
        Ok(())
    }

    /// Block until the controller acknowledges the in-flight instruction.
    ///
    /// Decode glitches are retried in place. Silence longer than the ack
    /// timeout is fatal.
    fn await_ack(&mut self, instruction: &Instruction) -> Result<(), StreamError> {
        self.set_state(StreamState::AwaitingAck);
        self.ack_waits += 1;

        loop {
            let line = match self.transport.read_line(self.config.ack_timeout) {
                Ok(line) => line,
                Err(e) if e.is_timeout() => {
                    return Err(StreamError::AckTimeout {
                        line: instruction.command.clone(),
                        timeout_ms: self.config.ack_timeout.as_millis() as u64,
                    });
                }
                Err(e) => {
                    let error = StreamError::from(e);
                    if error.is_fatal() {
                        return Err(error);
                    }
                    tracing::warn!("Bad response {}", error);
                    continue;
                }
            };

            tracing::debug!("Got: {}", line);
            match self.parser.parse(&line) {
                ControllerResponse::Ok => return Ok(()),
                ControllerResponse::Telemetry(report) => self.listener.on_telemetry(&report),
                ControllerResponse::Busy => tracing::trace!("Controller busy"),
                ControllerResponse::Info(_) => {}
            }
        }
    }

    /// Read until the controller's boot banner shows up
    fn wait_for_banner(&mut self) -> Result<(), StreamError> {
        tracing::debug!("Waiting for controller banner");
        loop {
            match self.transport.read_line(self.config.ack_timeout) {
                Ok(line) => {
                    tracing::debug!("Got: {}", line);
                    if is_init_banner(&line) {
                        return Ok(());
                    }
                }
                Err(e) if e.is_timeout() => {
                    return Err(StreamError::BannerTimeout {
                        timeout_ms: self.config.ack_timeout.as_millis() as u64,
                    });
                }
                Err(e) => {
                    let error = StreamError::from(e);
                    if error.is_fatal() {
                        return Err(error);
                    }
                    tracing::warn!("Bad response {}", error);
                }
            }
        }
    }

    fn report_progress(&mut self, sample: &ProgressSample) {
        self.last_fraction = Some(sample.fraction);
        self.listener.on_progress(sample);
    }

    fn set_state(&mut self, state: StreamState) {
        tracing::trace!("{} -> {}", self.state, state);
        self.state = state;
    }
}
