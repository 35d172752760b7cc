//! Progress and ETA estimation
//!
//! Tracks how much of the file the controller has acknowledged and turns
//! that into periodic status samples. Two interchangeable metrics are
//! supported, chosen once per session:
//! - [`ProgressMetric::Lines`]: count of motion instructions, sampled every
//!   `sample_interval` acknowledged moves
//! - [`ProgressMetric::Extrusion`]: cumulative extrusion delta, sampled on
//!   every acknowledged Z move
//!
//! The clock starts at the first transmitted motion instruction, so port
//! reset and file pre-pass latency never skew the throughput figure.

use crate::instruction::Instruction;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Default number of acknowledged moves between samples in line mode
pub const DEFAULT_SAMPLE_INTERVAL: u32 = 20;

/// Offset subtracted from the Z-move count in status lines.
///
/// The value predates this status format and has no documented meaning.
/// Consumers of the `Progress:` line depend on it; do not change it alone.
pub const LAYER_DISPLAY_OFFSET: i64 = 2;

/// Progress accounting strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressMetric {
    /// Count of motion instructions
    #[default]
    Lines,
    /// Cumulative extrusion delta of motion instructions
    Extrusion,
}

impl ProgressMetric {
    /// Amount an instruction adds to the metric once acknowledged
    pub fn contribution(&self, instruction: &Instruction) -> f64 {
        if !instruction.is_motion() {
            return 0.0;
        }
        match self {
            Self::Lines => 1.0,
            Self::Extrusion => instruction.extrusion,
        }
    }
}

impl fmt::Display for ProgressMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lines => write!(f, "lines"),
            Self::Extrusion => write!(f, "extrusion"),
        }
    }
}

impl FromStr for ProgressMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lines" | "count" => Ok(Self::Lines),
            "extrusion" | "volume" => Ok(Self::Extrusion),
            other => Err(format!("Unknown progress metric: {}", other)),
        }
    }
}

/// Split a duration into whole hours and rounded minutes
fn hours_minutes_rounded(duration: Duration) -> (u64, u64) {
    let minutes = (duration.as_secs_f64() / 60.0).round() as u64;
    (minutes / 60, minutes % 60)
}

/// Split a duration into whole hours and whole minutes
pub fn hours_minutes(duration: Duration) -> (u64, u64) {
    let secs = duration.as_secs();
    (secs / 3600, (secs % 3600) / 60)
}

/// Format the terminal summary line
pub fn format_finished(elapsed: Duration) -> String {
    let (hours, minutes) = hours_minutes(elapsed);
    format!("Finished in {}h {:02}m", hours, minutes)
}

/// One progress reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSample {
    /// Fraction of the total metric acknowledged, in `0.0..=1.0`
    pub fraction: f64,
    /// Time since the first transmitted motion instruction
    pub elapsed: Duration,
    /// Estimated time left at the current throughput
    pub remaining: Duration,
    /// Z-move counter, already shifted by [`LAYER_DISPLAY_OFFSET`]
    pub layer: i64,
}

impl ProgressSample {
    /// Completion as a percentage
    pub fn percent(&self) -> f64 {
        self.fraction * 100.0
    }
}

impl fmt::Display for ProgressSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (run_h, run_m) = hours_minutes_rounded(self.elapsed);
        let (left_h, left_m) = hours_minutes_rounded(self.remaining);
        write!(
            f,
            "Progress: {:.2} % Z: {} Running: {} h {} min Estimate left: {} h {} min",
            self.percent(),
            self.layer,
            run_h,
            run_m,
            left_h,
            left_m
        )
    }
}

/// Progress estimator for one session
#[derive(Debug, Clone)]
pub struct ProgressEstimator {
    metric: ProgressMetric,
    total: f64,
    processed: f64,
    motions_acknowledged: u64,
    z_moves: u64,
    sample_interval: u32,
    started_at: Option<Instant>,
}

impl ProgressEstimator {
    /// Create an estimator for a fixed total.
    ///
    /// A zero interval is treated as 1.
    pub fn new(metric: ProgressMetric, total: f64, sample_interval: u32) -> Self {
        Self {
            metric,
            total,
            processed: 0.0,
            motions_acknowledged: 0,
            z_moves: 0,
            sample_interval: sample_interval.max(1),
            started_at: None,
        }
    }

    /// Note that an instruction went out on the wire.
    ///
    /// Starts the clock on the first motion instruction.
    pub fn mark_transmitted(&mut self, instruction: &Instruction, now: Instant) {
        if self.started_at.is_none() && instruction.is_motion() {
            tracing::debug!("First motion instruction transmitted, starting clock");
            self.started_at = Some(now);
        }
    }

    /// Advance counters for an acknowledged instruction.
    ///
    /// Returns a sample when the instruction hits the sampling cadence
    /// and an estimate can be made.
    pub fn record_acknowledged(
        &mut self,
        instruction: &Instruction,
        now: Instant,
    ) -> Option<ProgressSample> {
        self.processed += self.metric.contribution(instruction);

        if instruction.is_z_move() {
            self.z_moves += 1;
        }
        if !instruction.is_motion() {
            return None;
        }
        self.motions_acknowledged += 1;

        let due = match self.metric {
            ProgressMetric::Lines => {
                self.motions_acknowledged % u64::from(self.sample_interval) == 0
            }
            ProgressMetric::Extrusion => instruction.is_z_move(),
        };

        if due {
            self.sample(now)
        } else {
            None
        }
    }

    /// Take a reading now, regardless of cadence.
    ///
    /// Returns `None` when the clock has not started, no time has elapsed,
    /// nothing has been processed yet, or the figures are too extreme to
    /// express as a duration (huge or denormal `E` words).
    pub fn sample(&self, now: Instant) -> Option<ProgressSample> {
        let started_at = self.started_at?;
        if !self.total.is_finite() || self.total <= 0.0 {
            return None;
        }

        let elapsed = now.saturating_duration_since(started_at);
        let elapsed_secs = elapsed.as_secs_f64();
        if elapsed_secs <= 0.0 {
            return None;
        }

        let throughput = self.processed / elapsed_secs;
        if !throughput.is_finite() || throughput <= 0.0 {
            return None;
        }

        let fraction = (self.processed / self.total).clamp(0.0, 1.0);
        let remaining_secs = (1.0 - fraction) * self.total / throughput;
        let remaining = Duration::try_from_secs_f64(remaining_secs.max(0.0)).ok()?;

        Some(ProgressSample {
            fraction,
            elapsed,
            remaining,
            layer: self.z_moves as i64 - LAYER_DISPLAY_OFFSET,
        })
    }

    /// Total metric measured before streaming
    pub fn total(&self) -> f64 {
        self.total
    }

    /// Metric acknowledged so far
    pub fn processed(&self) -> f64 {
        self.processed
    }

    /// Number of acknowledged motion instructions
    pub fn motions_acknowledged(&self) -> u64 {
        self.motions_acknowledged
    }

    /// Number of acknowledged Z moves
    pub fn z_moves(&self) -> u64 {
        self.z_moves
    }

    /// When the first motion instruction was transmitted
    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hours_minutes() {
        assert_eq!(hours_minutes(Duration::from_secs(0)), (0, 0));
        assert_eq!(hours_minutes(Duration::from_secs(59)), (0, 0));
        assert_eq!(hours_minutes(Duration::from_secs(3725)), (1, 2));
        assert_eq!(hours_minutes_rounded(Duration::from_secs(90)), (0, 2));
        assert_eq!(hours_minutes_rounded(Duration::from_secs(3599)), (1, 0));
    }

    #[test]
    fn test_format_finished() {
        assert_eq!(format_finished(Duration::from_secs(0)), "Finished in 0h 00m");
        assert_eq!(
            format_finished(Duration::from_secs(2 * 3600 + 5 * 60 + 30)),
            "Finished in 2h 05m"
        );
    }

    #[test]
    fn test_metric_from_str() {
        assert_eq!("lines".parse::<ProgressMetric>(), Ok(ProgressMetric::Lines));
        assert_eq!(
            "Extrusion".parse::<ProgressMetric>(),
            Ok(ProgressMetric::Extrusion)
        );
        assert!("bogus".parse::<ProgressMetric>().is_err());
    }
}
