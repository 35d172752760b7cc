//! Tests for progress estimation

use gcodestream_core::{
    Instruction, InstructionSource, ProgressEstimator, ProgressMetric, ProgressSample,
    LAYER_DISPLAY_OFFSET,
};
use std::io::Cursor;
use std::time::{Duration, Instant};

fn instr(line: &str) -> Instruction {
    Instruction::parse(line).unwrap()
}

#[test]
fn test_no_sample_before_clock_starts() {
    let mut estimator = ProgressEstimator::new(ProgressMetric::Lines, 10.0, 1);
    let now = Instant::now();

    // Acknowledged without a prior transmission: the clock never started
    assert_eq!(estimator.record_acknowledged(&instr("G1 X1"), now), None);
    assert_eq!(estimator.started_at(), None);
}

#[test]
fn test_clock_starts_on_first_motion_only() {
    let mut estimator = ProgressEstimator::new(ProgressMetric::Lines, 10.0, 1);
    let t0 = Instant::now();

    estimator.mark_transmitted(&instr("M109 S200"), t0);
    assert_eq!(estimator.started_at(), None);

    let t1 = t0 + Duration::from_secs(5);
    estimator.mark_transmitted(&instr("G1 X1"), t1);
    assert_eq!(estimator.started_at(), Some(t1));

    estimator.mark_transmitted(&instr("G1 X2"), t1 + Duration::from_secs(1));
    assert_eq!(estimator.started_at(), Some(t1));
}

#[test]
fn test_line_mode_samples_every_interval() {
    let mut estimator = ProgressEstimator::new(ProgressMetric::Lines, 40.0, 20);
    let t0 = Instant::now();
    let motion = instr("G1 X1");
    estimator.mark_transmitted(&motion, t0);

    let mut samples = Vec::new();
    for i in 1..=40u64 {
        let now = t0 + Duration::from_secs(i);
        if let Some(sample) = estimator.record_acknowledged(&motion, now) {
            samples.push((i, sample));
        }
        // Non-motion instructions never trigger a sample
        assert_eq!(estimator.record_acknowledged(&instr("M106 S255"), now), None);
    }

    assert_eq!(samples.len(), 2);
    assert_eq!(samples[0].0, 20);
    assert!((samples[0].1.fraction - 0.5).abs() < 1e-9);
    assert_eq!(samples[0].1.elapsed, Duration::from_secs(20));
    // 20 moves in 20s, 20 left at 1/s
    assert_eq!(samples[0].1.remaining, Duration::from_secs(20));
    assert!((samples[1].1.fraction - 1.0).abs() < 1e-9);
    assert_eq!(samples[1].1.remaining, Duration::ZERO);
}

#[test]
fn test_extrusion_mode_samples_on_z_moves() {
    let mut estimator = ProgressEstimator::new(ProgressMetric::Extrusion, 4.0, 20);
    let t0 = Instant::now();
    let extrude = instr("G1 X1 E1.0");
    estimator.mark_transmitted(&extrude, t0);

    let t1 = t0 + Duration::from_secs(10);
    assert_eq!(estimator.record_acknowledged(&extrude, t1), None);

    let sample = estimator
        .record_acknowledged(&instr("G1 Z0.4"), t1)
        .expect("z move samples");
    assert!((sample.fraction - 0.25).abs() < 1e-9);
    assert_eq!(sample.layer, 1 - LAYER_DISPLAY_OFFSET);
    // 1.0 per 10s, 3.0 left
    assert!((sample.remaining.as_secs_f64() - 30.0).abs() < 1e-6);
}

#[test]
fn test_zero_elapsed_suppresses_estimate() {
    let mut estimator = ProgressEstimator::new(ProgressMetric::Lines, 1.0, 1);
    let t0 = Instant::now();
    let motion = instr("G1 X1");
    estimator.mark_transmitted(&motion, t0);
    assert_eq!(estimator.record_acknowledged(&motion, t0), None);
    assert_eq!(estimator.processed(), 1.0);
}

#[test]
fn test_zero_throughput_suppresses_estimate() {
    // Extrusion mode on a file that never extrudes
    let mut estimator = ProgressEstimator::new(ProgressMetric::Extrusion, 1.0, 1);
    let t0 = Instant::now();
    let z_move = instr("G1 Z1");
    estimator.mark_transmitted(&z_move, t0);
    assert_eq!(
        estimator.record_acknowledged(&z_move, t0 + Duration::from_secs(1)),
        None
    );
}

#[test]
fn test_zero_total_never_samples() {
    let mut estimator = ProgressEstimator::new(ProgressMetric::Lines, 0.0, 1);
    let t0 = Instant::now();
    let motion = instr("G1 X1");
    estimator.mark_transmitted(&motion, t0);
    assert_eq!(
        estimator.record_acknowledged(&motion, t0 + Duration::from_secs(1)),
        None
    );
}

#[test]
fn test_progress_line_format() {
    let sample = ProgressSample {
        fraction: 0.1234,
        elapsed: Duration::from_secs(3600 + 15 * 60),
        remaining: Duration::from_secs(2 * 3600 + 30 * 60),
        layer: 7,
    };
    assert_eq!(
        sample.to_string(),
        "Progress: 12.34 % Z: 7 Running: 1 h 15 min Estimate left: 2 h 30 min"
    );
}

#[test]
fn test_layer_display_offset_can_go_negative() {
    let mut estimator = ProgressEstimator::new(ProgressMetric::Lines, 2.0, 1);
    let t0 = Instant::now();
    let motion = instr("G1 X1");
    estimator.mark_transmitted(&motion, t0);
    let sample = estimator
        .record_acknowledged(&motion, t0 + Duration::from_secs(1))
        .unwrap();
    assert_eq!(sample.layer, -LAYER_DISPLAY_OFFSET);
}

#[test]
fn test_denormal_extrusion_does_not_overflow_estimate() {
    let mut estimator = ProgressEstimator::new(ProgressMetric::Extrusion, 1e20, 20);
    let t0 = Instant::now();
    let tiny = instr("G1 Z0.2 E1e-300");
    estimator.mark_transmitted(&tiny, t0);

    // Time left works out to roughly 1e320 seconds
    assert_eq!(
        estimator.record_acknowledged(&tiny, t0 + Duration::from_secs(2)),
        None
    );
    assert_eq!(estimator.z_moves(), 1);
}

#[test]
fn test_infinite_total_never_samples() {
    let mut source = InstructionSource::new(Cursor::new(
        b"G1 X1 E1e308\nG1 X2 E1e308\nG1 Z1\n".to_vec(),
    ));
    let total = source.measure(ProgressMetric::Extrusion).unwrap();
    assert!(total.is_infinite());

    let mut estimator = ProgressEstimator::new(ProgressMetric::Extrusion, total, 20);
    let t0 = Instant::now();
    let t1 = t0 + Duration::from_secs(2);
    let first = instr("G1 X1 E1e308");
    estimator.mark_transmitted(&first, t0);

    assert_eq!(estimator.record_acknowledged(&first, t1), None);
    assert_eq!(estimator.record_acknowledged(&instr("G1 X2 E1e308"), t1), None);
    assert_eq!(estimator.record_acknowledged(&instr("G1 Z1"), t1), None);
    assert_eq!(estimator.sample(t1), None);
}
