//! Tests for instruction normalization and the instruction source

use gcodestream_core::{
    extrusion_delta, Instruction, InstructionKind, InstructionSource, ProgressMetric,
};
use proptest::prelude::*;
use std::io::Cursor;

#[test]
fn test_parse_motion_instruction() {
    let instruction = Instruction::parse("G1 X10.5 Y3 E0.25 ; perimeter\n").unwrap();
    assert_eq!(instruction.command, "G1 X10.5 Y3 E0.25");
    assert_eq!(instruction.kind, InstructionKind::Motion);
    assert_eq!(instruction.extrusion, 0.25);
    assert!(instruction.is_motion());
    assert!(!instruction.is_z_move());
}

#[test]
fn test_parse_z_move() {
    let instruction = Instruction::parse("G1 Z0.3 F7800").unwrap();
    assert_eq!(instruction.kind, InstructionKind::MotionWithZ);
    assert!(instruction.is_motion());
    assert!(instruction.is_z_move());
}

#[test]
fn test_parse_other_instruction() {
    let instruction = Instruction::parse("M109 S210").unwrap();
    assert_eq!(instruction.kind, InstructionKind::Other);
    assert!(!instruction.is_motion());

    // Firmware retract shares the G1 prefix but is not a move
    let retract = Instruction::parse("G10").unwrap();
    assert_eq!(retract.kind, InstructionKind::Other);
}

#[test]
fn test_noop_lines() {
    assert_eq!(Instruction::parse(""), None);
    assert_eq!(Instruction::parse("\n"), None);
    assert_eq!(Instruction::parse("   \t\r\n"), None);
    assert_eq!(Instruction::parse("; layer 3"), None);
    assert_eq!(Instruction::parse("   ;G1 X10"), None);
}

#[test]
fn test_unparsable_extrusion_defaults_to_zero() {
    assert_eq!(extrusion_delta("G1 X1 E1..2"), 0.0);
    assert_eq!(extrusion_delta("G1 X1 E"), 0.0);
}

#[test]
fn test_measure_lines_and_rewind() {
    let gcode = "\
; generated
G28
G1 Z0.2 F3000
G1 X10 Y10 E1.5
G10
G1 X20 Y10 E-0.5 ; retract
M104 S0
";
    let mut source = InstructionSource::new(Cursor::new(gcode.as_bytes().to_vec()));
    assert_eq!(source.measure(ProgressMetric::Lines).unwrap(), 3.0);
    assert_eq!(source.measure(ProgressMetric::Extrusion).unwrap(), 1.5);

    // Measuring rewinds, so streaming starts at the first line
    assert_eq!(source.next_line().unwrap().as_deref(), Some("; generated\n"));
    assert_eq!(source.line_number(), 1);
}

#[test]
fn test_source_reads_last_line_without_terminator() {
    let mut source = InstructionSource::new(Cursor::new(b"G28\nG1 X1".to_vec()));
    assert_eq!(source.next_line().unwrap().as_deref(), Some("G28\n"));
    assert_eq!(source.next_line().unwrap().as_deref(), Some("G1 X1"));
    assert_eq!(source.next_line().unwrap(), None);
}

#[test]
fn test_source_tolerates_invalid_utf8() {
    let mut source = InstructionSource::new(Cursor::new(b"G1 X1 \xff\n".to_vec()));
    let line = source.next_line().unwrap().unwrap();
    assert!(line.starts_with("G1 X1"));
}

proptest! {
    #[test]
    fn prop_negative_extrusion_is_zero(value in -1.0e6f64..-1.0e-9) {
        let command = format!("G1 X1 Y2 E{}", value);
        prop_assert_eq!(extrusion_delta(&command), 0.0);
        let instruction = Instruction::parse(&command).unwrap();
        prop_assert_eq!(instruction.extrusion, 0.0);
    }

    #[test]
    fn prop_extrusion_is_never_negative(text in "G1( [XYZEF]-?[0-9]{0,3}(\\.[0-9]{0,2})?){0,5}") {
        prop_assert!(extrusion_delta(&text) >= 0.0);
    }

    #[test]
    fn prop_comment_only_lines_are_noops(
        indent in "[ \t]{0,4}",
        comment in "[ -~]{0,40}",
    ) {
        let line = format!("{};{}\n", indent, comment);
        prop_assert!(Instruction::parse(&line).is_none());
    }
}
