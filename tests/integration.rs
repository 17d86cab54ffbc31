//! Integration tests for ringlink host-testable logic.
//!
//! Exercises the codec, detector, calibration, and fusion together the
//! way the driver task wires them: raw report bytes in, published
//! values out.

use ringlink::calib::{CalibPhase, CalibrationFailure, CalibrationRun, PhaseOutcome};
use ringlink::config::{FLEX_MIN_RANGE, RING_PRESENT_THRESHOLD};
use ringlink::detect::{AttachEdge, RingDetector};
use ringlink::flex::FlexCalibration;
use ringlink::motion::{ImuCalibration, MotionFusion};
use ringlink::protocol::init::{InitAction, FINALE, PRELUDE};
use ringlink::protocol::input::{RingSample, StandardInput, STANDARD_REPORT_LEN};
use ringlink::protocol::output::{
    mcu_command, OutputReportBuilder, ACTUATOR_NEUTRAL, OUTPUT_REPORT_LEN,
};
use ringlink::protocol::{
    EXTENDED_MIN_LEN, FLEX_OFFSET, INPUT_REPORT_EXTENDED, PRESENCE_OFFSET, RING_DEVICE_ID,
    SUBCMD_SET_MCU_CONFIG,
};

/// Build an extended input report carrying the given flex and presence
/// bytes, with a plausible battery/stick prefix.
fn extended_report(flex: u8, presence: u8) -> [u8; EXTENDED_MIN_LEN] {
    let mut data = [0u8; EXTENDED_MIN_LEN];
    data[0] = INPUT_REPORT_EXTENDED;
    data[1] = 0x1D;
    data[2] = 0x81; // full battery, charging
    data[FLEX_OFFSET] = flex;
    data[PRESENCE_OFFSET] = presence;
    data
}

#[test]
fn extended_report_to_normalized_flex() {
    let cal = FlexCalibration {
        neutral: 0x0A,
        min: 0x00,
        max: 0x14,
        valid: true,
    };

    // Captured sequence: two neutral frames, then two full pulls.
    let raws = [0x0Au8, 0x0A, 0x00, 0x00];
    let mut normalized = Vec::new();
    for raw in raws {
        let frame = extended_report(raw, RING_DEVICE_ID);
        let sample = RingSample::parse(&frame).expect("accessory block");
        normalized.push(cal.normalize(sample.flex));
    }
    assert_eq!(normalized, [0.5, 0.5, 0.0, 0.0]);
}

#[test]
fn presence_stream_attaches_on_fifth_report() {
    let mut detector = RingDetector::new(RING_PRESENT_THRESHOLD, 3);
    let presence_bytes = [0x00u8, 0x00, 0x20, 0x20, 0x20];

    let mut edges = Vec::new();
    for (i, &presence) in presence_bytes.iter().enumerate() {
        let frame = extended_report(0x72, presence);
        let present = RingSample::parse(&frame).map(|s| s.present).unwrap_or(false);
        if let Some(edge) = detector.observe(present) {
            edges.push((i, edge));
        }
    }
    assert_eq!(edges, [(4, AttachEdge::Attached)]);
}

#[test]
fn standard_reports_count_as_absence() {
    // Before the MCU streams extended reports, plain 0x30 frames must
    // read as "ring absent" without tripping the parser.
    let mut detector = RingDetector::new(2, 2);
    let mut frame = [0u8; STANDARD_REPORT_LEN];
    frame[0] = 0x30;

    for _ in 0..10 {
        let present = RingSample::parse(&frame).map(|s| s.present).unwrap_or(false);
        assert!(detector.observe(present).is_none());
    }
    assert!(!detector.attached());
}

#[test]
fn handshake_prelude_frames_are_byte_exact() {
    let mut builder = OutputReportBuilder::new();

    for (i, command) in PRELUDE.iter().enumerate() {
        let frame = match command.action {
            InitAction::Subcommand { id, args } => {
                let frame = builder.subcommand(id, args).expect("frame fits");
                assert_eq!(frame[10], id);
                assert_eq!(&frame[11..11 + args.len()], args);
                frame
            }
            InitAction::McuCommand {
                command: mcu_cmd,
                subcommand,
                args,
            } => {
                let payload = mcu_command(mcu_cmd, subcommand, args).expect("payload fits");
                let frame = builder
                    .subcommand(SUBCMD_SET_MCU_CONFIG, &payload)
                    .expect("frame fits");
                // Nested payload rides in the argument region, checksum
                // included at its byte 37.
                assert_eq!(&frame[11..11 + payload.len()], &payload);
                frame
            }
        };

        assert_eq!(frame.len(), OUTPUT_REPORT_LEN);
        assert_eq!(frame[0], 0x01);
        assert_eq!(frame[1] as usize, i & 0x0F);
        assert_eq!(&frame[2..10], &ACTUATOR_NEUTRAL);
    }
}

#[test]
fn handshake_sequence_numbers_roll_across_both_tables() {
    let mut builder = OutputReportBuilder::new();
    let total = PRELUDE.len() + FINALE.len();

    let mut last_seq = None;
    for command in PRELUDE.iter().chain(FINALE.iter()) {
        let frame = match command.action {
            InitAction::Subcommand { id, args } => builder.subcommand(id, args).unwrap(),
            InitAction::McuCommand {
                command: mcu_cmd,
                subcommand,
                args,
            } => {
                let payload = mcu_command(mcu_cmd, subcommand, args).unwrap();
                builder.subcommand(SUBCMD_SET_MCU_CONFIG, &payload).unwrap()
            }
        };
        if let Some(prev) = last_seq {
            assert_eq!(frame[1], (prev + 1) & 0x0F);
        }
        last_seq = Some(frame[1]);
    }
    assert!(total <= 16, "sequence assertions assume no wrap");
}

#[test]
fn failed_recalibration_preserves_previous_record() {
    let persisted = FlexCalibration {
        neutral: 0x6E,
        min: 0x3A,
        max: 0xB1,
        valid: true,
    };
    let persisted_bytes = persisted.to_bytes();

    let mut run = CalibrationRun::start(persisted);

    // Neutral phase observes a resting grip.
    for raw in [0x70, 0x71, 0x72] {
        run.observe(raw);
    }
    assert_eq!(run.advance(FLEX_MIN_RANGE), PhaseOutcome::Continue(CalibPhase::Pull));

    // Pull phase barely moves: below the minimum usable range.
    run.observe(0x72 - FLEX_MIN_RANGE + 2);
    let outcome = run.advance(FLEX_MIN_RANGE);
    assert_eq!(outcome, PhaseOutcome::Failed(CalibrationFailure::NoPull));

    // Rollback restores the persisted record bit-for-bit.
    let restored = run.backup();
    assert_eq!(restored.to_bytes(), persisted_bytes);
}

#[test]
fn parsed_imu_frames_drive_orientation() {
    let mut fusion = MotionFusion::new(ImuCalibration::default());

    // 1 g straight down the z axis in all three frames.
    let mut data = [0u8; STANDARD_REPORT_LEN];
    data[0] = 0x30;
    for frame in 0..3 {
        let off = 13 + frame * 12 + 4; // az
        data[off..off + 2].copy_from_slice(&0x1000i16.to_le_bytes());
    }
    let input = StandardInput::parse(&data).expect("standard report");

    let orientation = fusion.update(&input.frames, 0.016);
    assert!(orientation.pitch.abs() < 0.5);
    assert!(orientation.roll.abs() < 0.5);
    assert_eq!(orientation.yaw, 0.0);
}
