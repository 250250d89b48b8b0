use heimdall_hardware::SimulatedRangeFinder;
use heimdall_hardware::error::HwError;
use heimdall_hardware::tfmini::{
    FRAME_LEN, decode_frame, encode_frame, frame_rate_command, trigger_command,
};
use heimdall_traits::RangeFinder;
use rstest::rstest;
use std::time::Duration;

#[test]
fn decodes_a_clean_frame() {
    let frame = encode_frame(123, 400, 0);
    let reading = decode_frame(&frame).expect("decode");
    assert_eq!(reading.distance_cm, 123);
    assert!(!reading.is_weak());
}

#[test]
fn rejects_bad_header() {
    let mut frame = encode_frame(123, 400, 0);
    frame[0] = 0x58;
    let err = decode_frame(&frame).expect_err("should reject header");
    match err {
        HwError::BadHeader(0x58, 0x59) => {}
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn rejects_corrupted_checksum() {
    let mut frame = encode_frame(123, 400, 0);
    frame[FRAME_LEN - 1] = frame[FRAME_LEN - 1].wrapping_add(1);
    let err = decode_frame(&frame).expect_err("should reject checksum");
    match err {
        HwError::Checksum { .. } => {}
        other => panic!("unexpected error: {other:?}"),
    }
}

// Flux below the usable band or pegged at saturation still checksums fine
// but the distance is garbage: decodes as a weak reading, not an error.
#[rstest]
#[case(0)]
#[case(99)]
#[case(0xFFFF)]
fn dim_or_saturated_flux_decodes_as_weak(#[case] flux: u16) {
    let frame = encode_frame(550, flux, 0);
    let reading = decode_frame(&frame).expect("decode");
    assert!(reading.is_weak());
}

#[rstest]
#[case(100)]
#[case(1000)]
#[case(0xFFFE)]
fn usable_flux_decodes_as_target(#[case] flux: u16) {
    let frame = encode_frame(550, flux, 0);
    let reading = decode_frame(&frame).expect("decode");
    assert!(!reading.is_weak());
    assert_eq!(reading.distance_cm, 550);
}

#[test]
fn trigger_command_checksums() {
    let cmd = trigger_command();
    let sum: u8 = cmd
        .iter()
        .take(cmd.len() - 1)
        .fold(0u8, |acc, b| acc.wrapping_add(*b));
    assert_eq!(sum, cmd[cmd.len() - 1]);
}

#[test]
fn frame_rate_command_encodes_rate_le() {
    let cmd = frame_rate_command(100);
    assert_eq!(cmd[3], 100);
    assert_eq!(cmd[4], 0);
    let sum: u8 = cmd
        .iter()
        .take(cmd.len() - 1)
        .fold(0u8, |acc, b| acc.wrapping_add(*b));
    assert_eq!(sum, cmd[cmd.len() - 1]);
}

#[test]
fn simulator_plays_script_then_holds_background() {
    let mut sim = SimulatedRangeFinder::passing_targets(900, 250, 2, 1, 1);
    let t = Duration::from_millis(1);
    assert_eq!(sim.read(t).expect("read").distance_cm, 250);
    assert_eq!(sim.read(t).expect("read").distance_cm, 250);
    assert_eq!(sim.read(t).expect("read").distance_cm, 900);
    // Script exhausted: background forever.
    for _ in 0..10 {
        assert_eq!(sim.read(t).expect("read").distance_cm, 900);
    }
}
