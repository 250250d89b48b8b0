//! End-to-end behavior of the voting-window strategy: percentage vote over
//! the currently-held decision window, strict threshold, no hysteresis.

use heimdall_core::mocks::NoopRangeFinder;
use heimdall_core::{DetectionMode, Detector, DetectorTuning, LaneConfig};
use heimdall_traits::RangeReading;

fn voting_detector(window: usize, vote_threshold_pct: u8) -> Detector {
    Detector::builder()
        .with_sensor(NoopRangeFinder)
        .with_lanes(vec![LaneConfig {
            vote_threshold_pct,
            ..LaneConfig::default()
        }])
        .with_mode(DetectionMode::VotingWindow)
        .with_tuning(DetectorTuning {
            window,
            ..DetectorTuning::default()
        })
        .build()
        .expect("build detector")
}

#[test]
fn first_in_zone_sample_asserts_presence() {
    let mut det = voting_detector(25, 5);
    // One held sample in zone: vote is 100, not 4. No residence wait.
    let report = det.step_from_raw(RangeReading::target(150));
    assert_eq!(report.distance_cm, 150);
    assert!(det.is_present(0));
    assert!(report.departures.is_empty());
}

#[test]
fn presence_lingers_until_the_window_flushes() {
    let mut det = voting_detector(25, 5);
    for _ in 0..25 {
        det.step_from_raw(RangeReading::target(150));
    }
    assert!(det.is_present(0));

    // Replacing in-zone samples with far ones drops the vote by 4 points per
    // cycle: 96, 92, ... still above 5 through the 23rd (vote 8), below at
    // the 24th (vote 4).
    for k in 1..=23 {
        let report = det.step_from_raw(RangeReading::target(999));
        assert!(det.is_present(0), "lost presence early at replacement {k}");
        assert!(report.departures.is_empty());
    }
    let report = det.step_from_raw(RangeReading::target(999));
    assert!(!det.is_present(0));
    assert_eq!(report.departures.len(), 1);
    assert_eq!(report.departures[0].total, 1);
    assert_eq!(det.totals(), &[1]);
}

#[test]
fn vote_at_exactly_the_threshold_reads_absent() {
    // Window of 2 at 50%: one in-zone and one far sample tie at exactly 50,
    // and the comparison is strict.
    let mut det = voting_detector(2, 50);
    det.step_from_raw(RangeReading::target(150));
    assert!(det.is_present(0));
    det.step_from_raw(RangeReading::target(999));
    assert!(!det.is_present(0));
    assert_eq!(det.totals(), &[1]);
}

#[test]
fn vote_divides_by_held_samples_not_capacity() {
    let mut det = voting_detector(25, 50);
    // 1 of 1 held samples in zone: vote 100 even though the window could
    // hold 25.
    det.step_from_raw(RangeReading::target(150));
    assert!(det.is_present(0));
    // 1 of 2: vote 50, not above 50.
    det.step_from_raw(RangeReading::target(999));
    assert!(!det.is_present(0));
}

#[test]
fn out_of_zone_samples_never_assert_presence() {
    let mut det = voting_detector(25, 5);
    for d in [400, 999, 350] {
        det.step_from_raw(RangeReading::target(d));
        assert!(!det.is_present(0));
    }
    assert_eq!(det.totals(), &[0]);
}

#[test]
fn buffers_record_the_raw_normalized_stream() {
    let mut det = voting_detector(25, 5);
    det.step_from_raw(RangeReading::target(150));
    // Overlong return clamps to the far sentinel.
    let report = det.step_from_raw(RangeReading::target(1400));
    assert_eq!(report.distance_cm, 999);
    det.step_from_raw(RangeReading::weak());

    // Both rings and the histogram see the same normalized samples.
    assert_eq!(det.window().len(), 3);
    assert_eq!(det.window().get(0), Some(150));
    assert_eq!(det.window().get(1), Some(999));
    assert_eq!(det.window().get(2), Some(999));
    assert_eq!(det.history().len(), 3);
    assert_eq!(det.history().get(0), Some(150));
    assert_eq!(det.histogram().bin(15), 1);
    assert_eq!(det.histogram().bin(99), 2);
}
