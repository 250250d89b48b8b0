use heimdall_core::error::BuildError;
use heimdall_core::mocks::NoopRangeFinder;
use heimdall_core::{DetectionMode, Detector, DetectorTuning, LaneConfig, Timeouts};
use rstest::rstest;

#[rstest]
fn builder_missing_sensor_yields_typed_build_error() {
    let err = Detector::builder()
        // missing with_sensor()
        .with_lanes(vec![LaneConfig::default()])
        .try_build()
        .expect_err("should fail with MissingSensor");

    match err.downcast_ref::<BuildError>() {
        Some(BuildError::MissingSensor) => {}
        other => panic!("expected MissingSensor, got: {other:?}"),
    }
}

#[rstest]
fn builder_missing_lanes_yields_typed_build_error() {
    let err = Detector::builder()
        .with_sensor(NoopRangeFinder)
        // missing with_lanes()
        .try_build()
        .expect_err("should fail with MissingLanes");

    match err.downcast_ref::<BuildError>() {
        Some(BuildError::MissingLanes) => {}
        other => panic!("expected MissingLanes, got: {other:?}"),
    }
}

#[rstest]
#[case::no_lanes(vec![], DetectorTuning::default(), Timeouts::default(), "at least one lane")]
#[case::alpha_at_one(
    vec![LaneConfig::default()],
    DetectorTuning { smoothing_alpha: 1.0, ..DetectorTuning::default() },
    Timeouts::default(),
    "smoothing_alpha"
)]
#[case::alpha_nan(
    vec![LaneConfig::default()],
    DetectorTuning { smoothing_alpha: f32::NAN, ..DetectorTuning::default() },
    Timeouts::default(),
    "smoothing_alpha"
)]
#[case::negative_min(
    vec![LaneConfig { min_cm: -5, ..LaneConfig::default() }],
    DetectorTuning::default(),
    Timeouts::default(),
    "min_cm must be >= 0"
)]
#[case::empty_zone(
    vec![LaneConfig { min_cm: 300, max_cm: 300, ..LaneConfig::default() }],
    DetectorTuning::default(),
    Timeouts::default(),
    "min_cm must be < max_cm"
)]
#[case::zone_reaches_sentinel(
    vec![LaneConfig { min_cm: 0, max_cm: 999, ..LaneConfig::default() }],
    DetectorTuning::default(),
    Timeouts::default(),
    "far sentinel"
)]
#[case::vote_pct_overflow(
    vec![LaneConfig { vote_threshold_pct: 101, ..LaneConfig::default() }],
    DetectorTuning::default(),
    Timeouts::default(),
    "vote_threshold_pct"
)]
#[case::zero_sensor_timeout(
    vec![LaneConfig::default()],
    DetectorTuning::default(),
    Timeouts { sensor_ms: 0 },
    "sensor_ms"
)]
#[case::overlapping_zones(
    vec![
        LaneConfig { min_cm: 0, max_cm: 300, ..LaneConfig::default() },
        LaneConfig { min_cm: 200, max_cm: 600, ..LaneConfig::default() },
    ],
    DetectorTuning::default(),
    Timeouts::default(),
    "must not overlap"
)]
fn invalid_configs_are_rejected(
    #[case] lanes: Vec<LaneConfig>,
    #[case] tuning: DetectorTuning,
    #[case] timeouts: Timeouts,
    #[case] needle: &str,
) {
    let err = Detector::builder()
        .with_sensor(NoopRangeFinder)
        .with_lanes(lanes)
        .with_mode(DetectionMode::VotingWindow)
        .with_tuning(tuning)
        .with_timeouts(timeouts)
        .build()
        .expect_err("invalid config must be rejected");

    match err.downcast_ref::<BuildError>() {
        Some(BuildError::InvalidConfig(msg)) => {
            assert!(msg.contains(needle), "unexpected message: {msg}");
        }
        other => panic!("expected InvalidConfig, got: {other:?}"),
    }
}

#[rstest]
fn zone_bounds_check_against_the_active_far_sentinel() {
    let lanes = vec![LaneConfig {
        max_cm: 1100,
        ..LaneConfig::default()
    }];

    // 1100 cm sits below the threshold strategy's 1200 cm sentinel...
    Detector::builder()
        .with_sensor(NoopRangeFinder)
        .with_lanes(lanes.clone())
        .with_mode(DetectionMode::SmoothedThreshold)
        .build()
        .expect("valid under the threshold strategy");

    // ...but at or above the voting strategies' 999 cm sentinel.
    let err = Detector::builder()
        .with_sensor(NoopRangeFinder)
        .with_lanes(lanes)
        .with_mode(DetectionMode::VotingWindow)
        .build()
        .expect_err("invalid under the voting strategy");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ));
}

#[rstest]
fn touching_zones_are_not_an_overlap() {
    // Shared boundary is fine; the in-zone test is strictly inside.
    Detector::builder()
        .with_sensor(NoopRangeFinder)
        .with_lanes(vec![
            LaneConfig {
                min_cm: 0,
                max_cm: 300,
                ..LaneConfig::default()
            },
            LaneConfig {
                min_cm: 300,
                max_cm: 600,
                ..LaneConfig::default()
            },
        ])
        .build()
        .expect("touching zones must build");
}

#[rstest]
fn degenerate_window_is_clamped_not_rejected() {
    let det = Detector::builder()
        .with_sensor(NoopRangeFinder)
        .with_lanes(vec![LaneConfig::default()])
        .with_tuning(DetectorTuning {
            window: 0,
            history_window: 0,
            ..DetectorTuning::default()
        })
        .build()
        .expect("degenerate windows are sanitized");
    assert_eq!(det.window().capacity(), 1);
    assert_eq!(det.history().capacity(), 1);
}
