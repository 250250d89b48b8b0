//! Quick Start Example
//!
//! Demonstrates how to set up and run a simulated lane-occupancy count using
//! the Heimdall library.

use heimdall_core::{CycleStatus, DetectionMode, Detector, DetectorTuning, LaneConfig, Timeouts};
use heimdall_hardware::SimulatedRangeFinder;
use heimdall_traits::MonotonicClock;
use heimdall_traits::clock::Clock;
use std::time::Duration;

/// Runs a simulated count over a scene of three vehicles crossing the beam.
///
/// # Usage
///
/// Intended to be run as a standalone binary via
/// `cargo run -p heimdall_core --example quick_start`.
/// It demonstrates the minimal setup required to use the library in
/// simulation mode: build a `Detector`, feed it cycles, read departures.
///
/// # Errors
///
/// Returns an error if the detector configuration is rejected, surfaced as
/// an `eyre::Report`.
fn main() -> Result<(), eyre::Report> {
    // Local monotonic clock for pacing in this example
    let clock = MonotonicClock::new();

    // Three passes at 150 cm, 40 frames each, over a 900 cm background
    let sensor = SimulatedRangeFinder::passing_targets(900, 150, 40, 60, 3);

    let mut detector = Detector::builder()
        .with_sensor(sensor)
        .with_lanes(vec![LaneConfig {
            name: Some("southbound".into()),
            min_cm: 0,
            max_cm: 300,
            ..LaneConfig::default()
        }])
        .with_mode(DetectionMode::VotingWindow)
        .with_tuning(DetectorTuning::default())
        .with_timeouts(Timeouts { sensor_ms: 10 })
        .build()?;

    // Start a new run
    detector.begin();

    // 10 ms tick, enough cycles to play the whole scene plus the flush tail
    let tick = Duration::from_millis(10);
    for _ in 0..340 {
        match detector.step() {
            CycleStatus::Processed(report) => {
                for event in &report.departures {
                    println!(
                        "[{:>6} ms] lane {} departure, total {}",
                        report.ms_since_start, event.lane, event.total
                    );
                }
            }
            CycleStatus::Skipped(e) => println!("cycle skipped: {e}"),
        }
        clock.sleep(tick);
    }

    println!("\ntotals: {:?}", detector.totals());
    println!("\n{}", detector.histogram_chart(1000));
    Ok(())
}
