use crate::error::Result as CoreResult;
use crate::sampler::Sampler;
use crate::{CycleStatus, Detector, DetectorTuning, LaneConfig, Timeouts, strategy::DetectionMode};
use heimdall_traits::clock::MonotonicClock;
use heimdall_traits::{RangeFinder, RangeReading};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// How sampling should be orchestrated
#[derive(Debug, Clone, Copy)]
pub enum SamplingMode {
    /// Read inside the detection loop using RangeFinder::read(timeout)
    Direct,
    /// Event-driven: block on the sensor's own frame timing
    Event,
    /// Rate-paced background sampling at the given Hz
    Paced(u32),
}

/// Parameters for one counting run.
#[derive(Debug, Clone)]
pub struct RunParams {
    pub mode: DetectionMode,
    pub tuning: DetectorTuning,
    pub timeouts: Timeouts,
    pub lanes: Vec<LaneConfig>,
    pub sampling: SamplingMode,
    /// Driver loop rate; also the synthetic-sample cadence while stalled.
    pub sample_rate_hz: u32,
    /// Stop after this many processed cycles; `None` runs until shutdown.
    pub max_cycles: Option<u64>,
}

/// What a finished run did, for the reporting path.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Departure totals, one per configured lane.
    pub totals: Vec<u64>,
    pub cycles: u64,
    pub skipped: u64,
}

/// Compute the stall watchdog threshold in milliseconds.
///
/// Starts from a "fast" threshold derived from the per-read sensor timeout
/// (4x) to catch a dead sensor promptly, and never sits below two sampling
/// periods so a single missed sample cannot trip the watchdog.
#[inline]
fn compute_stall_threshold_ms(sensor_timeout_ms: u64, period_ms: u64) -> u64 {
    debug_assert!((1..=crate::util::MILLIS_PER_SEC).contains(&period_ms));
    std::cmp::max(
        fast_threshold_ms(sensor_timeout_ms),
        two_periods_ms(period_ms),
    )
    .max(1)
}

/// Derive a quick stall threshold from the per-read sensor timeout.
#[inline]
fn fast_threshold_ms(sensor_timeout_ms: u64) -> u64 {
    sensor_timeout_ms.saturating_mul(4)
}

/// Ensure the stall threshold spans at least two periods to tolerate one miss.
#[inline]
fn two_periods_ms(period_ms: u64) -> u64 {
    period_ms.saturating_mul(2)
}

#[inline]
fn stalled_now(elapsed_ms: u64, stalled_ms: u64, threshold_ms: u64) -> bool {
    elapsed_ms >= threshold_ms && stalled_ms > threshold_ms
}

/// Run the detection loop until shutdown or the cycle bound, returning the
/// run summary and the detector (for histogram rendering after the run).
///
/// `on_cycle` observes every cycle outcome; the CLI hangs its event stream
/// and raw-sample log off it.
pub fn run<R>(
    sensor: R,
    params: RunParams,
    shutdown: Arc<AtomicBool>,
    on_cycle: impl FnMut(&CycleStatus),
) -> CoreResult<(RunSummary, Detector)>
where
    R: RangeFinder + Send + 'static,
{
    match params.sampling {
        SamplingMode::Direct => run_direct(sensor, params, shutdown, on_cycle),
        SamplingMode::Event | SamplingMode::Paced(_) => {
            run_with_sampler(sensor, params, shutdown, on_cycle)
        }
    }
}

fn run_direct<R>(
    sensor: R,
    params: RunParams,
    shutdown: Arc<AtomicBool>,
    mut on_cycle: impl FnMut(&CycleStatus),
) -> CoreResult<(RunSummary, Detector)>
where
    R: RangeFinder + 'static,
{
    let RunParams {
        mode,
        tuning,
        timeouts,
        lanes,
        sample_rate_hz,
        max_cycles,
        ..
    } = params;
    let period_us = crate::util::period_us(sample_rate_hz);

    let inner = crate::build_detector(
        Box::new(sensor) as Box<dyn RangeFinder>,
        mode,
        tuning,
        timeouts,
        lanes,
        None,
    )?;
    let mut detector = Detector { inner };
    detector.begin();
    tracing::info!(
        strategy = ?detector.mode(),
        lanes = detector.lanes().len(),
        mode = "direct",
        "count start"
    );

    let mut processed: u64 = 0;
    loop {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }
        let status = detector.step();
        if matches!(status, CycleStatus::Processed(_)) {
            processed += 1;
        }
        on_cycle(&status);
        if max_cycles.is_some_and(|m| processed >= m) {
            break;
        }
        // Fixed-period driver loop; the trigger/read above is the only
        // per-cycle sensor interaction.
        std::thread::sleep(Duration::from_micros(period_us));
    }
    Ok(finish(detector))
}

fn run_with_sampler<R>(
    sensor: R,
    params: RunParams,
    shutdown: Arc<AtomicBool>,
    mut on_cycle: impl FnMut(&CycleStatus),
) -> CoreResult<(RunSummary, Detector)>
where
    R: RangeFinder + Send + 'static,
{
    // Use the shared NoopRangeFinder since step_from_raw won't call read()
    use crate::mocks::NoopRangeFinder;

    let RunParams {
        mode,
        tuning,
        timeouts,
        lanes,
        sampling,
        sample_rate_hz,
        max_cycles,
    } = params;
    let period_us = crate::util::period_us(sample_rate_hz);
    let period_ms = crate::util::period_ms(sample_rate_hz);
    let stall_threshold_ms = compute_stall_threshold_ms(timeouts.sensor_ms, period_ms);

    let sampler_timeout = Duration::from_millis(timeouts.sensor_ms);
    let sampler = match sampling {
        SamplingMode::Event => Sampler::spawn_event(sensor, sampler_timeout, MonotonicClock::new()),
        SamplingMode::Paced(hz) => {
            Sampler::spawn(sensor, hz, sampler_timeout, MonotonicClock::new())
        }
        SamplingMode::Direct => unreachable!(),
    };

    // Build the detector around the no-op sensor; it only ever receives
    // samples via step_from_raw.
    let inner = crate::build_detector(
        Box::new(NoopRangeFinder) as Box<dyn RangeFinder>,
        mode,
        tuning,
        timeouts,
        lanes,
        None,
    )?;
    let mut detector = Detector { inner };
    detector.begin();
    tracing::info!(
        strategy = ?detector.mode(),
        lanes = detector.lanes().len(),
        mode = "sampler",
        "count start"
    );

    let start = std::time::Instant::now();
    let mut processed: u64 = 0;
    loop {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }
        let elapsed_ms: u64 = {
            let ms = start.elapsed().as_millis();
            (ms.min(u128::from(u64::MAX))) as u64
        };

        if let Some(reading) = sampler.latest() {
            let report = detector.step_from_raw(reading);
            processed += 1;
            on_cycle(&CycleStatus::Processed(report));
        } else {
            let stalled_ms = sampler.stalled_for_now();
            if stalled_now(elapsed_ms, stalled_ms, stall_threshold_ms) {
                // No fresh sample within the watchdog window: feed the far
                // substitute so presence decays instead of freezing.
                tracing::debug!(stalled_ms, "sampler stalled; substituting far reading");
                let report = detector.step_from_raw(RangeReading::weak());
                processed += 1;
                on_cycle(&CycleStatus::Processed(report));
            }
            // avoid busy spin while waiting for the next sample
            std::thread::sleep(Duration::from_micros(period_us));
        }

        if max_cycles.is_some_and(|m| processed >= m) {
            break;
        }
    }
    Ok(finish(detector))
}

fn finish(detector: Detector) -> (RunSummary, Detector) {
    let summary = RunSummary {
        totals: detector.totals().to_vec(),
        cycles: detector.cycles(),
        skipped: detector.skipped(),
    };
    tracing::info!(
        totals = ?summary.totals,
        cycles = summary.cycles,
        skipped = summary.skipped,
        "count stop"
    );
    (summary, detector)
}
