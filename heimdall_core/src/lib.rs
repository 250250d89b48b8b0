#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core lane-occupancy detection (hardware-agnostic).
//!
//! This crate provides the hardware-independent counting engine. All sensor
//! interaction goes through the `heimdall_traits::RangeFinder` trait.
//!
//! ## Architecture
//!
//! - **Strategies**: the three occupancy variants (`strategy` module)
//! - **Lanes**: per-lane config, state, and departure events (`lane` module)
//! - **Buffers**: decision window and diagnostics history (`ring` module)
//! - **Histogram**: 10 cm distance bins for zone tuning (`histogram` module)
//! - **Orchestration**: `DetectorCore` per-cycle step, `runner`, `sampler`
//!
//! Distances are whole centimeters (`i32`) end to end; the only floating
//! point is the per-lane EMA and decay strength.

// Module declarations
pub mod error;
pub mod histogram;
pub mod lane;
pub mod mocks;
pub mod ring;
pub mod runner;
pub mod sampler;
pub mod strategy;
pub mod util;

mod conversions;

use crate::error::{BuildError, DetectorError, Result};
use crate::lane::LaneState;
use heimdall_traits::clock::{Clock, MonotonicClock};
use heimdall_traits::{RangeFinder, RangeReading};
use std::time::Duration;
use std::time::Instant;

// For typed hardware error mapping
#[cfg(feature = "hardware-errors")]
use heimdall_hardware::error::HwError;

pub use histogram::DistanceHistogram;
pub use lane::{LaneConfig, LaneEvent};
pub use ring::SampleRing;
pub use strategy::DetectionMode;

use std::sync::Arc;

/// Detector tuning shared by all strategies.
#[derive(Debug, Clone)]
pub struct DetectorTuning {
    /// EMA pole for the smoothed-threshold strategy; higher = slower
    /// response. Range [0.0, 1.0).
    pub smoothing_alpha: f32,
    /// Decision window capacity in samples.
    pub window: usize,
    /// Diagnostics history capacity in samples.
    pub history_window: usize,
}

impl Default for DetectorTuning {
    fn default() -> Self {
        Self {
            smoothing_alpha: 0.6,
            window: 25,
            history_window: 150,
        }
    }
}

/// Timeouts and watchdogs.
#[derive(Debug, Clone)]
pub struct Timeouts {
    /// Max sensor wait per read (ms)
    pub sensor_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { sensor_ms: 50 }
    }
}

/// Public outcome of a single detection cycle.
#[derive(Debug, Clone)]
pub enum CycleStatus {
    /// A sample was consumed; lane state advanced.
    Processed(CycleReport),
    /// Protocol error on the sensor read; nothing was mutated.
    Skipped(DetectorError),
}

/// What one processed cycle did.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Milliseconds since the detector epoch (see [`DetectorCore::begin`]).
    pub ms_since_start: u64,
    /// The normalized distance the active strategy consumed.
    pub distance_cm: i32,
    /// Departure events fired this cycle, at most one per lane.
    pub departures: Vec<LaneEvent>,
}

/// Unified core for both dynamic (boxed) and generic (static dispatch)
/// variants.
pub struct DetectorCore<R: RangeFinder> {
    sensor: R,
    mode: DetectionMode,
    tuning: DetectorTuning,
    timeouts: Timeouts,
    lanes: Vec<LaneConfig>,
    states: Vec<LaneState>,
    totals: Vec<u64>,
    // Decision window; the voting strategies read it, all strategies feed it
    window: SampleRing,
    // Longer ring kept for visualization/diagnostics only
    history: SampleRing,
    histogram: DistanceHistogram,
    // Low-pass of the shared input stream; what the threshold strategy
    // records to the histogram and window (the per-lane EMAs drive presence)
    smoothed_trace: f32,
    // Unified clock for deterministic time in tests
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    // Epoch Instant for computing monotonic milliseconds
    epoch: Instant,
    cycles: u64,
    skipped: u64,
}

impl<R: RangeFinder> core::fmt::Debug for DetectorCore<R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DetectorCore")
            .field("mode", &self.mode)
            .field("lanes", &self.lanes.len())
            .field("totals", &self.totals)
            .field("cycles", &self.cycles)
            .finish()
    }
}

impl<R: RangeFinder> DetectorCore<R> {
    /// One iteration of the detection loop: read the sensor, then advance.
    ///
    /// Never fails: a dropout (timeout, weak return) is substituted with the
    /// far sentinel and processed normally; a protocol error skips the cycle
    /// with no state mutation.
    pub fn step(&mut self) -> CycleStatus {
        let timeout = Duration::from_millis(self.timeouts.sensor_ms);
        match self.sensor.read(timeout) {
            Ok(reading) => CycleStatus::Processed(self.step_from_raw(reading)),
            Err(e) => match classify_read_error(&*e) {
                ReadFailure::Dropout => {
                    tracing::debug!(error = %e, "sensor dropout; substituting far reading");
                    CycleStatus::Processed(self.step_from_raw(RangeReading::weak()))
                }
                ReadFailure::Protocol(msg) => {
                    self.skipped += 1;
                    let err = DetectorError::Protocol(msg);
                    tracing::warn!(error = %err, "sensor protocol error; cycle skipped");
                    CycleStatus::Skipped(err)
                }
            },
        }
    }

    /// Process a pre-sampled reading (sampler integration and tests).
    pub fn step_from_raw(&mut self, reading: RangeReading) -> CycleReport {
        let now = self.clock.ms_since(self.epoch);
        let distance_cm = self.mode.normalize(reading);
        self.cycles += 1;

        match self.mode {
            DetectionMode::SmoothedThreshold => {
                let alpha = self.tuning.smoothing_alpha;
                self.smoothed_trace =
                    self.smoothed_trace * alpha + distance_cm as f32 * (1.0 - alpha);
                let recorded = self.smoothed_trace as i32;
                self.histogram.record(recorded);
                self.window.push(recorded);
            }
            DetectionMode::VotingWindow | DetectionMode::StrengthDecay => {
                self.histogram.record(distance_cm);
                self.window.push(distance_cm);
                self.history.push(distance_cm);
            }
        }

        let mut departures = Vec::new();
        for (idx, (lane, st)) in self
            .lanes
            .iter()
            .zip(self.states.iter_mut())
            .enumerate()
        {
            match self.mode {
                DetectionMode::SmoothedThreshold => {
                    strategy::update_threshold(
                        lane,
                        st,
                        self.tuning.smoothing_alpha,
                        distance_cm,
                        now,
                    );
                }
                DetectionMode::VotingWindow => {
                    let vote = strategy::zone_vote_pct(&self.window, lane);
                    strategy::update_voting(lane, st, vote);
                }
                DetectionMode::StrengthDecay => {
                    let vote = strategy::zone_vote_pct(&self.window, lane);
                    strategy::update_decay(lane, st, vote, distance_cm);
                }
            }

            // Count on exit: one event per present -> absent transition.
            if st.previous_present && !st.present {
                self.totals[idx] += 1;
                let event = LaneEvent {
                    lane: idx,
                    total: self.totals[idx],
                };
                tracing::info!(
                    lane = idx,
                    label = %lane.label(idx),
                    total = event.total,
                    "lane departure"
                );
                departures.push(event);
            }
            st.previous_present = st.present;
        }

        CycleReport {
            ms_since_start: now,
            distance_cm,
            departures,
        }
    }

    /// Reset all per-run state and re-anchor the epoch. Call before a run.
    pub fn begin(&mut self) {
        self.epoch = self.clock.now();
        let now = self.clock.ms_since(self.epoch); // will be 0
        for st in &mut self.states {
            st.reset(now);
        }
        for t in &mut self.totals {
            *t = 0;
        }
        self.window.clear();
        self.history.clear();
        self.histogram.clear();
        self.smoothed_trace = 0.0;
        self.cycles = 0;
        self.skipped = 0;
    }

    /// Whether a lane currently reads as occupied. Unknown indices are
    /// never present.
    pub fn is_present(&self, lane: usize) -> bool {
        self.states.get(lane).is_some_and(|s| s.present)
    }

    /// Running departure totals, one per configured lane.
    pub fn totals(&self) -> &[u64] {
        &self.totals
    }

    /// Reset one lane to "absent" without touching its departure total.
    pub fn reset_lane(&mut self, lane: usize) -> Result<()> {
        let now = self.clock.ms_since(self.epoch);
        let st = self
            .states
            .get_mut(lane)
            .ok_or_else(|| eyre::Report::new(DetectorError::UnknownLane(lane)))?;
        st.reset(now);
        Ok(())
    }

    pub fn clear_histogram(&mut self) {
        self.histogram.clear();
    }

    pub fn histogram_table(&self) -> String {
        self.histogram.render_table()
    }

    pub fn histogram_chart(&self, max_distance_cm: i32) -> String {
        self.histogram.render_chart(max_distance_cm)
    }

    pub fn histogram(&self) -> &DistanceHistogram {
        &self.histogram
    }

    pub fn window(&self) -> &SampleRing {
        &self.window
    }

    pub fn history(&self) -> &SampleRing {
        &self.history
    }

    pub fn lanes(&self) -> &[LaneConfig] {
        &self.lanes
    }

    pub fn mode(&self) -> DetectionMode {
        self.mode
    }

    /// Processed cycles since the last `begin()`.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Cycles skipped on protocol errors since the last `begin()`.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

/// Public dynamic (boxed) detector that hides the sensor type via
/// composition.
pub struct Detector {
    inner: DetectorCore<Box<dyn RangeFinder>>,
}

impl core::fmt::Debug for Detector {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Detector")
            .field("mode", &self.inner.mode)
            .field("lanes", &self.inner.lanes.len())
            .field("totals", &self.inner.totals)
            .field("cycles", &self.inner.cycles)
            .finish()
    }
}

impl Detector {
    /// Start building a Detector.
    pub fn builder() -> DetectorBuilder<Missing, Missing> {
        DetectorBuilder::default()
    }

    /// One iteration of the detection loop.
    pub fn step(&mut self) -> CycleStatus {
        self.inner.step()
    }

    /// Process a pre-sampled reading (sampler integration and tests).
    pub fn step_from_raw(&mut self, reading: RangeReading) -> CycleReport {
        self.inner.step_from_raw(reading)
    }

    /// Reset all per-run state and re-anchor the epoch. Call before a run.
    pub fn begin(&mut self) {
        self.inner.begin();
    }

    pub fn is_present(&self, lane: usize) -> bool {
        self.inner.is_present(lane)
    }

    pub fn totals(&self) -> &[u64] {
        self.inner.totals()
    }

    pub fn reset_lane(&mut self, lane: usize) -> Result<()> {
        self.inner.reset_lane(lane)
    }

    pub fn clear_histogram(&mut self) {
        self.inner.clear_histogram();
    }

    pub fn histogram_table(&self) -> String {
        self.inner.histogram_table()
    }

    pub fn histogram_chart(&self, max_distance_cm: i32) -> String {
        self.inner.histogram_chart(max_distance_cm)
    }

    pub fn histogram(&self) -> &DistanceHistogram {
        self.inner.histogram()
    }

    pub fn window(&self) -> &SampleRing {
        self.inner.window()
    }

    pub fn history(&self) -> &SampleRing {
        self.inner.history()
    }

    pub fn lanes(&self) -> &[LaneConfig] {
        self.inner.lanes()
    }

    pub fn mode(&self) -> DetectionMode {
        self.inner.mode()
    }

    pub fn cycles(&self) -> u64 {
        self.inner.cycles()
    }

    pub fn skipped(&self) -> u64 {
        self.inner.skipped()
    }
}

/// How a failed sensor read is handled.
enum ReadFailure {
    /// No usable measurement this cycle; substitute the far sentinel.
    Dropout,
    /// Corrupt frame or serial fault; skip the cycle untouched.
    Protocol(String),
}

// Classify any read error, with special handling for typed hardware errors.
fn classify_read_error(e: &(dyn std::error::Error + 'static)) -> ReadFailure {
    #[cfg(feature = "hardware-errors")]
    if let Some(hw) = e.downcast_ref::<HwError>() {
        return match hw {
            HwError::Timeout => ReadFailure::Dropout,
            other => ReadFailure::Protocol(other.to_string()),
        };
    }
    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        ReadFailure::Dropout
    } else {
        ReadFailure::Protocol(s)
    }
}

// Type-state markers for the builder
pub struct Missing;
pub struct Set;

use std::marker::PhantomData;

/// Builder for `Detector`. All fields are validated on `build()`.
pub struct DetectorBuilder<S, L> {
    sensor: Option<Box<dyn RangeFinder>>,
    lanes: Option<Vec<LaneConfig>>,
    mode: Option<DetectionMode>,
    tuning: Option<DetectorTuning>,
    timeouts: Option<Timeouts>,
    // Optional clock for tests (accept Box here)
    clock: Option<Box<dyn Clock + Send + Sync>>,
    // Type-state markers
    _s: PhantomData<S>,
    _l: PhantomData<L>,
}

impl Default for DetectorBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            sensor: None,
            lanes: None,
            mode: None,
            tuning: None,
            timeouts: None,
            clock: None,
            _s: PhantomData,
            _l: PhantomData,
        }
    }
}

impl<S, L> DetectorBuilder<S, L> {
    /// Fallible build available in any type-state; returns a detailed
    /// `BuildError` for missing pieces.
    pub fn try_build(self) -> Result<Detector> {
        let DetectorBuilder {
            sensor,
            lanes,
            mode,
            tuning,
            timeouts,
            clock,
            _s: _,
            _l: _,
        } = self;

        let sensor = sensor.ok_or_else(|| eyre::Report::new(BuildError::MissingSensor))?;
        let lanes = lanes.ok_or_else(|| eyre::Report::new(BuildError::MissingLanes))?;

        let inner = build_detector(
            sensor,
            mode.unwrap_or_default(),
            tuning.unwrap_or_default(),
            timeouts.unwrap_or_default(),
            lanes,
            clock,
        )?;
        Ok(Detector { inner })
    }
}

/// Chainable setters that do not affect type-state
impl<S, L> DetectorBuilder<S, L> {
    pub fn with_mode(mut self, mode: DetectionMode) -> Self {
        self.mode = Some(mode);
        self
    }
    pub fn with_tuning(mut self, tuning: DetectorTuning) -> Self {
        self.tuning = Some(tuning);
        self
    }
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = Some(timeouts);
        self
    }
    /// Provide a custom clock implementation; defaults to MonotonicClock when not provided.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
}

// Setters that advance type-state when providing mandatory components
impl<L> DetectorBuilder<Missing, L> {
    pub fn with_sensor(self, sensor: impl RangeFinder + 'static) -> DetectorBuilder<Set, L> {
        let DetectorBuilder {
            sensor: _,
            lanes,
            mode,
            tuning,
            timeouts,
            clock,
            _s: _,
            _l: _,
        } = self;
        DetectorBuilder {
            sensor: Some(Box::new(sensor)),
            lanes,
            mode,
            tuning,
            timeouts,
            clock,
            _s: PhantomData,
            _l: PhantomData,
        }
    }
}

impl<S> DetectorBuilder<S, Missing> {
    pub fn with_lanes(self, lanes: Vec<LaneConfig>) -> DetectorBuilder<S, Set> {
        let DetectorBuilder {
            sensor,
            lanes: _,
            mode,
            tuning,
            timeouts,
            clock,
            _s: _,
            _l: _,
        } = self;
        DetectorBuilder {
            sensor,
            lanes: Some(lanes),
            mode,
            tuning,
            timeouts,
            clock,
            _s: PhantomData,
            _l: PhantomData,
        }
    }
}

impl DetectorBuilder<Set, Set> {
    /// Validate and build the Detector. Only available when a sensor and a
    /// lane set are provided.
    pub fn build(self) -> Result<Detector> {
        self.try_build()
    }
}

/// Generic, statically-dispatched alias using the unified core.
pub type DetectorG<R> = DetectorCore<R>;

/// Build a generic, statically-dispatched DetectorG from a concrete sensor.
pub fn build_detector<R>(
    sensor: R,
    mode: DetectionMode,
    tuning: DetectorTuning,
    timeouts: Timeouts,
    lanes: Vec<LaneConfig>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
) -> Result<DetectorG<R>>
where
    R: RangeFinder + 'static,
{
    if lanes.is_empty() {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "at least one lane is required",
        )));
    }
    let alpha = tuning.smoothing_alpha;
    if !alpha.is_finite() || !(0.0..1.0).contains(&alpha) {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "smoothing_alpha must be in [0.0, 1.0)",
        )));
    }
    if timeouts.sensor_ms == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "sensor_ms must be >= 1",
        )));
    }
    let far = mode.far_sentinel_cm();
    for lane in &lanes {
        if lane.min_cm < 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "lane min_cm must be >= 0",
            )));
        }
        if lane.min_cm >= lane.max_cm {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "lane min_cm must be < max_cm",
            )));
        }
        // A zone reaching the far sentinel would read every dropout as an
        // occupied lane.
        if lane.max_cm >= far {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "lane max_cm must be below the far sentinel",
            )));
        }
        if lane.vote_threshold_pct > 100 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "vote_threshold_pct must be <= 100",
            )));
        }
    }
    // Overlapping zones double-count a single reflection. Shared boundaries
    // are fine: the in-zone test is strictly inside.
    for i in 0..lanes.len() {
        for j in (i + 1)..lanes.len() {
            if lanes[i].min_cm < lanes[j].max_cm && lanes[j].min_cm < lanes[i].max_cm {
                return Err(eyre::Report::new(BuildError::InvalidConfig(
                    "lane zones must not overlap",
                )));
            }
        }
    }

    let clock: Arc<dyn Clock + Send + Sync> = match clock {
        Some(b) => Arc::from(b),
        None => Arc::new(MonotonicClock::new()),
    };

    // Sanitize window capacities rather than reject; a degenerate window
    // still yields a working single-sample vote.
    let window_cap = tuning.window.max(1);
    let history_cap = tuning.history_window.max(window_cap);

    let epoch = clock.now();
    let now = clock.ms_since(epoch); // 0
    let states = lanes.iter().map(|_| LaneState::new(now)).collect();
    let totals = vec![0; lanes.len()];

    Ok(DetectorG {
        sensor,
        mode,
        tuning,
        timeouts,
        lanes,
        states,
        totals,
        window: SampleRing::new(window_cap),
        history: SampleRing::new(history_cap),
        histogram: DistanceHistogram::new(),
        smoothed_trace: 0.0,
        clock,
        epoch,
        cycles: 0,
        skipped: 0,
    })
}
