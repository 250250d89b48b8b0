//! Per-lane configuration, mutable detection state, and departure events.

/// One monitored lane: a distance band plus tuning for the active strategy.
#[derive(Debug, Clone)]
pub struct LaneConfig {
    /// Display name used in logs and events; falls back to the lane index.
    pub name: Option<String>,
    /// Zone bounds in centimeters. The occupancy test is strictly inside.
    pub min_cm: i32,
    pub max_cm: i32,
    /// Smoothed-threshold strategy: continuous in-zone time (ms) before a
    /// target counts as present.
    pub residence_ms: u64,
    /// Voting/decay strategies: in-zone vote percentage that must be
    /// exceeded.
    pub vote_threshold_pct: u8,
}

impl Default for LaneConfig {
    fn default() -> Self {
        Self {
            name: None,
            min_cm: 0,
            max_cm: 300,
            residence_ms: 200,
            vote_threshold_pct: 15,
        }
    }
}

impl LaneConfig {
    /// Strictly-inside zone test; samples on either bound do not count.
    #[inline]
    pub fn contains(&self, distance_cm: i32) -> bool {
        distance_cm > self.min_cm && distance_cm < self.max_cm
    }

    /// Display label: the configured name, or `lane{index}` when unnamed.
    pub fn label(&self, index: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("lane{index}"))
    }
}

/// Mutable per-lane detection state. Mutated exactly once per cycle by the
/// owning detector; reset to "absent" on (re)initialization so a power cycle
/// during an occupancy cannot fabricate a phantom departure.
#[derive(Debug, Clone)]
pub(crate) struct LaneState {
    pub present: bool,
    pub previous_present: bool,
    /// Anchor for residence timing (ms since the detector epoch). While the
    /// signal is out of zone this is dragged along to "now", so in-zone time
    /// always measures one continuous visit.
    pub first_in_range_ms: u64,
    /// Smoothed-threshold strategy: per-lane low-pass of the distance.
    pub smoothed: f32,
    /// Decay strategy: 0-100 occupancy confidence.
    pub strength: f32,
}

impl LaneState {
    pub fn new(now_ms: u64) -> Self {
        Self {
            present: false,
            previous_present: false,
            first_in_range_ms: now_ms,
            smoothed: 0.0,
            strength: 0.0,
        }
    }

    pub fn reset(&mut self, now_ms: u64) {
        *self = Self::new(now_ms);
    }
}

/// Edge-triggered "target left the lane" event; the unit of counting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaneEvent {
    /// Index into the configured lane set.
    pub lane: usize,
    /// Running departure total for that lane, including this event.
    pub total: u64,
}
