//! The three mutually exclusive lane-occupancy strategies.
//!
//! All three consume the same normalized sample stream and share the edge
//! detection done by the detector; they differ in how a lane decides
//! `present`:
//!
//! - `SmoothedThreshold` low-passes the distance and requires a continuous
//!   residence time inside the zone.
//! - `VotingWindow` takes an in-zone percentage vote over the decision
//!   window. No hysteresis; flicker near the exact threshold is a known
//!   limitation.
//! - `StrengthDecay` saturates a 0-100 strength on a winning vote and decays
//!   it geometrically while the raw signal is beyond the far bound. Closer
//!   returns neither add nor decay, which tolerates shadowing by nearer
//!   vehicles.

use heimdall_traits::RangeReading;

use crate::lane::{LaneConfig, LaneState};
use crate::ring::SampleRing;

/// Fraction of remaining strength shed per out-of-zone cycle (decay
/// strategy).
pub const STRENGTH_DECAY: f32 = 0.05;
/// Presence floor for the decaying strength; asymmetric against the rising
/// vote threshold to prevent chatter.
pub const PRESENCE_FLOOR: f32 = 10.0;

/// Which occupancy strategy drives lane decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectionMode {
    #[default]
    SmoothedThreshold,
    VotingWindow,
    StrengthDecay,
}

impl DetectionMode {
    /// The "no target" distance substituted for weak or invalid returns.
    /// The voting strategies also clamp real returns here so one sample
    /// cannot escape the histogram range.
    #[inline]
    pub fn far_sentinel_cm(self) -> i32 {
        match self {
            Self::SmoothedThreshold => 1200,
            Self::VotingWindow | Self::StrengthDecay => 999,
        }
    }

    /// Map a raw reading onto the distance the strategy consumes. The sensor
    /// reports zero or negative when very close or when nothing reflects;
    /// both mean "no target in range" for this geometry.
    pub(crate) fn normalize(self, reading: RangeReading) -> i32 {
        let far = self.far_sentinel_cm();
        match self {
            Self::SmoothedThreshold => {
                if reading.is_weak() || reading.distance_cm <= 0 {
                    far
                } else {
                    reading.distance_cm
                }
            }
            Self::VotingWindow | Self::StrengthDecay => {
                if reading.is_weak() || reading.distance_cm <= 0 || reading.distance_cm > far {
                    far
                } else {
                    reading.distance_cm
                }
            }
        }
    }
}

/// Integer percentage of currently-held window samples inside the lane.
pub(crate) fn zone_vote_pct(window: &SampleRing, lane: &LaneConfig) -> u32 {
    if window.is_empty() {
        return 0;
    }
    (100 * window.count_inside(lane.min_cm, lane.max_cm) as u32) / window.len() as u32
}

/// Smoothed-threshold update for one lane. The per-lane low-pass keeps a
/// vehicle parked across two zones from coupling their timers.
pub(crate) fn update_threshold(
    lane: &LaneConfig,
    st: &mut LaneState,
    alpha: f32,
    distance_cm: i32,
    now_ms: u64,
) {
    st.smoothed = st.smoothed * alpha + distance_cm as f32 * (1.0 - alpha);
    let inside = st.smoothed > lane.min_cm as f32 && st.smoothed < lane.max_cm as f32;
    if inside {
        let time_in_range = now_ms.saturating_sub(st.first_in_range_ms);
        if time_in_range > lane.residence_ms {
            st.present = true;
        }
    } else {
        st.first_in_range_ms = now_ms;
        st.present = false;
    }
}

/// Voting-window update for one lane: strict majority-style vote, no memory.
pub(crate) fn update_voting(lane: &LaneConfig, st: &mut LaneState, vote_pct: u32) {
    st.present = vote_pct > u32::from(lane.vote_threshold_pct);
}

/// Strength-decay update for one lane. Saturation and decay can both apply
/// in the same cycle; a winning vote while the raw sample is already beyond
/// the zone ends the cycle at 95.
pub(crate) fn update_decay(lane: &LaneConfig, st: &mut LaneState, vote_pct: u32, raw_cm: i32) {
    if vote_pct > u32::from(lane.vote_threshold_pct) {
        st.strength = 100.0;
    }
    if raw_cm > lane.max_cm {
        st.strength -= st.strength * STRENGTH_DECAY;
    }
    st.present = st.strength > PRESENCE_FLOOR;
}

#[cfg(test)]
mod tests {
    use super::*;
    use heimdall_traits::RangeReading;
    use rstest::rstest;

    #[rstest]
    #[case(DetectionMode::SmoothedThreshold, 1200)]
    #[case(DetectionMode::VotingWindow, 999)]
    #[case(DetectionMode::StrengthDecay, 999)]
    fn weak_readings_normalize_to_the_far_sentinel(
        #[case] mode: DetectionMode,
        #[case] far: i32,
    ) {
        assert_eq!(mode.normalize(RangeReading::weak()), far);
        assert_eq!(mode.normalize(RangeReading::target(0)), far);
        assert_eq!(mode.normalize(RangeReading::target(-3)), far);
    }

    #[test]
    fn voting_modes_clamp_long_returns() {
        let m = DetectionMode::VotingWindow;
        assert_eq!(m.normalize(RangeReading::target(1000)), 999);
        assert_eq!(m.normalize(RangeReading::target(999)), 999);
        assert_eq!(m.normalize(RangeReading::target(998)), 998);
        // The threshold mode passes long returns through untouched.
        let t = DetectionMode::SmoothedThreshold;
        assert_eq!(t.normalize(RangeReading::target(1000)), 1000);
    }

    #[test]
    fn vote_pct_uses_currently_held_count() {
        let lane = LaneConfig::default(); // (0, 300)
        let mut window = SampleRing::new(25);
        assert_eq!(zone_vote_pct(&window, &lane), 0);
        window.push(100);
        window.push(999);
        // 1 of 2 held samples in zone.
        assert_eq!(zone_vote_pct(&window, &lane), 50);
    }

    #[test]
    fn decay_saturates_then_sheds_five_percent_per_far_cycle() {
        let lane = LaneConfig::default();
        let mut st = LaneState::new(0);
        update_decay(&lane, &mut st, 50, 100);
        assert_eq!(st.strength, 100.0);
        assert!(st.present);
        // Vote lost, raw beyond the zone: geometric decay.
        update_decay(&lane, &mut st, 0, 999);
        assert!((st.strength - 95.0).abs() < 1e-4);
        // Raw inside or closer than the zone: strength holds.
        update_decay(&lane, &mut st, 0, 100);
        assert!((st.strength - 95.0).abs() < 1e-4);
    }

    #[test]
    fn decay_can_saturate_and_decay_in_one_cycle() {
        let lane = LaneConfig::default();
        let mut st = LaneState::new(0);
        update_decay(&lane, &mut st, 50, 999);
        assert!((st.strength - 95.0).abs() < 1e-4);
    }
}
