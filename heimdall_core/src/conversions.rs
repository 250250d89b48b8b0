//! `From` implementations bridging `heimdall_config` types to
//! `heimdall_core` types.
//!
//! These keep the CLI free of field-by-field mapping.

use crate::lane::LaneConfig;
use crate::runner::SamplingMode;
use crate::strategy::DetectionMode;
use crate::{DetectorTuning, Timeouts};

// ── DetectionMode ────────────────────────────────────────────────────────────

impl From<heimdall_config::Algorithm> for DetectionMode {
    fn from(a: heimdall_config::Algorithm) -> Self {
        match a {
            heimdall_config::Algorithm::Threshold => Self::SmoothedThreshold,
            heimdall_config::Algorithm::Voting => Self::VotingWindow,
            heimdall_config::Algorithm::Decay => Self::StrengthDecay,
        }
    }
}

// ── DetectorTuning ───────────────────────────────────────────────────────────

impl From<&heimdall_config::DetectorCfg> for DetectorTuning {
    fn from(c: &heimdall_config::DetectorCfg) -> Self {
        Self {
            smoothing_alpha: c.smoothing_alpha,
            window: c.window,
            history_window: c.history_window,
        }
    }
}

// ── LaneConfig ───────────────────────────────────────────────────────────────

impl From<&heimdall_config::LaneCfg> for LaneConfig {
    fn from(c: &heimdall_config::LaneCfg) -> Self {
        Self {
            name: c.name.clone(),
            min_cm: c.min_cm,
            max_cm: c.max_cm,
            residence_ms: c.residence_ms,
            vote_threshold_pct: c.vote_threshold_pct,
        }
    }
}

// ── Timeouts ─────────────────────────────────────────────────────────────────

impl From<&heimdall_config::SensorCfg> for Timeouts {
    fn from(c: &heimdall_config::SensorCfg) -> Self {
        Self {
            sensor_ms: c.read_timeout_ms,
        }
    }
}

// ── SamplingMode ─────────────────────────────────────────────────────────────

impl From<&heimdall_config::SensorCfg> for SamplingMode {
    fn from(c: &heimdall_config::SensorCfg) -> Self {
        match c.mode {
            heimdall_config::RunMode::Direct => Self::Direct,
            heimdall_config::RunMode::Event => Self::Event,
            heimdall_config::RunMode::Paced => Self::Paced(c.sample_rate_hz),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The config crate validates zones against its own sentinel table; the
    // two must stay in agreement or validation would pass configs the
    // detector then misreads.
    #[test]
    fn far_sentinels_agree_with_config_validation() {
        for (algo, toml_name) in [
            (heimdall_config::Algorithm::Threshold, "threshold"),
            (heimdall_config::Algorithm::Voting, "voting"),
            (heimdall_config::Algorithm::Decay, "decay"),
        ] {
            let cfg = heimdall_config::load_toml(&format!(
                "[detector]\nalgorithm = \"{toml_name}\"\n\n[[lane]]\nmin_cm = 0\nmax_cm = 300\n"
            ))
            .expect("parse");
            let mode: DetectionMode = algo.into();
            assert_eq!(cfg.far_sentinel_cm(), mode.far_sentinel_cm());
        }
    }
}
