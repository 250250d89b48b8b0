#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the counting device.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Defaults mirror the shipped device profile: threshold algorithm,
//!   alpha 0.6, a 25-sample decision window, 150-sample history, and two
//!   lanes at [0,300] and [400,700] cm in the sample config.
use serde::Deserialize;

/// Which occupancy algorithm drives lane decisions.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// EMA smoothing plus residence time per lane.
    #[default]
    Threshold,
    /// Percentage vote over the decision window, no hysteresis.
    Voting,
    /// Saturating strength with exponential decay.
    Decay,
}

/// How samples are acquired each cycle.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Trigger a measurement and block for the reply inside the loop.
    #[default]
    Direct,
    /// Sensor free-runs; a read blocks until the next frame.
    Event,
    /// Background sampler thread polls at the configured rate.
    Paced,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SensorCfg {
    /// Poll rate of the driver loop (Hz). 66 Hz is the ~15 ms device cycle.
    pub sample_rate_hz: u32,
    /// Max time to wait for one measurement before treating it as dropout.
    pub read_timeout_ms: u64,
    pub mode: RunMode,
    /// Serial device for hardware builds; ignored in simulation.
    pub port: String,
    pub baud: u32,
}

impl Default for SensorCfg {
    fn default() -> Self {
        Self {
            sample_rate_hz: 66,
            read_timeout_ms: 50,
            mode: RunMode::Direct,
            port: "/dev/ttyAMA0".to_string(),
            baud: 115_200,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DetectorCfg {
    pub algorithm: Algorithm,
    /// EMA pole for the threshold algorithm; higher = slower response.
    /// Range [0.0, 1.0).
    pub smoothing_alpha: f32,
    /// Decision window length in samples.
    pub window: usize,
    /// Diagnostics history length in samples.
    pub history_window: usize,
}

impl Default for DetectorCfg {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Threshold,
            smoothing_alpha: 0.6,
            window: 25,
            history_window: 150,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LaneCfg {
    /// Optional display name; events fall back to the lane index.
    pub name: Option<String>,
    /// Zone bounds in centimeters; occupancy tests strictly inside.
    pub min_cm: i32,
    pub max_cm: i32,
    /// Threshold algorithm: continuous in-zone time before "present".
    pub residence_ms: u64,
    /// Voting/decay algorithms: in-zone vote percentage cutoff.
    pub vote_threshold_pct: u8,
}

impl Default for LaneCfg {
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

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub sensor: SensorCfg,
    #[serde(default)]
    pub detector: DetectorCfg,
    /// One `[[lane]]` table per monitored lane; at least one required.
    #[serde(default, rename = "lane")]
    pub lanes: Vec<LaneCfg>,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    /// The "no target" stand-in distance the active algorithm substitutes
    /// for weak or absent returns. Zones must sit entirely below it, or a
    /// dropout would read as an occupied lane.
    pub fn far_sentinel_cm(&self) -> i32 {
        match self.detector.algorithm {
            Algorithm::Threshold => 1200,
            Algorithm::Voting | Algorithm::Decay => 999,
        }
    }

    pub fn validate(&self) -> eyre::Result<()> {
        // Sensor
        if self.sensor.sample_rate_hz == 0 {
            eyre::bail!("sensor.sample_rate_hz must be > 0");
        }
        if self.sensor.sample_rate_hz > 1000 {
            eyre::bail!("sensor.sample_rate_hz is unreasonably large (>1000)");
        }
        if self.sensor.read_timeout_ms == 0 {
            eyre::bail!("sensor.read_timeout_ms must be >= 1");
        }
        if self.sensor.baud == 0 {
            eyre::bail!("sensor.baud must be > 0");
        }

        // Detector
        let alpha = self.detector.smoothing_alpha;
        if !(0.0..1.0).contains(&alpha) {
            eyre::bail!("detector.smoothing_alpha must be in [0.0, 1.0)");
        }
        if self.detector.window == 0 {
            eyre::bail!("detector.window must be >= 1");
        }
        if self.detector.window > 10_000 {
            eyre::bail!("detector.window is unreasonably large (>10000)");
        }
        if self.detector.history_window < self.detector.window {
            eyre::bail!("detector.history_window must be >= detector.window");
        }

        // Lanes
        if self.lanes.is_empty() {
            eyre::bail!("at least one [[lane]] must be configured");
        }
        let far = self.far_sentinel_cm();
        for (i, lane) in self.lanes.iter().enumerate() {
            if lane.min_cm < 0 {
                eyre::bail!("lane[{i}].min_cm must be >= 0");
            }
            if lane.min_cm >= lane.max_cm {
                eyre::bail!("lane[{i}].min_cm must be < lane[{i}].max_cm");
            }
            if lane.max_cm >= far {
                eyre::bail!(
                    "lane[{i}].max_cm must be < {far} (the no-target distance for the {:?} algorithm)",
                    self.detector.algorithm
                );
            }
            if lane.vote_threshold_pct > 100 {
                eyre::bail!("lane[{i}].vote_threshold_pct must be <= 100");
            }
            if lane.residence_ms > 10 * 60 * 1000 {
                eyre::bail!("lane[{i}].residence_ms is unreasonably large (>10min)");
            }
        }
        // Overlapping zones double-count a single reflection. Shared
        // boundaries are fine: the in-zone test is strictly inside.
        for i in 0..self.lanes.len() {
            for j in (i + 1)..self.lanes.len() {
                let (a, b) = (&self.lanes[i], &self.lanes[j]);
                if a.min_cm < b.max_cm && b.min_cm < a.max_cm {
                    eyre::bail!("lane[{i}] and lane[{j}] zones overlap");
                }
            }
        }

        // Logging: free-form; unknown rotation strings fall back to "never"

        Ok(())
    }
}
