//! Rangefinder backends: the TFMini-S UART driver (behind the `hardware`
//! feature) and a scripted simulator for bench runs and tests.
pub mod error;
pub mod tfmini;
pub mod util;

use std::time::Duration;

use heimdall_traits::{RangeFinder, RangeReading};
use tracing::trace;

pub use error::HwError;
#[cfg(feature = "hardware")]
pub use tfmini::TfMiniUart;

/// Simulated rangefinder: plays back a scripted scene, then holds a steady
/// background distance once the script runs out.
pub struct SimulatedRangeFinder {
    script: Vec<RangeReading>,
    idx: usize,
    background: RangeReading,
}

impl SimulatedRangeFinder {
    /// An empty scene: nothing but the background return.
    pub fn steady(background_cm: i32) -> Self {
        Self::from_script(Vec::new(), background_cm)
    }

    pub fn from_script(script: Vec<RangeReading>, background_cm: i32) -> Self {
        Self {
            script,
            idx: 0,
            background: RangeReading::target(background_cm),
        }
    }

    /// A scene of `passes` targets crossing the beam at `target_cm`, each
    /// visible for `frames_on` samples with `frames_off` background samples
    /// between them.
    pub fn passing_targets(
        background_cm: i32,
        target_cm: i32,
        frames_on: usize,
        frames_off: usize,
        passes: usize,
    ) -> Self {
        let mut script = Vec::with_capacity(passes * (frames_on + frames_off));
        for _ in 0..passes {
            script.extend(std::iter::repeat_n(RangeReading::target(target_cm), frames_on));
            script.extend(std::iter::repeat_n(
                RangeReading::target(background_cm),
                frames_off,
            ));
        }
        Self::from_script(script, background_cm)
    }
}

impl RangeFinder for SimulatedRangeFinder {
    fn read(
        &mut self,
        _timeout: Duration,
    ) -> Result<RangeReading, Box<dyn std::error::Error + Send + Sync>> {
        let r = if self.idx < self.script.len() {
            let r = self.script[self.idx];
            self.idx += 1;
            r
        } else {
            self.background
        };
        trace!(distance_cm = r.distance_cm, weak = r.is_weak(), "simulated range sample");
        Ok(r)
    }
}
