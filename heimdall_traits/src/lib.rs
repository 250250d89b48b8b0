pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Signal quality reported with a range measurement.
///
/// `Weak` means the return flux was below the sensor's usable minimum; the
/// carried distance must not be trusted and is treated downstream as "no
/// target in range".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalQuality {
    Ready,
    Weak,
}

/// One distance measurement from a rangefinder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeReading {
    /// Measured distance in centimeters. Only meaningful when `quality`
    /// is [`SignalQuality::Ready`].
    pub distance_cm: i32,
    pub quality: SignalQuality,
}

impl RangeReading {
    /// A trusted measurement of a target at `distance_cm`.
    #[inline]
    pub fn target(distance_cm: i32) -> Self {
        Self {
            distance_cm,
            quality: SignalQuality::Ready,
        }
    }

    /// A low-confidence return: no usable target.
    #[inline]
    pub fn weak() -> Self {
        Self {
            distance_cm: 0,
            quality: SignalQuality::Weak,
        }
    }

    #[inline]
    pub fn is_weak(&self) -> bool {
        self.quality == SignalQuality::Weak
    }
}

/// A time-of-flight distance sensor.
///
/// `read` acquires exactly one measurement, blocking at most `timeout`.
/// Protocol-level failures (bad frame, checksum mismatch, serial errors)
/// surface as `Err`; a present-but-weak return is `Ok` with
/// [`SignalQuality::Weak`].
pub trait RangeFinder {
    fn read(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<RangeReading, Box<dyn std::error::Error + Send + Sync>>;
}

impl RangeFinder for Box<dyn RangeFinder> {
    fn read(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<RangeReading, Box<dyn std::error::Error + Send + Sync>> {
        (**self).read(timeout)
    }
}
