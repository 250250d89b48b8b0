//! Test and helper mocks for heimdall_core.

/// A rangefinder that always errors on read; useful when driving the
/// detector with externally sampled readings via `step_from_raw`.
pub struct NoopRangeFinder;

impl heimdall_traits::RangeFinder for NoopRangeFinder {
    fn read(
        &mut self,
        _timeout: std::time::Duration,
    ) -> Result<heimdall_traits::RangeReading, Box<dyn std::error::Error + Send + Sync>> {
        Err(Box::new(std::io::Error::other("noop rangefinder")))
    }
}
