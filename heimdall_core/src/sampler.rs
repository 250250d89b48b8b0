//! Background sensor sampling utilities.
//!
//! Spawns a thread that owns the `RangeFinder`, pushes the latest reading
//! via a bounded channel, and tracks the last-ok timestamp for the stall
//! watchdog. Event-driven and paced variants are provided.
//!
//! Safety: each `Sampler` spawns exactly one thread that is shut down when
//! the `Sampler` is dropped, preventing thread leaks.
use crossbeam_channel as xch;
use heimdall_traits::clock::Clock;
use heimdall_traits::{RangeFinder, RangeReading};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub struct Sampler {
    rx: xch::Receiver<RangeReading>,
    last_ok: Arc<AtomicU64>,
    epoch: Instant,
    /// Shutdown flag for immediate response (atomic for lock-free check)
    shutdown: Arc<AtomicBool>,
    /// Join handle for graceful thread cleanup
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl Sampler {
    /// Rate-paced sampler: poll the sensor at `hz` regardless of its own
    /// frame timing.
    pub fn spawn<R: RangeFinder + Send + 'static, C: Clock + Send + Sync + 'static>(
        mut sensor: R,
        hz: u32,
        timeout: Duration,
        clock: C,
    ) -> Self {
        let (tx, rx) = xch::bounded(1);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let last_ok = Arc::new(AtomicU64::new(0));
        let last_ok_clone = last_ok.clone();
        let period = Duration::from_micros(crate::util::period_us(hz));
        let epoch = clock.now();

        let join_handle = std::thread::spawn(move || {
            loop {
                // Immediate shutdown check (lock-free atomic)
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("sampler thread received shutdown signal");
                    break;
                }

                match sensor.read(timeout) {
                    Ok(r) => {
                        match tx.try_send(r) {
                            Ok(()) => {}
                            // Mailbox still holds an undrained sample; the
                            // watchdog only needs last_ok, so never block here.
                            Err(xch::TrySendError::Full(_)) => {
                                tracing::trace!("sampler mailbox full; dropping sample");
                            }
                            Err(xch::TrySendError::Disconnected(_)) => {
                                tracing::debug!("sampler consumer disconnected, exiting thread");
                                break;
                            }
                        }
                        let now = clock.ms_since(epoch);
                        last_ok_clone.store(now, Ordering::Relaxed);
                    }
                    Err(e) => {
                        // Timeouts and corrupt frames alike: no sample this
                        // pass; the consumer has a stall watchdog.
                        tracing::debug!(error = %e, "sampler read failed");
                    }
                }

                // Check shutdown before sleep to avoid unnecessary delay
                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }
                clock.sleep(period);
            }
            tracing::trace!("sampler thread exiting cleanly");
        });

        Self {
            rx,
            last_ok,
            epoch,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// Event-driven sampler: rely on the sensor's own frame timing and do
    /// not add extra sleeps. `sensor.read(timeout)` should block until the
    /// next frame arrives or the timeout expires.
    pub fn spawn_event<R: RangeFinder + Send + 'static, C: Clock + Send + Sync + 'static>(
        mut sensor: R,
        timeout: Duration,
        clock: C,
    ) -> Self {
        let (tx, rx) = xch::bounded(1);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let last_ok = Arc::new(AtomicU64::new(0));
        let last_ok_clone = last_ok.clone();
        let epoch = clock.now();

        let join_handle = std::thread::spawn(move || {
            loop {
                // Immediate shutdown check (lock-free atomic)
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("sampler event thread received shutdown signal");
                    break;
                }

                match sensor.read(timeout) {
                    Ok(r) => {
                        match tx.try_send(r) {
                            Ok(()) => {}
                            Err(xch::TrySendError::Full(_)) => {
                                tracing::trace!("sampler mailbox full; dropping frame");
                            }
                            Err(xch::TrySendError::Disconnected(_)) => {
                                tracing::debug!("sampler event consumer disconnected, exiting thread");
                                break;
                            }
                        }
                        let now = clock.ms_since(epoch);
                        last_ok_clone.store(now, Ordering::Relaxed);
                    }
                    Err(e) => {
                        // On timeout or transient error, just continue; the
                        // consumer has a stall watchdog.
                        tracing::debug!(error = %e, "sampler event read failed");
                    }
                }
                // No sleep here: next iteration blocks in read() until the
                // next frame. Shutdown is checked right after read completes.
            }
            tracing::trace!("sampler event thread exiting cleanly");
        });

        Self {
            rx,
            last_ok,
            epoch,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    pub fn latest(&self) -> Option<RangeReading> {
        self.rx.try_iter().last()
    }
    pub fn stalled_for(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_ok.load(Ordering::Relaxed))
    }
    /// Convenience helper: compute stall using this sampler's epoch and a real monotonic clock.
    pub fn stalled_for_now(&self) -> u64 {
        let now_ms = {
            let dur = Instant::now().saturating_duration_since(self.epoch);
            let ms = dur.as_millis();
            (ms.min(u128::from(u64::MAX))) as u64
        };
        now_ms.saturating_sub(self.last_ok.load(Ordering::Relaxed))
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        // Signal shutdown immediately (atomic store is very fast)
        self.shutdown.store(true, Ordering::Relaxed);

        // The thread will exit:
        // 1. Immediately if it's between reads (checking shutdown flag)
        // 2. After the current sensor.read() completes (up to the sensor
        //    timeout, ~50ms worst case)
        // 3. Immediately after read if it was in sleep (shutdown check added
        //    before sleep)
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => {
                    tracing::trace!("sampler thread joined successfully");
                }
                Err(e) => {
                    // Thread panicked; log but don't propagate (we're in Drop)
                    tracing::warn!(?e, "sampler thread panicked during shutdown");
                }
            }
        }
    }
}
