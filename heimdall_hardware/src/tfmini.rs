//! TFMini-S frame protocol: pure codec plus the UART driver.
//!
//! The sensor emits fixed 9-byte measurement frames:
//! `0x59 0x59 dist_lo dist_hi flux_lo flux_hi temp_lo temp_hi checksum`
//! where the checksum is the low byte of the sum of the first eight bytes.
//! Distance and flux are little-endian `u16`; distance is in centimeters.
use heimdall_traits::RangeReading;

use crate::error::{HwError, Result};

/// Length of one measurement frame in bytes.
pub const FRAME_LEN: usize = 9;
/// Both header bytes of a measurement frame.
pub const FRAME_HEADER: u8 = 0x59;
/// Returns with flux below this are too dim to trust.
pub const MIN_FLUX: u16 = 100;
/// Flux value reported when the receiver is saturated.
pub const FLUX_SATURATED: u16 = 0xFFFF;

/// Low byte of the sum of the first eight frame bytes.
#[inline]
pub fn frame_checksum(frame: &[u8; FRAME_LEN]) -> u8 {
    frame
        .iter()
        .take(FRAME_LEN - 1)
        .fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Decode one measurement frame.
///
/// Header or checksum mismatches are protocol errors; a frame whose flux is
/// out of the usable band decodes successfully as a weak reading (the carried
/// distance is garbage and must not be used).
pub fn decode_frame(frame: &[u8; FRAME_LEN]) -> Result<RangeReading> {
    if frame[0] != FRAME_HEADER || frame[1] != FRAME_HEADER {
        return Err(HwError::BadHeader(frame[0], frame[1]));
    }
    let expected = frame_checksum(frame);
    let actual = frame[FRAME_LEN - 1];
    if expected != actual {
        return Err(HwError::Checksum { expected, actual });
    }
    let distance = u16::from_le_bytes([frame[2], frame[3]]);
    let flux = u16::from_le_bytes([frame[4], frame[5]]);
    if flux < MIN_FLUX || flux == FLUX_SATURATED {
        return Ok(RangeReading::weak());
    }
    Ok(RangeReading::target(i32::from(distance)))
}

/// Build a well-formed measurement frame. Used by tests and the fuzz corpus.
pub fn encode_frame(distance_cm: u16, flux: u16, temp_raw: u16) -> [u8; FRAME_LEN] {
    let [d_lo, d_hi] = distance_cm.to_le_bytes();
    let [f_lo, f_hi] = flux.to_le_bytes();
    let [t_lo, t_hi] = temp_raw.to_le_bytes();
    let mut frame = [
        FRAME_HEADER,
        FRAME_HEADER,
        d_lo,
        d_hi,
        f_lo,
        f_hi,
        t_lo,
        t_hi,
        0,
    ];
    frame[FRAME_LEN - 1] = frame_checksum(&frame);
    frame
}

/// Command asking a triggered-mode sensor for one measurement.
pub fn trigger_command() -> [u8; 4] {
    [0x5A, 0x04, 0x04, 0x62]
}

/// Command setting the free-run frame rate. Rate 0 switches the sensor to
/// triggered mode.
pub fn frame_rate_command(rate_hz: u16) -> [u8; 6] {
    let [lo, hi] = rate_hz.to_le_bytes();
    let mut cmd = [0x5A, 0x06, 0x03, lo, hi, 0];
    cmd[5] = cmd
        .iter()
        .take(5)
        .fold(0u8, |acc, b| acc.wrapping_add(*b));
    cmd
}

#[cfg(feature = "hardware")]
pub use uart::TfMiniUart;

#[cfg(feature = "hardware")]
mod uart {
    use std::time::{Duration, Instant};

    use heimdall_traits::{RangeFinder, RangeReading};
    use rppal::uart::{Parity, Queue, Uart};
    use tracing::trace;

    use super::{FRAME_HEADER, FRAME_LEN, decode_frame, frame_rate_command, trigger_command};
    use crate::error::{HwError, Result};
    use crate::util::fill_until_deadline;

    const POLL_INTERVAL: Duration = Duration::from_micros(200);
    /// Give up resyncing after this many non-header bytes.
    const RESYNC_SCAN_MAX: usize = 64;

    pub struct TfMiniUart {
        uart: Uart,
        triggered: bool,
    }

    impl TfMiniUart {
        /// Open the sensor in triggered mode: each `read` sends a trigger
        /// command and blocks for the reply.
        pub fn triggered(port: &str, baud: u32) -> Result<Self> {
            let mut dev = Self::open(port, baud)?;
            dev.triggered = true;
            dev.send(&frame_rate_command(0))?;
            dev.settle()?;
            Ok(dev)
        }

        /// Open the sensor free-running at `rate_hz`: each `read` blocks
        /// until the next spontaneous frame.
        pub fn free_running(port: &str, baud: u32, rate_hz: u16) -> Result<Self> {
            let mut dev = Self::open(port, baud)?;
            dev.send(&frame_rate_command(rate_hz.max(1)))?;
            dev.settle()?;
            Ok(dev)
        }

        fn open(port: &str, baud: u32) -> Result<Self> {
            let mut uart = Uart::with_path(port, baud, Parity::None, 8, 1)
                .map_err(|e| HwError::Serial(e.to_string()))?;
            // Non-blocking reads; pacing is done by fill_until_deadline.
            uart.set_read_mode(0, Duration::ZERO)
                .map_err(|e| HwError::Serial(e.to_string()))?;
            Ok(Self {
                uart,
                triggered: false,
            })
        }

        fn send(&mut self, cmd: &[u8]) -> Result<()> {
            self.uart
                .write(cmd)
                .map_err(|e| HwError::Serial(e.to_string()))?;
            Ok(())
        }

        /// The sensor needs a moment to apply a mode change; drop whatever
        /// partial output it produced meanwhile.
        fn settle(&mut self) -> Result<()> {
            std::thread::sleep(Duration::from_millis(100));
            self.uart
                .flush(Queue::Input)
                .map_err(|e| HwError::Serial(e.to_string()))?;
            Ok(())
        }

        fn read_some(&mut self, buf: &mut [u8]) -> Result<usize> {
            self.uart
                .read(buf)
                .map_err(|e| HwError::Serial(e.to_string()))
        }

        /// Read and decode the next measurement frame, resyncing on the
        /// two-byte header if the stream is mid-frame.
        pub fn read_frame(&mut self, timeout: Duration) -> Result<RangeReading> {
            let deadline = Instant::now() + timeout;
            let mut prev = 0u8;
            let mut scanned = 0usize;
            loop {
                let mut b = [0u8; 1];
                fill_until_deadline(
                    |buf| self.read_some(buf),
                    &mut b,
                    deadline,
                    POLL_INTERVAL,
                )?;
                if prev == FRAME_HEADER && b[0] == FRAME_HEADER {
                    break;
                }
                scanned += 1;
                if scanned > RESYNC_SCAN_MAX {
                    return Err(HwError::BadHeader(prev, b[0]));
                }
                prev = b[0];
            }

            let mut frame = [0u8; FRAME_LEN];
            frame[0] = FRAME_HEADER;
            frame[1] = FRAME_HEADER;
            fill_until_deadline(
                |buf| self.read_some(buf),
                &mut frame[2..],
                deadline,
                POLL_INTERVAL,
            )?;
            let reading = decode_frame(&frame)?;
            trace!(
                distance_cm = reading.distance_cm,
                weak = reading.is_weak(),
                "tfmini frame"
            );
            Ok(reading)
        }
    }

    impl RangeFinder for TfMiniUart {
        fn read(
            &mut self,
            timeout: Duration,
        ) -> std::result::Result<RangeReading, Box<dyn std::error::Error + Send + Sync>> {
            if self.triggered {
                self.send(&trigger_command())?;
            }
            self.read_frame(timeout).map_err(Into::into)
        }
    }
}
