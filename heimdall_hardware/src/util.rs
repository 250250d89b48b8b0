use std::time::{Duration, Instant};

use crate::error::{HwError, Result};

/// Pump `read_some` into `buf` until the buffer is full or `deadline` passes.
/// Sleeps `poll_interval` between empty reads to avoid CPU spinning.
pub fn fill_until_deadline(
    mut read_some: impl FnMut(&mut [u8]) -> Result<usize>,
    buf: &mut [u8],
    deadline: Instant,
    poll_interval: Duration,
) -> Result<()> {
    let mut filled = 0usize;
    while filled < buf.len() {
        let n = read_some(&mut buf[filled..])?;
        filled += n;
        if filled >= buf.len() {
            break;
        }
        if n == 0 {
            if Instant::now() >= deadline {
                return Err(HwError::Timeout);
            }
            std::thread::sleep(poll_interval);
        }
    }
    Ok(())
}
