//! Sample-rate and delay arithmetic.

pub const MILLIS_PER_SEC: u64 = 1_000;

/// Spacing between kept gaze samples at `hz`, never below 1 ms.
/// A rate of 0 is treated as 1 Hz.
#[inline]
pub fn period_ms(hz: u32) -> u64 {
    let hz = u64::from(hz).max(1);
    (MILLIS_PER_SEC / hz).max(1)
}

/// Whole seconds to milliseconds, saturating.
#[inline]
pub fn secs_to_ms(secs: u64) -> u64 {
    secs.saturating_mul(MILLIS_PER_SEC)
}
