//! Time sources for sensor pacing, sample timestamps and step timers.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

pub trait Clock {
    fn now(&self) -> Instant;
    /// Block for `d`, or pretend to.
    fn sleep(&self, d: Duration);

    /// Whole milliseconds from `epoch` to now; 0 if `epoch` is in the future.
    fn ms_since(&self, epoch: Instant) -> u64 {
        let elapsed = self.now().checked_duration_since(epoch).unwrap_or_default();
        u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Wall-clock time; `sleep` parks the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    pub const fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, d: Duration) {
        if !d.is_zero() {
            thread::sleep(d);
        }
    }
}

/// Simulated time that only moves when someone sleeps on it or advances it.
/// Clones share one timeline, so a gaze source and a timer thread built on
/// the same clock stay in step without waiting.
#[derive(Debug, Clone)]
pub struct TestClock {
    origin: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TestClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, d: Duration) {
        let mut off = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *off = off.saturating_add(d);
    }

    /// Jump to `d` after construction, forwards or backwards.
    pub fn set_offset(&self, d: Duration) {
        *self.offset.lock().unwrap_or_else(PoisonError::into_inner) = d;
    }

    /// Total simulated time elapsed since construction.
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for TestClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_sleep_advances_without_blocking() {
        let clock = TestClock::new();
        let epoch = clock.now();
        clock.sleep(Duration::from_secs(3));
        assert_eq!(clock.ms_since(epoch), 3_000);
    }

    #[test]
    fn clones_share_the_same_timeline() {
        let a = TestClock::new();
        let b = a.clone();
        a.advance(Duration::from_millis(40));
        assert_eq!(b.elapsed(), Duration::from_millis(40));
        b.set_offset(Duration::from_millis(5));
        assert_eq!(a.elapsed(), Duration::from_millis(5));
    }

    #[test]
    fn ms_since_saturates_for_future_epochs() {
        let clock = TestClock::new();
        let future = clock.now() + Duration::from_secs(1);
        assert_eq!(clock.ms_since(future), 0);
    }
}
