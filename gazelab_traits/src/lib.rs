pub mod clock;

pub use clock::{Clock, MonotonicClock, TestClock};

use std::time::Duration;

/// Error type crossing collaborator boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A position on screen, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// One gaze estimate as delivered by the sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GazeSample {
    pub x: f64,
    pub y: f64,
    /// Milliseconds on the sensor's own timeline.
    pub timestamp_ms: u64,
}

impl GazeSample {
    pub const fn new(x: f64, y: f64, timestamp_ms: u64) -> Self {
        Self { x, y, timestamp_ms }
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Gaze estimator driven by a background sampler thread.
///
/// `next_sample` may block up to `timeout`; returning `Ok(None)` means the
/// model had no estimate for this tick (face lost, warming up).
pub trait GazeSource {
    fn begin(&mut self) -> Result<(), BoxError>;
    fn end(&mut self);
    fn pause(&mut self);
    fn resume(&mut self);
    fn next_sample(&mut self, timeout: Duration) -> Result<Option<GazeSample>, BoxError>;
    fn current_estimate(&mut self) -> Option<Point>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_euclidean() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance(&b) - 5.0).abs() < 1e-9);
        assert!((b.distance(&a) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn sample_point_drops_timestamp() {
        let s = GazeSample::new(12.5, -3.0, 99);
        assert_eq!(s.point(), Point::new(12.5, -3.0));
    }
}
