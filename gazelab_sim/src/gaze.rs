//! Simulated gaze sources.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use gazelab_config::TraceRow;
use gazelab_core::SensorControl;
use gazelab_traits::{BoxError, Clock, GazeSample, GazeSource, Point};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::error::SimError;
use crate::eye::SimulatedEye;

/// Samples a `SimulatedEye` at a fixed rate, sleeping on `clock` between reads.
pub struct SimulatedGaze<C> {
    eye: SimulatedEye,
    clock: C,
    epoch: Instant,
    period: Duration,
    rng: StdRng,
    started: bool,
    paused: bool,
}

impl<C: Clock> SimulatedGaze<C> {
    pub fn new(eye: SimulatedEye, rate_hz: u32, clock: C, seed: u64) -> Self {
        let epoch = clock.now();
        Self {
            eye,
            clock,
            epoch,
            period: Duration::from_millis(gazelab_core::util::period_ms(rate_hz)),
            rng: StdRng::seed_from_u64(seed),
            started: false,
            paused: false,
        }
    }
}

impl<C: Clock> GazeSource for SimulatedGaze<C> {
    fn begin(&mut self) -> Result<(), BoxError> {
        self.started = true;
        self.paused = false;
        tracing::debug!(period_ms = self.period.as_millis() as u64, "simulated gaze started");
        Ok(())
    }

    fn end(&mut self) {
        self.started = false;
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn resume(&mut self) {
        self.paused = false;
    }

    fn next_sample(&mut self, timeout: Duration) -> Result<Option<GazeSample>, BoxError> {
        if !self.started {
            return Err(SimError::NotStarted.into());
        }
        if self.paused {
            self.clock.sleep(timeout.min(self.period));
            return Ok(None);
        }
        self.clock.sleep(self.period);
        let p = self.eye.observe(&mut self.rng);
        Ok(Some(GazeSample::new(p.x, p.y, self.clock.ms_since(self.epoch))))
    }

    fn current_estimate(&mut self) -> Option<Point> {
        if !self.started {
            return None;
        }
        Some(self.eye.observe(&mut self.rng))
    }
}

/// Replays a recorded trace, pacing by the gaps between row timestamps.
/// Once exhausted it reports no samples.
pub struct TraceGaze<C> {
    rows: Vec<TraceRow>,
    next: usize,
    clock: C,
    last: Option<Point>,
    started: bool,
    paused: bool,
}

impl<C: Clock> TraceGaze<C> {
    pub fn new(rows: Vec<TraceRow>, clock: C) -> Self {
        Self {
            rows,
            next: 0,
            clock,
            last: None,
            started: false,
            paused: false,
        }
    }

    pub fn remaining(&self) -> usize {
        self.rows.len().saturating_sub(self.next)
    }
}

impl<C: Clock> GazeSource for TraceGaze<C> {
    fn begin(&mut self) -> Result<(), BoxError> {
        self.started = true;
        self.paused = false;
        tracing::debug!(rows = self.rows.len(), "gaze trace replay started");
        Ok(())
    }

    fn end(&mut self) {
        self.started = false;
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn resume(&mut self) {
        self.paused = false;
    }

    fn next_sample(&mut self, timeout: Duration) -> Result<Option<GazeSample>, BoxError> {
        if !self.started {
            return Err(SimError::NotStarted.into());
        }
        let Some(row) = self.rows.get(self.next).copied() else {
            self.clock.sleep(timeout);
            return Ok(None);
        };
        if self.paused {
            self.clock.sleep(timeout);
            return Ok(None);
        }
        if let Some(prev) = self.next.checked_sub(1).and_then(|i| self.rows.get(i)) {
            let gap = row.timestamp_ms.saturating_sub(prev.timestamp_ms);
            self.clock.sleep(Duration::from_millis(gap));
        }
        self.next += 1;
        self.last = Some(Point::new(row.x, row.y));
        Ok(Some(GazeSample::new(row.x, row.y, row.timestamp_ms)))
    }

    fn current_estimate(&mut self) -> Option<Point> {
        if self.started { self.last } else { None }
    }
}

/// A gaze source driven from the caller's thread. The sensor handle and an
/// instant-paced stimulus player share it: the player pulls the samples that
/// would have arrived during playback.
#[derive(Clone)]
pub struct InlineGaze {
    inner: Arc<Mutex<Box<dyn GazeSource + Send>>>,
}

impl InlineGaze {
    pub fn new(source: impl GazeSource + Send + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(source))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn GazeSource + Send>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Up to `n` samples; reads that fail or come back empty are skipped.
    pub fn pull(&self, n: usize) -> Vec<GazeSample> {
        let mut src = self.lock();
        (0..n)
            .filter_map(|_| src.next_sample(Duration::ZERO).ok().flatten())
            .collect()
    }
}

impl SensorControl for InlineGaze {
    fn begin(&mut self) -> Result<(), BoxError> {
        self.lock().begin()
    }

    fn pause(&mut self) {
        self.lock().pause();
    }

    fn resume(&mut self) {
        self.lock().resume();
    }

    fn end(&mut self) {
        self.lock().end();
    }

    fn current_estimate(&mut self) -> Option<Point> {
        self.lock().current_estimate()
    }
}
