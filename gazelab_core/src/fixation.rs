//! Gaze-contingent fixation monitoring.
//!
//! `Idle → Armed` when a stimulus starts with fixation required,
//! `Armed → Violating` after `required_run_length` consecutive accepted samples
//! outside the tolerance, back to `Idle` when the stimulus ends. The break is
//! reported once, on the transition.
//!
//! The monitor also owns the per-trial gaze buffer: recording begins in the
//! jitter step and survives until the response step collects it, unless a
//! break discards it first.

use gazelab_traits::{GazeSample, Point};

use crate::condition::Condition;
use crate::config::FixationCfg;
use crate::util::period_ms;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorPhase {
    Idle,
    Armed,
    Violating,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixationState {
    pub active: bool,
    pub consecutive_violations: u32,
    pub tolerance_px: f64,
}

/// Cancellation signal handed to the active stimulus handler.
#[derive(Debug, Clone, PartialEq)]
pub struct FixationBreak {
    pub timestamp_ms: u64,
    pub trial: Condition,
}

#[derive(Debug)]
struct Recording {
    condition: Condition,
    samples: Vec<GazeSample>,
}

#[derive(Debug)]
pub struct FixationMonitor {
    phase: MonitorPhase,
    anchor: Point,
    required_run: u32,
    min_interval_ms: u64,
    tolerance_px: f64,
    consecutive: u32,
    last_accepted_ms: Option<u64>,
    trial: Option<Condition>,
    recording: Option<Recording>,
    breaks: u64,
}

impl FixationMonitor {
    pub fn new(cfg: &FixationCfg, tolerance_px: f64) -> Self {
        Self {
            phase: MonitorPhase::Idle,
            anchor: cfg.anchor,
            required_run: cfg.required_run_length.max(1),
            min_interval_ms: period_ms(cfg.sample_rate_hz),
            tolerance_px,
            consecutive: 0,
            last_accepted_ms: None,
            trial: None,
            recording: None,
            breaks: 0,
        }
    }

    pub fn phase(&self) -> MonitorPhase {
        self.phase
    }

    pub fn state(&self) -> FixationState {
        FixationState {
            active: self.phase == MonitorPhase::Armed,
            consecutive_violations: self.consecutive,
            tolerance_px: self.tolerance_px,
        }
    }

    pub fn anchor(&self) -> Point {
        self.anchor
    }

    pub fn tolerance_px(&self) -> f64 {
        self.tolerance_px
    }

    pub fn set_tolerance(&mut self, tolerance_px: f64) {
        self.tolerance_px = tolerance_px;
    }

    /// Breaks reported since construction.
    pub fn breaks(&self) -> u64 {
        self.breaks
    }

    /// A stimulus starts. Arms only when fixation is required.
    pub fn begin_stimulus(&mut self, required: bool, trial: Condition) {
        self.consecutive = 0;
        self.trial = Some(trial);
        self.phase = if required {
            MonitorPhase::Armed
        } else {
            MonitorPhase::Idle
        };
    }

    pub fn end_stimulus(&mut self) {
        self.phase = MonitorPhase::Idle;
        self.consecutive = 0;
        self.trial = None;
    }

    /// Start buffering accepted samples for `condition`, dropping any
    /// unfinished buffer.
    pub fn start_recording(&mut self, condition: Condition) {
        if let Some(old) = self.recording.take() {
            tracing::debug!(
                condition = %old.condition,
                discarded = old.samples.len(),
                "recording restarted"
            );
        }
        self.recording = Some(Recording {
            condition,
            samples: Vec::new(),
        });
    }

    pub fn stop_recording(&mut self) -> Vec<GazeSample> {
        self.recording
            .take()
            .map(|r| r.samples)
            .unwrap_or_default()
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    pub fn recorded(&self) -> usize {
        self.recording.as_ref().map_or(0, |r| r.samples.len())
    }

    /// Feed one sensor sample. Returns the break on the sample that completes
    /// the violation run, `None` otherwise.
    pub fn on_sample(&mut self, s: GazeSample) -> Option<FixationBreak> {
        if self.phase != MonitorPhase::Armed && self.recording.is_none() {
            return None;
        }
        // Downsample; a timestamp going backwards restarts the spacing.
        if let Some(last) = self.last_accepted_ms
            && s.timestamp_ms >= last
            && s.timestamp_ms - last < self.min_interval_ms
        {
            return None;
        }
        self.last_accepted_ms = Some(s.timestamp_ms);

        if let Some(rec) = self.recording.as_mut() {
            rec.samples.push(s);
        }
        if self.phase != MonitorPhase::Armed {
            return None;
        }

        if s.point().distance(&self.anchor) <= self.tolerance_px {
            self.consecutive = 0;
            return None;
        }
        self.consecutive += 1;
        tracing::trace!(
            run = self.consecutive,
            required = self.required_run,
            "sample outside tolerance"
        );
        if self.consecutive < self.required_run {
            return None;
        }

        self.phase = MonitorPhase::Violating;
        self.breaks += 1;
        if let Some(rec) = self.recording.take() {
            tracing::debug!(
                condition = %rec.condition,
                discarded = rec.samples.len(),
                "fixation broken; trial buffer cleared"
            );
        }
        self.trial.clone().map(|trial| FixationBreak {
            timestamp_ms: s.timestamp_ms,
            trial,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(run: u32) -> FixationMonitor {
        FixationMonitor::new(
            &FixationCfg {
                anchor: Point::new(0.0, 0.0),
                required_run_length: run,
                sample_rate_hz: 30,
            },
            50.0,
        )
    }

    fn off(t: u64) -> GazeSample {
        GazeSample::new(500.0, 0.0, t)
    }

    fn on(t: u64) -> GazeSample {
        GazeSample::new(10.0, 10.0, t)
    }

    #[test]
    fn idle_without_recording_discards_everything() {
        let mut m = monitor(1);
        assert_eq!(m.on_sample(off(0)), None);
        assert_eq!(m.phase(), MonitorPhase::Idle);
        assert_eq!(m.stop_recording(), Vec::new());
    }

    #[test]
    fn breaks_once_on_the_rth_sample() {
        let mut m = monitor(3);
        m.begin_stimulus(true, Condition::from("B"));
        assert_eq!(m.on_sample(off(0)), None);
        assert_eq!(m.on_sample(off(40)), None);
        let b = m.on_sample(off(80)).expect("third sample breaks");
        assert_eq!(b.trial, Condition::from("B"));
        assert_eq!(b.timestamp_ms, 80);
        assert_eq!(m.phase(), MonitorPhase::Violating);
        assert_eq!(m.on_sample(off(120)), None);
        assert_eq!(m.breaks(), 1);
    }

    #[test]
    fn inside_sample_resets_the_run() {
        let mut m = monitor(3);
        m.begin_stimulus(true, Condition::from("A"));
        m.on_sample(off(0));
        m.on_sample(off(40));
        m.on_sample(on(80));
        assert_eq!(m.state().consecutive_violations, 0);
        m.on_sample(off(120));
        assert_eq!(m.on_sample(off(160)), None);
        assert!(m.on_sample(off(200)).is_some());
    }

    #[test]
    fn samples_closer_than_the_period_are_ignored() {
        let mut m = monitor(2);
        m.begin_stimulus(true, Condition::from("A"));
        m.on_sample(off(0));
        // 10 ms later at 30 Hz: dropped, does not count
        assert_eq!(m.on_sample(off(10)), None);
        assert_eq!(m.state().consecutive_violations, 1);
        assert!(m.on_sample(off(33)).is_some());
    }

    #[test]
    fn backwards_timestamp_is_accepted() {
        let mut m = monitor(2);
        m.start_recording(Condition::from("A"));
        m.on_sample(on(1000));
        m.on_sample(on(5));
        assert_eq!(m.recorded(), 2);
    }

    #[test]
    fn break_clears_the_buffer_and_end_returns_to_idle() {
        let mut m = monitor(1);
        m.start_recording(Condition::from("C"));
        m.on_sample(on(0));
        m.begin_stimulus(true, Condition::from("C"));
        assert!(m.on_sample(off(100)).is_some());
        assert!(!m.is_recording());
        m.end_stimulus();
        assert_eq!(m.phase(), MonitorPhase::Idle);
        assert_eq!(m.state().consecutive_violations, 0);
    }

    #[test]
    fn unarmed_stimulus_only_records() {
        let mut m = monitor(1);
        m.start_recording(Condition::from("A"));
        m.begin_stimulus(false, Condition::from("A"));
        assert_eq!(m.on_sample(off(0)), None);
        assert_eq!(m.on_sample(off(100)), None);
        assert_eq!(m.stop_recording().len(), 2);
    }
}
