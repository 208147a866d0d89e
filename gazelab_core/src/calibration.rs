//! Calibration passes: target grid, accuracy score and adaptive fixation tolerance.
//!
//! A pass visits every grid target once and reads the sensor's estimate at the
//! end of each hold. Only the last `last_k` samples enter the error, the same
//! window the score and the tolerance are derived from.

use gazelab_traits::Point;
use rand::Rng;
use rand::seq::SliceRandom;

use crate::config::CalibrationCfg;
use crate::error::Result;

/// A target and where the sensor thought the participant was looking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationSample {
    pub target: Point,
    pub observed: Point,
}

impl CalibrationSample {
    pub fn error_px(&self) -> f64 {
        self.target.distance(&self.observed)
    }
}

/// Outcome of one pass. Only `tolerance_px` outlives the calibration step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationResult {
    /// Mean error over the scored window; `None` when no estimate arrived.
    pub error_px: Option<f64>,
    /// 0..=100; `None` when no estimate arrived.
    pub score: Option<u8>,
    pub tolerance_px: f64,
    pub samples_used: usize,
}

impl CalibrationResult {
    /// A pass without samples is accepted (the sensor fails open).
    pub fn accepted(&self, min_score: u8) -> bool {
        self.score.is_none_or(|s| s >= min_score)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationDecision {
    Accept,
    /// Rejected with passes left: recalibrate.
    Retry,
    /// Rejected on the last allowed pass: keep the tolerance anyway.
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct CalibrationController {
    cfg: CalibrationCfg,
}

impl CalibrationController {
    pub fn new(cfg: CalibrationCfg) -> Self {
        Self { cfg }
    }

    pub fn cfg(&self) -> &CalibrationCfg {
        &self.cfg
    }

    /// Grid targets inside the padded area, row-major unless order is randomized.
    pub fn targets<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<Point> {
        let c = &self.cfg;
        let axis = |n: u32, extent: f64| -> Vec<f64> {
            let span = (extent - 2.0 * c.padding_px).max(0.0);
            match n {
                0 => Vec::new(),
                1 => vec![extent / 2.0],
                n => (0..n)
                    .map(|i| c.padding_px + span * f64::from(i) / f64::from(n - 1))
                    .collect(),
            }
        };
        let xs = axis(c.grid_cols, c.area_width_px);
        let ys = axis(c.grid_rows, c.area_height_px);
        let mut points: Vec<Point> = ys
            .iter()
            .flat_map(|&y| xs.iter().map(move |&x| Point::new(x, y)))
            .collect();
        if c.randomize_order {
            points.shuffle(rng);
        }
        points
    }

    /// Mean Euclidean error of the last `last_k` samples.
    pub fn mean_error(&self, samples: &[CalibrationSample]) -> Option<f64> {
        let k = self.cfg.last_k.max(1);
        let window = &samples[samples.len().saturating_sub(k)..];
        if window.is_empty() {
            return None;
        }
        let sum: f64 = window.iter().map(CalibrationSample::error_px).sum();
        Some(sum / window.len() as f64)
    }

    /// `round(100 * (1 - error / max))`, clamped to 0..=100.
    pub fn score_for(&self, error_px: f64) -> u8 {
        if error_px.is_nan() {
            return 0;
        }
        let ratio = (1.0 - error_px / self.cfg.max_threshold_px).clamp(0.0, 1.0);
        // ratio is within [0, 1]
        (ratio * 100.0).round() as u8
    }

    /// `floor + (ceil - floor) * min(1, (error + offset) / ceil) ^ gamma`.
    ///
    /// Always within `[floor, ceil]` and non-decreasing in `error_px`; a
    /// non-finite error yields the ceiling.
    pub fn tolerance_for(&self, error_px: f64) -> f64 {
        let floor = self.cfg.floor_px;
        let ceil = self.cfg.max_threshold_px;
        if !error_px.is_finite() {
            return ceil;
        }
        let ratio = ((error_px + self.cfg.offset_px) / ceil).clamp(0.0, 1.0);
        (floor + (ceil - floor) * ratio.powf(self.cfg.gamma)).clamp(floor, ceil)
    }

    pub fn evaluate(&self, samples: &[CalibrationSample]) -> CalibrationResult {
        let used = samples.len().min(self.cfg.last_k.max(1));
        match self.mean_error(samples) {
            Some(err) => CalibrationResult {
                error_px: Some(err),
                score: Some(self.score_for(err)),
                tolerance_px: self.tolerance_for(err),
                samples_used: used,
            },
            None => CalibrationResult {
                error_px: None,
                score: None,
                tolerance_px: self.cfg.max_threshold_px,
                samples_used: 0,
            },
        }
    }

    /// Visit each target in turn. `probe` presents the target, holds, and
    /// returns the sensor's estimate (or `None` when it has none).
    pub fn run_pass<F>(&self, targets: &[Point], mut probe: F) -> Result<CalibrationResult>
    where
        F: FnMut(usize, Point) -> Result<Option<Point>>,
    {
        let mut samples = Vec::with_capacity(targets.len());
        for (i, &target) in targets.iter().enumerate() {
            if let Some(observed) = probe(i, target)? {
                tracing::trace!(
                    index = i,
                    error_px = target.distance(&observed),
                    "calibration sample"
                );
                samples.push(CalibrationSample { target, observed });
            }
        }
        Ok(self.evaluate(&samples))
    }

    /// Retry policy after `passes_done` passes in the current round.
    pub fn decide(&self, result: &CalibrationResult, passes_done: u32) -> CalibrationDecision {
        if result.accepted(self.cfg.min_score) {
            CalibrationDecision::Accept
        } else if passes_done >= self.cfg.max_passes {
            CalibrationDecision::Exhausted
        } else {
            CalibrationDecision::Retry
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn ctl() -> CalibrationController {
        CalibrationController::new(CalibrationCfg {
            randomize_order: false,
            ..CalibrationCfg::default()
        })
    }

    #[test]
    fn grid_is_padded_three_by_three() {
        let t = ctl().targets(&mut StdRng::seed_from_u64(0));
        assert_eq!(t.len(), 9);
        assert_eq!(t[0], Point::new(50.0, 50.0));
        assert_eq!(t[4], Point::new(640.0, 360.0));
        assert_eq!(t[8], Point::new(1230.0, 670.0));
    }

    #[test]
    fn randomized_grid_is_a_permutation() {
        let c = CalibrationController::new(CalibrationCfg::default());
        let mut shuffled = c.targets(&mut StdRng::seed_from_u64(7));
        let mut ordered = ctl().targets(&mut StdRng::seed_from_u64(7));
        let key = |p: &Point| (p.x as i64, p.y as i64);
        shuffled.sort_by_key(key);
        ordered.sort_by_key(key);
        assert_eq!(shuffled, ordered);
    }

    #[test]
    fn score_matches_reference_points() {
        let c = ctl();
        assert_eq!(c.score_for(0.0), 100);
        assert_eq!(c.score_for(50.0), 75);
        assert_eq!(c.score_for(200.0), 0);
        assert_eq!(c.score_for(500.0), 0);
        assert_eq!(c.score_for(f64::NAN), 0);
    }

    #[test]
    fn tolerance_hits_floor_and_ceiling() {
        let c = ctl();
        // offset keeps the tolerance above the floor even at zero error
        let at_zero = c.tolerance_for(0.0);
        assert!(at_zero > 40.0 && at_zero < 60.0, "{at_zero}");
        assert_eq!(c.tolerance_for(190.0), 200.0);
        assert_eq!(c.tolerance_for(1e9), 200.0);
        assert_eq!(c.tolerance_for(-1e9), 40.0);
        assert_eq!(c.tolerance_for(f64::NAN), 200.0);
    }

    #[test]
    fn mean_error_uses_only_last_k() {
        let c = ctl();
        let s = |e: f64| CalibrationSample {
            target: Point::new(0.0, 0.0),
            observed: Point::new(e, 0.0),
        };
        let samples = [s(1000.0), s(10.0), s(20.0), s(30.0)];
        assert_eq!(c.mean_error(&samples), Some(20.0));
        assert_eq!(c.mean_error(&[]), None);
    }

    #[test]
    fn empty_pass_fails_open() {
        let c = ctl();
        let r = c
            .run_pass(&c.targets(&mut StdRng::seed_from_u64(1)), |_, _| Ok(None))
            .expect("pass");
        assert_eq!(r.score, None);
        assert_eq!(r.tolerance_px, 200.0);
        assert!(r.accepted(100));
        assert_eq!(c.decide(&r, 1), CalibrationDecision::Accept);
    }

    #[test]
    fn decide_retries_until_exhausted() {
        let c = ctl();
        let poor = c.evaluate(&[CalibrationSample {
            target: Point::new(0.0, 0.0),
            observed: Point::new(150.0, 0.0),
        }]);
        assert_eq!(poor.score, Some(25));
        assert_eq!(c.decide(&poor, 1), CalibrationDecision::Retry);
        assert_eq!(c.decide(&poor, 2), CalibrationDecision::Retry);
        assert_eq!(c.decide(&poor, 3), CalibrationDecision::Exhausted);
    }

    #[test]
    fn probe_errors_abort_the_pass() {
        let c = ctl();
        let err = c
            .run_pass(&[Point::new(1.0, 1.0)], |_, _| Err(eyre::eyre!("boom")))
            .expect_err("probe failure");
        assert_eq!(err.to_string(), "boom");
    }
}
