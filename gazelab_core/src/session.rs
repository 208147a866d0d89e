//! Per-run context: everything that used to be module-level state.

use std::collections::VecDeque;

use gazelab_traits::GazeSample;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::calibration::CalibrationResult;
use crate::condition::Condition;
use crate::config::RunCfg;
use crate::fixation::FixationMonitor;
use crate::recorder::{Responses, TrialRecorder};

#[derive(Debug)]
pub struct Session {
    participant_id: String,
    conditions: VecDeque<Condition>,
    fixation_required: bool,
    tolerance_px: f64,
    passes_in_round: u32,
    total_passes: u32,
    last_calibration: Option<CalibrationResult>,
    monitor: FixationMonitor,
    recorder: TrialRecorder,
    pending_samples: Vec<GazeSample>,
    rng: StdRng,
}

impl Session {
    pub fn new(cfg: &RunCfg) -> Self {
        let rng = match cfg.experiment.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        // Until calibration says otherwise, be as lenient as allowed.
        let tolerance_px = cfg.calibration.max_threshold_px;
        Self {
            participant_id: cfg.experiment.participant_id.clone(),
            conditions: cfg.experiment.conditions.iter().cloned().collect(),
            fixation_required: cfg.experiment.fixation_required,
            tolerance_px,
            passes_in_round: 0,
            total_passes: 0,
            last_calibration: None,
            monitor: FixationMonitor::new(&cfg.fixation, tolerance_px),
            recorder: TrialRecorder::new(),
            pending_samples: Vec::new(),
            rng,
        }
    }

    pub fn participant_id(&self) -> &str {
        &self.participant_id
    }

    pub fn fixation_required(&self) -> bool {
        self.fixation_required
    }

    pub fn tolerance_px(&self) -> f64 {
        self.tolerance_px
    }

    pub fn passes_in_round(&self) -> u32 {
        self.passes_in_round
    }

    pub fn total_passes(&self) -> u32 {
        self.total_passes
    }

    pub fn last_calibration(&self) -> Option<&CalibrationResult> {
        self.last_calibration.as_ref()
    }

    /// Conditions not yet consumed, front first.
    pub fn remaining_conditions(&self) -> impl Iterator<Item = &Condition> {
        self.conditions.iter()
    }

    pub fn current_condition(&self) -> Option<&Condition> {
        self.conditions.front()
    }

    pub fn monitor(&self) -> &FixationMonitor {
        &self.monitor
    }

    pub fn recorder(&self) -> &TrialRecorder {
        &self.recorder
    }

    pub(crate) fn monitor_mut(&mut self) -> &mut FixationMonitor {
        &mut self.monitor
    }

    pub(crate) fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub(crate) fn configure(&mut self, fixation_required: bool, conditions: Vec<Condition>) {
        self.fixation_required = fixation_required;
        self.conditions = conditions.into();
    }

    /// Store a pass result; returns passes so far in this round.
    pub(crate) fn record_pass(&mut self, result: CalibrationResult) -> u32 {
        self.passes_in_round += 1;
        self.total_passes += 1;
        self.tolerance_px = result.tolerance_px;
        self.monitor.set_tolerance(result.tolerance_px);
        self.last_calibration = Some(result);
        self.passes_in_round
    }

    pub(crate) fn finish_calibration_round(&mut self) {
        self.passes_in_round = 0;
    }

    pub(crate) fn set_pending_samples(&mut self, samples: Vec<GazeSample>) {
        self.pending_samples = samples;
    }

    /// Record the trial for the front condition and consume it.
    pub(crate) fn complete_trial(&mut self, responses: Responses) -> Option<Condition> {
        let condition = self.conditions.pop_front()?;
        let samples = std::mem::take(&mut self.pending_samples);
        self.recorder.record_trial(condition.clone(), responses, &samples);
        Some(condition)
    }
}
