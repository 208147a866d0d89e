//! Interfaces of the external collaborators the sequencer drives.

use std::path::PathBuf;

use gazelab_traits::{BoxError, Point};

use crate::calibration::CalibrationResult;
use crate::condition::Condition;
use crate::error::RenderError;
use crate::events::Completion;
use crate::recorder::RunExport;
use crate::step::Step;

/// What the renderer needs to materialize a step.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub step: Step,
    /// Condition of the group being run, if any.
    pub condition: Option<Condition>,
    /// 1-based calibration pass within the current round.
    pub pass: u32,
    pub fixation_required: bool,
    pub tolerance_px: f64,
    pub trials_recorded: usize,
}

/// In-step changes to an already rendered view.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewUpdate {
    CalibrationTarget {
        index: usize,
        total: usize,
        point: Point,
    },
    CalibrationScored(CalibrationResult),
    JitterIntroHidden,
    FixationCross {
        visible: bool,
        anchor: Point,
        radius_px: f64,
    },
}

pub trait StepRenderer {
    /// Returns once the step's view exists.
    fn render(&mut self, view: &View) -> Result<(), RenderError>;

    fn update(&mut self, _update: &ViewUpdate) -> Result<(), RenderError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StimulusRequest {
    pub kind: Step,
    pub condition: Condition,
    pub display_ms: u64,
}

/// Plays clips or collision scenes. Must call `done.complete()` exactly once
/// when playback ends, from any thread, unless stopped.
pub trait StimulusPlayer {
    fn play(&mut self, request: &StimulusRequest, done: Completion) -> Result<(), BoxError>;
    fn stop(&mut self);
}

pub trait Persistence {
    fn persist(&mut self, export: &RunExport, filename: &str) -> Result<PathBuf, BoxError>;
}

/// Lifecycle and point queries on the gaze sensor. Samples themselves arrive
/// on the event bus.
pub trait SensorControl {
    fn begin(&mut self) -> Result<(), BoxError>;
    fn pause(&mut self);
    fn resume(&mut self);
    fn end(&mut self);
    /// Latest estimate, or `None` when the model has none.
    fn current_estimate(&mut self) -> Option<Point>;
}
