//! Builder for `StepSequencer`.
//!
//! Renderer, stimulus player and persistence are required; the sensor is
//! optional (fixation and calibration then fail open). Without an explicit
//! scheduler, timers run on threads sleeping on the real monotonic clock.

use gazelab_traits::MonotonicClock;

use crate::calibration::CalibrationController;
use crate::collab::{Persistence, SensorControl, StepRenderer, StimulusPlayer};
use crate::config::RunCfg;
use crate::error::{BuildError, Result};
use crate::events::EventBus;
use crate::sequencer::StepSequencer;
use crate::session::Session;
use crate::stack::ExecutionStack;
use crate::status::ActiveSteps;
use crate::timer::{Scheduler, ThreadScheduler};

#[derive(Default)]
pub struct SequencerBuilder {
    cfg: Option<RunCfg>,
    template: Option<ExecutionStack>,
    renderer: Option<Box<dyn StepRenderer>>,
    stimulus: Option<Box<dyn StimulusPlayer>>,
    persistence: Option<Box<dyn Persistence>>,
    sensor: Option<Box<dyn SensorControl>>,
    scheduler: Option<Box<dyn Scheduler>>,
    bus: Option<EventBus>,
}

impl SequencerBuilder {
    pub fn with_config(mut self, cfg: RunCfg) -> Self {
        self.cfg = Some(cfg);
        self
    }

    /// Replace the standard template.
    pub fn with_template(mut self, stack: ExecutionStack) -> Self {
        self.template = Some(stack);
        self
    }

    pub fn with_renderer(mut self, r: impl StepRenderer + 'static) -> Self {
        self.renderer = Some(Box::new(r));
        self
    }

    pub fn with_stimulus(mut self, p: impl StimulusPlayer + 'static) -> Self {
        self.stimulus = Some(Box::new(p));
        self
    }

    pub fn with_persistence(mut self, p: impl Persistence + 'static) -> Self {
        self.persistence = Some(Box::new(p));
        self
    }

    pub fn with_sensor(mut self, s: impl SensorControl + 'static) -> Self {
        self.sensor = Some(Box::new(s));
        self
    }

    pub fn with_scheduler(mut self, s: impl Scheduler + 'static) -> Self {
        self.scheduler = Some(Box::new(s));
        self
    }

    /// Use a bus created up front, so collaborators can hold its sender.
    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn try_build(self) -> Result<StepSequencer> {
        let renderer = self.renderer.ok_or(BuildError::MissingRenderer)?;
        let stimulus = self.stimulus.ok_or(BuildError::MissingStimulus)?;
        let persistence = self.persistence.ok_or(BuildError::MissingPersistence)?;
        let cfg = self.cfg.unwrap_or_default();
        validate(&cfg)?;

        let bus = self.bus.unwrap_or_default();
        let scheduler = match self.scheduler {
            Some(s) => s,
            None => Box::new(ThreadScheduler::new(bus.sender(), MonotonicClock::new())),
        };
        let session = Session::new(&cfg);
        Ok(StepSequencer {
            calibration: CalibrationController::new(cfg.calibration.clone()),
            stack: self.template.unwrap_or_else(ExecutionStack::standard),
            session,
            renderer,
            stimulus,
            persistence,
            sensor: self.sensor,
            sensor_started: false,
            scheduler,
            bus,
            generation: 0,
            current: None,
            active: ActiveSteps::default(),
            visited: Vec::new(),
            exported: None,
            cfg,
        })
    }
}

fn validate(cfg: &RunCfg) -> std::result::Result<(), BuildError> {
    if !cfg.experiment.stimulus.is_stimulus() {
        return Err(BuildError::InvalidConfig("stimulus step must be clips or collisions"));
    }
    if cfg.fixation.required_run_length == 0 {
        return Err(BuildError::InvalidConfig("required_run_length must be > 0"));
    }
    if cfg.calibration.max_passes == 0 {
        return Err(BuildError::InvalidConfig("max_passes must be > 0"));
    }
    let c = &cfg.calibration;
    if !(c.floor_px.is_finite() && c.max_threshold_px.is_finite()) {
        return Err(BuildError::InvalidConfig("floor_px and max_threshold_px must be finite"));
    }
    if !(c.offset_px.is_finite() && c.gamma.is_finite()) {
        return Err(BuildError::InvalidConfig("offset_px and gamma must be finite"));
    }
    if c.floor_px > c.max_threshold_px {
        return Err(BuildError::InvalidConfig("floor_px must not exceed max_threshold_px"));
    }
    if cfg.jitter.min_s > cfg.jitter.max_s {
        return Err(BuildError::InvalidConfig("jitter min_s must not exceed max_s"));
    }
    if cfg.response.scale_min > cfg.response.scale_max {
        return Err(BuildError::InvalidConfig("response scale_min must not exceed scale_max"));
    }
    Ok(())
}
