//! The step sequencer: pops entries, renders them, runs their handler, and
//! re-plans the stack from what the handler reports.
//!
//! Every wait goes through `next_signal`, which blocks on the event bus,
//! feeds gaze samples to the fixation monitor and drops timer or stimulus
//! events armed under an older generation.

use std::time::Duration;

use eyre::Report;
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, error, info, trace, warn};

use gazelab_traits::Point;

use crate::calibration::{CalibrationController, CalibrationDecision};
use crate::collab::{
    Persistence, SensorControl, StepRenderer, StimulusPlayer, StimulusRequest, View, ViewUpdate,
};
use crate::config::RunCfg;
use crate::error::{CoreError, RenderError, Result, collaborator_error};
use crate::events::{
    CancelFlag, Completion, Event, EventBus, EventSender, StepToken, TimerKind, UserAction,
};
use crate::fixation::FixationBreak;
use crate::recorder::Responses;
use crate::session::Session;
use crate::stack::{self, ExecutionStack};
use crate::status::{ActiveSteps, Advance, RunSummary, StepOutcome};
use crate::step::{Entry, Step};
use crate::timer::Scheduler;
use crate::util::secs_to_ms;

/// What a wait resolved to.
#[derive(Debug)]
enum Signal {
    Action(UserAction),
    Timer(TimerKind),
    StimulusDone,
    Break(FixationBreak),
}

pub struct StepSequencer {
    pub(crate) cfg: RunCfg,
    pub(crate) stack: ExecutionStack,
    pub(crate) session: Session,
    pub(crate) calibration: CalibrationController,
    pub(crate) renderer: Box<dyn StepRenderer>,
    pub(crate) stimulus: Box<dyn StimulusPlayer>,
    pub(crate) persistence: Box<dyn Persistence>,
    pub(crate) sensor: Option<Box<dyn SensorControl>>,
    pub(crate) sensor_started: bool,
    pub(crate) scheduler: Box<dyn Scheduler>,
    pub(crate) bus: EventBus,
    pub(crate) generation: u64,
    pub(crate) current: Option<Step>,
    pub(crate) active: ActiveSteps,
    pub(crate) visited: Vec<Step>,
    pub(crate) exported: Option<std::path::PathBuf>,
}

impl core::fmt::Debug for StepSequencer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StepSequencer")
            .field("stack", &self.stack)
            .field("current", &self.current)
            .field("generation", &self.generation)
            .field("trials", &self.session.recorder().len())
            .finish()
    }
}

impl StepSequencer {
    pub fn builder() -> crate::builder::SequencerBuilder {
        crate::builder::SequencerBuilder::default()
    }

    pub fn stack(&self) -> &ExecutionStack {
        &self.stack
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Steps rendered so far, in order.
    pub fn visited(&self) -> &[Step] {
        &self.visited
    }

    pub fn current(&self) -> Option<Step> {
        self.current
    }

    pub fn max_active_steps(&self) -> usize {
        self.active.high_water()
    }

    /// Sender for posting user actions and shutdown from other threads.
    pub fn sender(&self) -> EventSender {
        self.bus.sender()
    }

    /// Run until the stack is exhausted.
    pub fn run(&mut self) -> Result<RunSummary> {
        info!(
            participant = %self.session.participant_id(),
            pending = self.stack.len(),
            "session start"
        );
        let res = loop {
            match self.advance() {
                Ok(Advance::Halted) => break Ok(()),
                Ok(_) => {}
                Err(e) => break Err(e),
            }
        };
        self.end_sensor();
        res?;
        let summary = self.summary();
        info!(
            trials = summary.trials,
            breaks = summary.fixation_breaks,
            "session complete"
        );
        Ok(summary)
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            participant_id: self.session.participant_id().to_string(),
            trials: self.session.recorder().len(),
            steps: self.visited.clone(),
            calibration_passes: self.session.total_passes(),
            tolerance_px: self.session.tolerance_px(),
            fixation_breaks: self.session.monitor().breaks(),
            exported: self.exported.clone(),
            max_active_steps: self.active.high_water(),
        }
    }

    /// Pop one entry and run it to completion or cancellation.
    pub fn advance(&mut self) -> Result<Advance> {
        let Some(entry) = self.stack.pop() else {
            info!("execution stack exhausted; halting");
            return Ok(Advance::Halted);
        };
        let step = match entry {
            Entry::Step(step) => step,
            Entry::ConditionsPlaceholder => {
                warn!("conditions placeholder reached before setup expanded it; skipping");
                return Ok(Advance::Skipped(entry));
            }
        };

        let outcome = loop {
            let res = self.run_step(step);
            self.retire(step);
            match res {
                Ok(outcome) => break outcome,
                Err(err) => match missing_element(&err) {
                    Some(element) => {
                        error!(%step, %element, "step setup aborted; waiting for operator");
                        self.await_operator()?;
                        info!(%step, "operator continued; re-running step");
                    }
                    None => return Err(err),
                },
            }
        };

        if let StepOutcome::Cancelled(ref b) = outcome {
            warn!(
                %step,
                condition = %b.trial,
                at_ms = b.timestamp_ms,
                "re-queueing stimulus behind error"
            );
            self.stack = stack::push_recovery(std::mem::take(&mut self.stack), step);
        }
        Ok(Advance::Ran { step, outcome })
    }

    fn run_step(&mut self, step: Step) -> Result<StepOutcome> {
        self.arm();
        self.drop_stale_events()?;
        let view = self.view_for(step);
        self.renderer.render(&view).map_err(render_report)?;
        self.visited.push(step);
        info!(%step, "step start");

        let _guard = self.active.enter();
        self.current = Some(step);
        let res = self.dispatch(step);
        self.current = None;
        res
    }

    /// Empty the bus before a step renders. Actions queued now were meant for
    /// an earlier step; gaze still reaches the monitor.
    fn drop_stale_events(&mut self) -> Result<()> {
        while let Some(event) = self.bus.try_recv() {
            match event {
                Event::Action(a) => trace!(?a, "dropping action left over from an earlier step"),
                Event::Gaze(s) => {
                    let _ = self.session.monitor_mut().on_sample(s);
                }
                Event::Timer { .. } | Event::StimulusDone { .. } => {}
                Event::Shutdown => {
                    warn!("shutdown requested");
                    return Err(Report::new(CoreError::Cancelled));
                }
            }
        }
        Ok(())
    }

    /// Invalidate everything the finished handler armed.
    fn retire(&mut self, step: Step) {
        self.arm();
        if step.is_stimulus() {
            let monitor = self.session.monitor_mut();
            monitor.end_stimulus();
        }
        trace!(%step, generation = self.generation, "step retired");
    }

    fn dispatch(&mut self, step: Step) -> Result<StepOutcome> {
        match step {
            Step::Debugging => self.handle_setup(),
            Step::Calibration => self.handle_calibration(),
            Step::Recalibrate | Step::Instructions | Step::Error => self.handle_acknowledge(),
            Step::Jitter => self.handle_jitter(),
            Step::Clips | Step::Collisions => self.handle_stimulus(step),
            Step::Response => self.handle_response(),
            Step::End => self.handle_end(),
        }
    }

    fn view_for(&self, step: Step) -> View {
        View {
            step,
            condition: self.session.current_condition().cloned(),
            pass: self.session.passes_in_round() + 1,
            fixation_required: self.session.fixation_required(),
            tolerance_px: self.session.tolerance_px(),
            trials_recorded: self.session.recorder().len(),
        }
    }

    // ── waiting ──────────────────────────────────────────────────────────────

    /// Bump the generation; events armed before this are stale.
    fn arm(&mut self) -> StepToken {
        self.generation += 1;
        StepToken(self.generation)
    }

    fn next_signal(&mut self, token: StepToken) -> Result<Signal> {
        let idle = self.cfg.timeouts.idle_ms.map(Duration::from_millis);
        loop {
            let Some(event) = self.bus.recv(idle) else {
                return Err(Report::new(CoreError::Stalled {
                    ms: self.cfg.timeouts.idle_ms.unwrap_or_default(),
                    step: self.current.unwrap_or(Step::End),
                }));
            };
            match event {
                Event::Action(a) => return Ok(Signal::Action(a)),
                Event::Gaze(s) => {
                    if let Some(b) = self.session.monitor_mut().on_sample(s) {
                        return Ok(Signal::Break(b));
                    }
                }
                Event::Timer { token: t, kind } if t == token => return Ok(Signal::Timer(kind)),
                Event::StimulusDone { token: t } if t == token => return Ok(Signal::StimulusDone),
                Event::Timer { token: t, kind } => {
                    trace!(?kind, stale = t.0, current = token.0, "ignoring stale timer");
                }
                Event::StimulusDone { token: t } => {
                    trace!(stale = t.0, current = token.0, "ignoring stale stimulus completion");
                }
                Event::Shutdown => {
                    warn!(step = ?self.current, "shutdown requested");
                    return Err(Report::new(CoreError::Cancelled));
                }
            }
        }
    }

    fn wait_for_continue(&mut self, token: StepToken) -> Result<()> {
        loop {
            match self.next_signal(token)? {
                Signal::Action(UserAction::Continue) => return Ok(()),
                other => trace!(?other, "ignored while waiting for continue"),
            }
        }
    }

    fn wait_for_timer(&mut self, token: StepToken, kind: TimerKind) -> Result<()> {
        loop {
            match self.next_signal(token)? {
                Signal::Timer(k) if k == kind => return Ok(()),
                other => trace!(?other, ?kind, "ignored while waiting for timer"),
            }
        }
    }

    fn sleep(&mut self, ms: u64, kind: TimerKind) -> Result<()> {
        let token = self.arm();
        self.scheduler.schedule(Duration::from_millis(ms), token, kind);
        self.wait_for_timer(token, kind)
    }

    fn await_operator(&mut self) -> Result<()> {
        let token = self.arm();
        self.wait_for_continue(token)
    }

    // ── sensor ───────────────────────────────────────────────────────────────

    fn ensure_sensor(&mut self) {
        if self.sensor_started {
            return;
        }
        let Some(sensor) = self.sensor.as_mut() else {
            return;
        };
        match sensor.begin() {
            Ok(()) => {
                info!("gaze sensor started");
                self.sensor_started = true;
            }
            Err(e) => {
                warn!(error = %e, "gaze sensor failed to start; continuing without it");
                self.sensor = None;
            }
        }
    }

    fn end_sensor(&mut self) {
        if self.sensor_started
            && let Some(sensor) = self.sensor.as_mut()
        {
            sensor.end();
            self.sensor_started = false;
            debug!("gaze sensor stopped");
        }
    }

    fn sensor_live(&mut self) -> Option<&mut Box<dyn SensorControl>> {
        if self.sensor_started {
            self.sensor.as_mut()
        } else {
            None
        }
    }

    // ── handlers ─────────────────────────────────────────────────────────────

    fn handle_setup(&mut self) -> Result<StepOutcome> {
        let token = self.arm();
        let choice = loop {
            match self.next_signal(token)? {
                Signal::Action(UserAction::Configure(choice)) => break Some(choice),
                Signal::Action(UserAction::Continue) => break None,
                other => trace!(?other, "ignored during setup"),
            }
        };
        let (fixation, mut conditions) = match choice {
            Some(c) => (c.fixation, c.conditions),
            None => (
                self.session.fixation_required(),
                self.session.remaining_conditions().cloned().collect(),
            ),
        };
        if self.cfg.experiment.randomize {
            conditions.shuffle(self.session.rng_mut());
        }
        info!(
            conditions = ?conditions.iter().map(ToString::to_string).collect::<Vec<_>>(),
            fixation,
            "conditions selected"
        );
        let n = conditions.len();
        self.session.configure(fixation, conditions);
        self.stack = stack::expand_conditions(
            std::mem::take(&mut self.stack),
            n,
            self.cfg.experiment.stimulus,
        );
        Ok(StepOutcome::Complete)
    }

    fn handle_acknowledge(&mut self) -> Result<StepOutcome> {
        let token = self.arm();
        self.wait_for_continue(token)?;
        Ok(StepOutcome::Complete)
    }

    fn handle_calibration(&mut self) -> Result<StepOutcome> {
        self.ensure_sensor();
        let token = self.arm();
        self.wait_for_continue(token)?;

        let controller = self.calibration.clone();
        let targets = controller.targets(self.session.rng_mut());
        let total = targets.len();
        info!(
            pass = self.session.passes_in_round() + 1,
            targets = total,
            "calibration pass start"
        );
        let result = controller.run_pass(&targets, |index, point| {
            self.probe_target(index, total, point)
        })?;

        // a pass only counts once the participant has seen its score
        self.renderer
            .update(&ViewUpdate::CalibrationScored(result))
            .map_err(render_report)?;
        let passes = self.session.record_pass(result);

        match controller.decide(&result, passes) {
            CalibrationDecision::Accept => {
                info!(
                    score = ?result.score,
                    error_px = ?result.error_px,
                    tolerance_px = result.tolerance_px,
                    passes,
                    "calibration accepted"
                );
                self.session.finish_calibration_round();
            }
            CalibrationDecision::Exhausted => {
                warn!(
                    score = ?result.score,
                    tolerance_px = result.tolerance_px,
                    passes,
                    "calibration attempts exhausted; keeping last tolerance"
                );
                self.session.finish_calibration_round();
            }
            CalibrationDecision::Retry => {
                info!(score = ?result.score, passes, "calibration rejected; recalibrating");
                self.stack = stack::push_recalibration(std::mem::take(&mut self.stack));
            }
        }
        Ok(StepOutcome::Complete)
    }

    fn probe_target(&mut self, index: usize, total: usize, point: Point) -> Result<Option<Point>> {
        self.renderer
            .update(&ViewUpdate::CalibrationTarget {
                index,
                total,
                point,
            })
            .map_err(render_report)?;
        self.sleep(self.cfg.calibration.hold_ms, TimerKind::CalibrationHold)?;
        let observed = self.sensor_live().and_then(|s| s.current_estimate());
        if observed.is_none() {
            debug!(index, "no gaze estimate at target");
        }
        Ok(observed)
    }

    fn handle_jitter(&mut self) -> Result<StepOutcome> {
        let Some(condition) = self.session.current_condition().cloned() else {
            warn!("jitter without a pending condition");
            return Ok(StepOutcome::Complete);
        };
        if let Some(sensor) = self.sensor_live() {
            sensor.resume();
        }
        self.session.monitor_mut().start_recording(condition);

        self.sleep(self.cfg.jitter.intro_ms, TimerKind::JitterIntro)?;
        self.renderer
            .update(&ViewUpdate::JitterIntroHidden)
            .map_err(render_report)?;

        let (min_s, max_s) = (self.cfg.jitter.min_s, self.cfg.jitter.max_s);
        let secs = self.session.rng_mut().gen_range(min_s..=max_s.max(min_s));
        debug!(secs, "inter-trial delay");
        self.sleep(secs_to_ms(secs), TimerKind::JitterDelay)?;
        Ok(StepOutcome::Complete)
    }

    fn handle_stimulus(&mut self, step: Step) -> Result<StepOutcome> {
        let Some(condition) = self.session.current_condition().cloned() else {
            warn!(%step, "stimulus without a pending condition");
            return Ok(StepOutcome::Complete);
        };
        let wanted = self.session.fixation_required();
        let required = wanted && self.sensor_started;
        if wanted && !required {
            warn!(%condition, "fixation required but no gaze sensor; assuming fixation holds");
        }

        let tolerance = self.session.tolerance_px();
        let monitor = self.session.monitor_mut();
        if !monitor.is_recording() {
            monitor.start_recording(condition.clone());
        }
        monitor.begin_stimulus(required, condition.clone());
        let anchor = monitor.anchor();
        if let Some(sensor) = self.sensor_live() {
            sensor.resume();
        }
        self.renderer
            .update(&ViewUpdate::FixationCross {
                visible: required,
                anchor,
                radius_px: tolerance,
            })
            .map_err(render_report)?;

        let token = self.arm();
        let cancel = CancelFlag::default();
        let request = StimulusRequest {
            kind: step,
            condition: condition.clone(),
            display_ms: self.cfg.stimulus.display_ms,
        };
        info!(%step, %condition, fixation = required, "stimulus start");
        self.stimulus
            .play(&request, Completion::new(token, self.bus.sender(), cancel.clone()))
            .map_err(|e| collaborator_error(&*e, CoreError::Stimulus))?;

        let res = loop {
            match self.next_signal(token) {
                Ok(Signal::StimulusDone) => break Ok(StepOutcome::Complete),
                Ok(Signal::Break(b)) => break Ok(StepOutcome::Cancelled(b)),
                Ok(other) => trace!(?other, "ignored during stimulus"),
                Err(e) => break Err(e),
            }
        };
        if !matches!(res, Ok(StepOutcome::Complete)) {
            cancel.cancel();
            self.stimulus.stop();
        }

        let samples = self.session.monitor_mut().stop_recording();
        if let Err(e) = self.renderer.update(&ViewUpdate::FixationCross {
            visible: false,
            anchor,
            radius_px: tolerance,
        }) {
            debug!(error = %e, "could not hide fixation cross");
        }
        let outcome = res?;
        if outcome == StepOutcome::Complete {
            debug!(%condition, samples = samples.len(), "stimulus complete");
            self.session.set_pending_samples(samples);
        }
        Ok(outcome)
    }

    fn handle_response(&mut self) -> Result<StepOutcome> {
        if let Some(sensor) = self.sensor_live() {
            sensor.pause();
        }
        let rcfg = self.cfg.response.clone();
        let mut responses = Responses::new(rcfg.default, rcfg.ask_confidence);
        let token = self.arm();
        loop {
            match self.next_signal(token)? {
                Signal::Action(UserAction::Judgment(v)) => responses.judgment = rcfg.clamp(v),
                Signal::Action(UserAction::Confidence(v)) if rcfg.ask_confidence => {
                    responses.confidence = Some(rcfg.clamp(v));
                }
                Signal::Action(UserAction::Continue) => break,
                other => trace!(?other, "ignored during response"),
            }
        }
        match self.session.complete_trial(responses) {
            Some(condition) => info!(
                %condition,
                judgment = responses.judgment,
                confidence = ?responses.confidence,
                trials = self.session.recorder().len(),
                "trial recorded"
            ),
            None => warn!("response submitted without a pending condition; nothing recorded"),
        }
        Ok(StepOutcome::Complete)
    }

    fn handle_end(&mut self) -> Result<StepOutcome> {
        let export = self
            .session
            .recorder()
            .export_run(self.session.participant_id());
        let path = self
            .persistence
            .persist(&export, &self.cfg.experiment.output_file)
            .map_err(|e| collaborator_error(&*e, CoreError::Persistence))?;
        info!(path = %path.display(), trials = export.trials.len(), "run exported");
        self.exported = Some(path);
        Ok(StepOutcome::Complete)
    }
}

fn render_report(e: RenderError) -> Report {
    match e {
        RenderError::Unavailable(msg) => Report::new(CoreError::RenderUnavailable(msg)),
        other => Report::new(other),
    }
}

fn missing_element(err: &Report) -> Option<String> {
    match err.downcast_ref::<RenderError>() {
        Some(RenderError::MissingElement { element, .. }) => Some(element.clone()),
        _ => None,
    }
}
