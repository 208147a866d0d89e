//! Line-oriented renderer with an optional simulated participant.

use std::collections::HashSet;
use std::io::Write;

use gazelab_core::config::ResponseCfg;
use gazelab_core::{
    Condition, Event, EventSender, RenderError, SetupChoice, Step, StepRenderer, UserAction, View,
    ViewUpdate,
};
use gazelab_traits::Point;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::eye::SimulatedEye;

/// Answers every prompt the way a cooperative participant would and moves
/// the simulated eye to whatever the screen shows.
pub struct AutoParticipant {
    tx: EventSender,
    eye: SimulatedEye,
    rng: StdRng,
    response: ResponseCfg,
    setup: Option<SetupChoice>,
    glance: HashSet<Condition>,
    glanced: HashSet<Condition>,
    glance_to: Point,
    glance_samples: u32,
}

impl AutoParticipant {
    pub fn new(tx: EventSender, eye: SimulatedEye, response: ResponseCfg, seed: u64) -> Self {
        Self {
            tx,
            eye,
            rng: StdRng::seed_from_u64(seed),
            response,
            setup: None,
            glance: HashSet::new(),
            glanced: HashSet::new(),
            glance_to: Point::new(0.0, 0.0),
            glance_samples: 0,
        }
    }

    /// Answer the setup screen with `choice` instead of accepting defaults.
    pub fn with_setup(mut self, choice: SetupChoice) -> Self {
        self.setup = Some(choice);
        self
    }

    /// Look at `to` for `samples` samples at the start of the first
    /// presentation of each listed condition.
    pub fn glance_away_on(
        mut self,
        conditions: impl IntoIterator<Item = Condition>,
        to: Point,
        samples: u32,
    ) -> Self {
        self.glance.extend(conditions);
        self.glance_to = to;
        self.glance_samples = samples;
        self
    }

    fn post(&self, action: UserAction) {
        if self.tx.send(Event::Action(action)).is_err() {
            tracing::debug!("event bus closed; participant action dropped");
        }
    }

    fn on_render(&mut self, view: &View) {
        match view.step {
            Step::Debugging => match self.setup.take() {
                Some(choice) => self.post(UserAction::Configure(choice)),
                None => self.post(UserAction::Continue),
            },
            Step::Calibration | Step::Recalibrate | Step::Instructions | Step::Error => {
                self.post(UserAction::Continue);
            }
            Step::Clips | Step::Collisions => {
                if let Some(c) = &view.condition
                    && self.glance.contains(c)
                    && self.glanced.insert(c.clone())
                {
                    tracing::debug!(condition = %c, "participant glances away");
                    self.eye.glance_away(self.glance_to, self.glance_samples);
                }
            }
            Step::Response => {
                let r = &self.response;
                let judgment = self.rng.gen_range(r.scale_min..=r.scale_max);
                self.post(UserAction::Judgment(judgment));
                if r.ask_confidence {
                    let confidence = self.rng.gen_range(r.scale_min..=r.scale_max);
                    self.post(UserAction::Confidence(confidence));
                }
                self.post(UserAction::Continue);
            }
            Step::Jitter | Step::End => {}
        }
    }

    fn on_update(&mut self, update: &ViewUpdate) {
        match update {
            ViewUpdate::CalibrationTarget { point, .. } => self.eye.look_at(*point),
            ViewUpdate::FixationCross { visible: true, anchor, .. } => self.eye.look_at(*anchor),
            _ => {}
        }
    }
}

pub struct ConsoleRenderer {
    out: Box<dyn Write + Send>,
    participant: Option<AutoParticipant>,
}

impl ConsoleRenderer {
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Box::new(out),
            participant: None,
        }
    }

    pub fn with_participant(mut self, p: AutoParticipant) -> Self {
        self.participant = Some(p);
        self
    }

    fn line(&mut self, args: std::fmt::Arguments<'_>) -> Result<(), RenderError> {
        writeln!(self.out, "{args}").map_err(|e| RenderError::Unavailable(e.to_string()))
    }
}

impl StepRenderer for ConsoleRenderer {
    fn render(&mut self, view: &View) -> Result<(), RenderError> {
        match (&view.condition, view.step) {
            (_, Step::Calibration) => self.line(format_args!("[calibration] pass {}", view.pass))?,
            (Some(c), s)
                if matches!(s, Step::Jitter | Step::Clips | Step::Collisions | Step::Response) =>
            {
                self.line(format_args!("[{s}] condition {c}"))?;
            }
            (_, Step::End) => self.line(format_args!("[end] {} trials", view.trials_recorded))?,
            (_, s) => self.line(format_args!("[{s}]"))?,
        }
        if let Some(p) = self.participant.as_mut() {
            p.on_render(view);
        }
        Ok(())
    }

    fn update(&mut self, update: &ViewUpdate) -> Result<(), RenderError> {
        match update {
            ViewUpdate::CalibrationScored(r) => match r.score {
                Some(score) => self.line(format_args!(
                    "  score {score}, tolerance {:.1} px",
                    r.tolerance_px
                ))?,
                None => self.line(format_args!(
                    "  no gaze estimate; tolerance {:.1} px",
                    r.tolerance_px
                ))?,
            },
            ViewUpdate::CalibrationTarget { index, total, .. } => {
                tracing::trace!(index, total, "calibration target");
            }
            _ => {}
        }
        if let Some(p) = self.participant.as_mut() {
            p.on_update(update);
        }
        Ok(())
    }
}
