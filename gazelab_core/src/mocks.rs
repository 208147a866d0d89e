//! Test and helper doubles for the collaborator traits.
//!
//! All of them are synchronous: the renderer posts the participant's actions
//! onto the bus as soon as a view is rendered, and the stimulus player
//! completes inside `play`.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use gazelab_traits::{BoxError, GazeSample, Point};

use crate::collab::{
    Persistence, SensorControl, StepRenderer, StimulusPlayer, StimulusRequest, View, ViewUpdate,
};
use crate::condition::Condition;
use crate::error::RenderError;
use crate::events::{Completion, Event, EventSender, UserAction};
use crate::recorder::RunExport;
use crate::step::Step;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

type Script = Box<dyn FnMut(&View) -> Vec<UserAction> + Send>;

/// Actions a cooperative participant takes on each step.
pub fn cooperative(view: &View) -> Vec<UserAction> {
    match view.step {
        Step::Jitter | Step::Clips | Step::Collisions | Step::End => Vec::new(),
        _ => vec![UserAction::Continue],
    }
}

/// Shared view of what a `RecordingRenderer` saw.
#[derive(Debug, Clone, Default)]
pub struct RenderLog {
    views: Arc<Mutex<Vec<View>>>,
    updates: Arc<Mutex<Vec<ViewUpdate>>>,
}

impl RenderLog {
    pub fn steps(&self) -> Vec<Step> {
        lock(&self.views).iter().map(|v| v.step).collect()
    }

    pub fn views(&self) -> Vec<View> {
        lock(&self.views).clone()
    }

    pub fn updates(&self) -> Vec<ViewUpdate> {
        lock(&self.updates).clone()
    }

    pub fn count(&self, step: Step) -> usize {
        lock(&self.views).iter().filter(|v| v.step == step).count()
    }
}

pub struct RecordingRenderer {
    tx: EventSender,
    log: RenderLog,
    script: Script,
    missing: HashMap<Step, (String, usize)>,
    score_missing: Option<(String, usize)>,
    unavailable: bool,
}

impl RecordingRenderer {
    pub fn new(tx: EventSender) -> Self {
        Self {
            tx,
            log: RenderLog::default(),
            script: Box::new(cooperative),
            missing: HashMap::new(),
            score_missing: None,
            unavailable: false,
        }
    }

    pub fn with_script(mut self, f: impl FnMut(&View) -> Vec<UserAction> + Send + 'static) -> Self {
        self.script = Box::new(f);
        self
    }

    /// Fail the first `times` renders of `step` with a missing element. The
    /// operator's `Continue` is posted with each failure.
    pub fn missing_element(mut self, step: Step, element: &str, times: usize) -> Self {
        self.missing.insert(step, (element.to_string(), times));
        self
    }

    /// Like `missing_element`, for the first `times` calibration score updates.
    pub fn missing_score_element(mut self, element: &str, times: usize) -> Self {
        self.score_missing = Some((element.to_string(), times));
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub fn log(&self) -> RenderLog {
        self.log.clone()
    }
}

impl StepRenderer for RecordingRenderer {
    fn render(&mut self, view: &View) -> Result<(), RenderError> {
        if self.unavailable {
            return Err(RenderError::Unavailable("no display".into()));
        }
        if let Some((element, left)) = self.missing.get_mut(&view.step)
            && *left > 0
        {
            *left -= 1;
            let _ = self.tx.send(Event::Action(UserAction::Continue));
            return Err(RenderError::MissingElement {
                step: view.step,
                element: element.clone(),
            });
        }
        lock(&self.log.views).push(view.clone());
        for action in (self.script)(view) {
            let _ = self.tx.send(Event::Action(action));
        }
        Ok(())
    }

    fn update(&mut self, update: &ViewUpdate) -> Result<(), RenderError> {
        if let ViewUpdate::CalibrationScored(_) = update
            && let Some((element, left)) = self.score_missing.as_mut()
            && *left > 0
        {
            *left -= 1;
            let _ = self.tx.send(Event::Action(UserAction::Continue));
            return Err(RenderError::MissingElement {
                step: Step::Calibration,
                element: element.clone(),
            });
        }
        lock(&self.log.updates).push(update.clone());
        Ok(())
    }
}

/// Completes every presentation at once, optionally injecting gaze samples
/// first. Scripts are per condition and per attempt.
#[derive(Default)]
pub struct ScriptedStimulus {
    plays: Arc<Mutex<Vec<StimulusRequest>>>,
    gaze: HashMap<Condition, VecDeque<Vec<GazeSample>>>,
    stops: Arc<AtomicUsize>,
}

impl ScriptedStimulus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Samples to deliver during the next not-yet-scripted attempt of `condition`.
    pub fn with_gaze(mut self, condition: &str, samples: Vec<GazeSample>) -> Self {
        self.gaze
            .entry(Condition::from(condition))
            .or_default()
            .push_back(samples);
        self
    }

    pub fn plays(&self) -> Arc<Mutex<Vec<StimulusRequest>>> {
        self.plays.clone()
    }

    pub fn stops(&self) -> Arc<AtomicUsize> {
        self.stops.clone()
    }
}

impl StimulusPlayer for ScriptedStimulus {
    fn play(&mut self, request: &StimulusRequest, done: Completion) -> Result<(), BoxError> {
        lock(&self.plays).push(request.clone());
        if let Some(samples) = self
            .gaze
            .get_mut(&request.condition)
            .and_then(VecDeque::pop_front)
        {
            let bus = done.bus();
            for s in samples {
                bus.send(Event::Gaze(s))?;
            }
        }
        done.complete();
        Ok(())
    }

    fn stop(&mut self) {
        self.stops.fetch_add(1, Ordering::Relaxed);
    }
}

/// Keeps exported JSON in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    saved: Arc<Mutex<Vec<(String, String)>>>,
    fail: bool,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// `(filename, json)` per persist call.
    pub fn saved(&self) -> Vec<(String, String)> {
        lock(&self.saved).clone()
    }
}

impl Persistence for MemoryPersistence {
    fn persist(&mut self, export: &RunExport, filename: &str) -> Result<PathBuf, BoxError> {
        if self.fail {
            return Err("disk full".into());
        }
        let json = export.to_json()?;
        lock(&self.saved).push((filename.to_string(), json));
        Ok(PathBuf::from(filename))
    }
}

/// A sensor answering estimate queries from a script, then a fallback.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSensor {
    estimates: Arc<Mutex<VecDeque<Option<Point>>>>,
    fallback: Option<Point>,
    calls: Arc<Mutex<Vec<&'static str>>>,
    fail_begin: bool,
}

impl ScriptedSensor {
    /// Every query answers `fallback`.
    pub fn steady(fallback: Option<Point>) -> Self {
        Self {
            fallback,
            ..Self::default()
        }
    }

    pub fn with_estimates(self, estimates: impl IntoIterator<Item = Option<Point>>) -> Self {
        lock(&self.estimates).extend(estimates);
        self
    }

    pub fn failing_begin() -> Self {
        Self {
            fail_begin: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        lock(&self.calls).clone()
    }
}

impl SensorControl for ScriptedSensor {
    fn begin(&mut self) -> Result<(), BoxError> {
        lock(&self.calls).push("begin");
        if self.fail_begin {
            return Err("camera not found".into());
        }
        Ok(())
    }

    fn pause(&mut self) {
        lock(&self.calls).push("pause");
    }

    fn resume(&mut self) {
        lock(&self.calls).push("resume");
    }

    fn end(&mut self) {
        lock(&self.calls).push("end");
    }

    fn current_estimate(&mut self) -> Option<Point> {
        lock(&self.estimates).pop_front().unwrap_or(self.fallback)
    }
}
