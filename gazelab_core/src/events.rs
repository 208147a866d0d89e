//! The single event bus every handler waits on.
//!
//! User actions, gaze samples, timer fires, stimulus completions and shutdown
//! all arrive on one unbounded `crossbeam-channel`. Timer and stimulus events
//! carry the `StepToken` they were armed with; the sequencer drops any whose
//! token is not the current generation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel as xch;
use gazelab_traits::GazeSample;

use crate::condition::Condition;

/// Generation token identifying one armed wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StepToken(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    CalibrationHold,
    JitterIntro,
    JitterDelay,
}

/// Operator choices made on the setup screen.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SetupChoice {
    pub fixation: bool,
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    /// Any "continue"/"submit" button.
    Continue,
    Configure(SetupChoice),
    Judgment(u8),
    Confidence(u8),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Action(UserAction),
    Gaze(GazeSample),
    Timer { token: StepToken, kind: TimerKind },
    StimulusDone { token: StepToken },
    Shutdown,
}

pub type EventSender = xch::Sender<Event>;

#[derive(Debug)]
pub struct EventBus {
    tx: xch::Sender<Event>,
    rx: xch::Receiver<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, rx) = xch::unbounded();
        Self { tx, rx }
    }

    pub fn sender(&self) -> EventSender {
        self.tx.clone()
    }

    /// Block for the next event. The bus holds its own sender, so this only
    /// returns `None` on timeout.
    pub(crate) fn recv(&self, timeout: Option<Duration>) -> Option<Event> {
        match timeout {
            Some(t) => self.rx.recv_timeout(t).ok(),
            None => self.rx.recv().ok(),
        }
    }

    pub(crate) fn try_recv(&self) -> Option<Event> {
        self.rx.try_recv().ok()
    }

    /// Events already queued, without blocking.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

/// Shared flag a stimulus player polls to stop early.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Handed to a stimulus player; resolves the waiting handler at most once.
#[derive(Debug)]
pub struct Completion {
    token: StepToken,
    tx: EventSender,
    cancel: CancelFlag,
}

impl Completion {
    pub fn new(token: StepToken, tx: EventSender, cancel: CancelFlag) -> Self {
        Self { token, tx, cancel }
    }

    pub fn token(&self) -> StepToken {
        self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// The bus, for players that also drive a simulated sensor.
    pub fn bus(&self) -> EventSender {
        self.tx.clone()
    }

    /// Signal the end of playback. A cancelled completion posts nothing.
    pub fn complete(self) {
        if self.cancel.is_cancelled() {
            tracing::trace!(token = self.token.0, "completion after cancel dropped");
            return;
        }
        if self.tx.send(Event::StimulusDone { token: self.token }).is_err() {
            tracing::debug!("event bus closed before stimulus completion");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_posts_its_token() {
        let bus = EventBus::new();
        Completion::new(StepToken(7), bus.sender(), CancelFlag::default()).complete();
        assert_eq!(
            bus.recv(Some(Duration::from_millis(10))),
            Some(Event::StimulusDone { token: StepToken(7) })
        );
    }

    #[test]
    fn cancelled_completion_is_silent() {
        let bus = EventBus::new();
        let flag = CancelFlag::default();
        let done = Completion::new(StepToken(1), bus.sender(), flag.clone());
        flag.cancel();
        assert!(done.is_cancelled());
        done.complete();
        assert_eq!(bus.pending(), 0);
    }

    #[test]
    fn recv_times_out_on_an_empty_bus() {
        let bus = EventBus::new();
        assert_eq!(bus.recv(Some(Duration::from_millis(1))), None);
    }
}
