//! Timer scheduling. A fire is just an `Event::Timer` on the bus; staleness is
//! decided by the receiver from the token.

use std::time::Duration;

use gazelab_traits::Clock;

use crate::events::{Event, EventSender, StepToken, TimerKind};

pub trait Scheduler {
    fn schedule(&mut self, delay: Duration, token: StepToken, kind: TimerKind);
}

/// One short-lived thread per timer, sleeping on the given clock.
pub struct ThreadScheduler<C> {
    tx: EventSender,
    clock: C,
}

impl<C> ThreadScheduler<C>
where
    C: Clock + Clone + Send + 'static,
{
    pub fn new(tx: EventSender, clock: C) -> Self {
        Self { tx, clock }
    }
}

impl<C> Scheduler for ThreadScheduler<C>
where
    C: Clock + Clone + Send + 'static,
{
    fn schedule(&mut self, delay: Duration, token: StepToken, kind: TimerKind) {
        let tx = self.tx.clone();
        let clock = self.clock.clone();
        std::thread::spawn(move || {
            clock.sleep(delay);
            if tx.send(Event::Timer { token, kind }).is_err() {
                tracing::trace!(?kind, "timer fired after bus closed");
            }
        });
    }
}

/// Fires every timer immediately; the delay is only logged.
pub struct InlineScheduler {
    tx: EventSender,
}

impl InlineScheduler {
    pub fn new(tx: EventSender) -> Self {
        Self { tx }
    }
}

impl Scheduler for InlineScheduler {
    fn schedule(&mut self, delay: Duration, token: StepToken, kind: TimerKind) {
        tracing::trace!(?kind, delay_ms = delay.as_millis() as u64, "inline timer");
        if self.tx.send(Event::Timer { token, kind }).is_err() {
            tracing::trace!(?kind, "inline timer after bus closed");
        }
    }
}
