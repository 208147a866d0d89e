use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;

use crate::fixation::FixationBreak;
use crate::step::{Entry, Step};

/// How a step handler finished.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Complete,
    /// A stimulus step was aborted by a fixation break.
    Cancelled(FixationBreak),
}

/// Result of one `StepSequencer::advance`.
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    Ran { step: Step, outcome: StepOutcome },
    /// An entry popped but not executed (an unexpanded placeholder).
    Skipped(Entry),
    /// The stack is empty.
    Halted,
}

/// Counts handlers currently executing and remembers the peak.
#[derive(Debug, Clone, Default)]
pub struct ActiveSteps {
    current: Arc<AtomicUsize>,
    high_water: Arc<AtomicUsize>,
}

impl ActiveSteps {
    pub fn enter(&self) -> ActiveGuard {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.high_water.fetch_max(now, Ordering::SeqCst);
        debug_assert!(now <= 1, "{now} step handlers active at once");
        ActiveGuard {
            current: self.current.clone(),
        }
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    pub fn high_water(&self) -> usize {
        self.high_water.load(Ordering::SeqCst)
    }
}

#[must_use]
pub struct ActiveGuard {
    current: Arc<AtomicUsize>,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// What a finished run reports back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub participant_id: String,
    pub trials: usize,
    pub steps: Vec<Step>,
    pub calibration_passes: u32,
    pub tolerance_px: f64,
    pub fixation_breaks: u64,
    pub exported: Option<PathBuf>,
    pub max_active_steps: usize,
}
