//! The closed step vocabulary and the entries an execution stack holds.

use serde::{Deserialize, Serialize};

/// One stage of the experiment. Each variant is bound to exactly one handler
/// in the sequencer's dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    /// Operator setup: fixation flag and condition selection.
    Debugging,
    Calibration,
    Recalibrate,
    Instructions,
    /// Randomized inter-trial delay; starts gaze recording.
    Jitter,
    Clips,
    Collisions,
    /// Acknowledgment shown after a fixation break.
    Error,
    Response,
    End,
}

impl Step {
    pub const ALL: [Step; 10] = [
        Step::Debugging,
        Step::Calibration,
        Step::Recalibrate,
        Step::Instructions,
        Step::Jitter,
        Step::Clips,
        Step::Collisions,
        Step::Error,
        Step::Response,
        Step::End,
    ];

    pub const fn tag(self) -> &'static str {
        match self {
            Step::Debugging => "debugging",
            Step::Calibration => "calibration",
            Step::Recalibrate => "recalibrate",
            Step::Instructions => "instructions",
            Step::Jitter => "jitter",
            Step::Clips => "clips",
            Step::Collisions => "collisions",
            Step::Error => "error",
            Step::Response => "response",
            Step::End => "end",
        }
    }

    /// Steps that present a stimulus and may be cancelled by a fixation break.
    pub const fn is_stimulus(self) -> bool {
        matches!(self, Step::Clips | Step::Collisions)
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown step '{0}'")]
pub struct UnknownStep(pub String);

impl std::str::FromStr for Step {
    type Err = UnknownStep;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Step::ALL
            .iter()
            .copied()
            .find(|step| step.tag() == s)
            .ok_or_else(|| UnknownStep(s.to_string()))
    }
}

/// An execution stack slot: a concrete step, or the marker the setup step
/// replaces with the per-condition run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entry {
    Step(Step),
    ConditionsPlaceholder,
}

impl From<Step> for Entry {
    fn from(step: Step) -> Self {
        Entry::Step(step)
    }
}

impl std::fmt::Display for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Entry::Step(s) => s.fmt(f),
            Entry::ConditionsPlaceholder => f.write_str("conditions_placeholder"),
        }
    }
}
