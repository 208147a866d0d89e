#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Step sequencing and gaze-contingent control for behavioral experiments.
//!
//! This crate holds no UI, video or sensor code. Everything external goes
//! through the collaborator traits in `collab` and `gazelab_traits::GazeSource`.
//!
//! ## Architecture
//!
//! - **Steps**: closed `Step` enum, one handler each (`step`, `sequencer`)
//! - **Stack**: LIFO execution stack with pure re-planning transforms (`stack`)
//! - **Calibration**: grid passes, score, adaptive tolerance, retry policy (`calibration`)
//! - **Fixation**: downsampled hysteresis monitor that also owns the trial gaze buffer (`fixation`)
//! - **Recording**: trials and the exported snapshot (`recorder`)
//! - **Events**: one crossbeam bus; timers and completions carry generation tokens
//!   (`events`, `timer`)
//! - **Sensor**: background sampler thread owning the `GazeSource` (`sampler`)

pub mod builder;
pub mod calibration;
pub mod collab;
pub mod condition;
pub mod config;
pub mod conversions;
pub mod error;
pub mod events;
pub mod fixation;
pub mod mocks;
pub mod recorder;
pub mod sampler;
pub mod sequencer;
pub mod session;
pub mod stack;
pub mod status;
pub mod step;
pub mod timer;
pub mod util;

pub use builder::SequencerBuilder;
pub use calibration::{
    CalibrationController, CalibrationDecision, CalibrationResult, CalibrationSample,
};
pub use collab::{
    Persistence, SensorControl, StepRenderer, StimulusPlayer, StimulusRequest, View, ViewUpdate,
};
pub use condition::Condition;
pub use config::RunCfg;
pub use error::{BuildError, CoreError, RenderError, Result};
pub use events::{
    CancelFlag, Completion, Event, EventBus, EventSender, SetupChoice, StepToken, TimerKind,
    UserAction,
};
pub use fixation::{FixationBreak, FixationMonitor, FixationState, MonitorPhase};
pub use recorder::{GazeRecord, Responses, RunExport, Trial, TrialRecorder};
pub use sampler::Sampler;
pub use sequencer::StepSequencer;
pub use session::Session;
pub use stack::{ExecutionStack, expand_conditions, push_recalibration, push_recovery};
pub use status::{ActiveSteps, Advance, RunSummary, StepOutcome};
pub use step::{Entry, Step};
pub use timer::{InlineScheduler, Scheduler, ThreadScheduler};
