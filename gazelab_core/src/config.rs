//! Runtime configuration used by the core.
//!
//! These mirror the TOML schema in `gazelab_config` but carry resolved
//! values (typed conditions, a concrete fixation anchor, a stimulus step).

use gazelab_traits::Point;

use crate::condition::Condition;
use crate::step::Step;

#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentCfg {
    pub participant_id: String,
    pub conditions: Vec<Condition>,
    pub randomize: bool,
    pub fixation_required: bool,
    /// `Step::Clips` or `Step::Collisions`.
    pub stimulus: Step,
    pub seed: Option<u64>,
    pub output_file: String,
}

impl Default for ExperimentCfg {
    fn default() -> Self {
        Self {
            participant_id: "test".into(),
            conditions: ["and", "or", "none"].into_iter().map(Condition::from).collect(),
            randomize: true,
            fixation_required: false,
            stimulus: Step::Clips,
            seed: None,
            output_file: "causality-experiment-data.json".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationCfg {
    pub grid_cols: u32,
    pub grid_rows: u32,
    pub padding_px: f64,
    pub area_width_px: f64,
    pub area_height_px: f64,
    pub randomize_order: bool,
    pub hold_ms: u64,
    pub max_passes: u32,
    pub last_k: usize,
    pub min_score: u8,
    pub floor_px: f64,
    pub offset_px: f64,
    pub gamma: f64,
    pub max_threshold_px: f64,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            grid_cols: 3,
            grid_rows: 3,
            padding_px: 50.0,
            area_width_px: 1280.0,
            area_height_px: 720.0,
            randomize_order: true,
            hold_ms: 1000,
            max_passes: 3,
            last_k: 3,
            min_score: 50,
            floor_px: 40.0,
            offset_px: 10.0,
            gamma: 0.8,
            max_threshold_px: 200.0,
        }
    }
}

impl CalibrationCfg {
    pub fn center(&self) -> Point {
        Point::new(self.area_width_px / 2.0, self.area_height_px / 2.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FixationCfg {
    pub anchor: Point,
    pub required_run_length: u32,
    pub sample_rate_hz: u32,
}

impl Default for FixationCfg {
    fn default() -> Self {
        Self {
            anchor: CalibrationCfg::default().center(),
            required_run_length: 5,
            sample_rate_hz: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JitterCfg {
    pub min_s: u64,
    pub max_s: u64,
    pub intro_ms: u64,
}

impl Default for JitterCfg {
    fn default() -> Self {
        Self {
            min_s: 1,
            max_s: 3,
            intro_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseCfg {
    pub scale_min: u8,
    pub scale_max: u8,
    pub default: u8,
    pub ask_confidence: bool,
}

impl Default for ResponseCfg {
    fn default() -> Self {
        Self {
            scale_min: 0,
            scale_max: 100,
            default: 50,
            ask_confidence: false,
        }
    }
}

impl ResponseCfg {
    /// Clamp a slider value into the configured scale.
    pub fn clamp(&self, v: u8) -> u8 {
        v.clamp(self.scale_min, self.scale_max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StimulusCfg {
    pub display_ms: u64,
}

impl Default for StimulusCfg {
    fn default() -> Self {
        Self { display_ms: 4000 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Timeouts {
    /// Fail the run with `CoreError::Stalled` if no event arrives for this long.
    /// `None` waits forever (interactive use).
    pub idle_ms: Option<u64>,
}

/// Everything a `StepSequencer` needs besides its collaborators.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunCfg {
    pub experiment: ExperimentCfg,
    pub calibration: CalibrationCfg,
    pub fixation: FixationCfg,
    pub jitter: JitterCfg,
    pub response: ResponseCfg,
    pub stimulus: StimulusCfg,
    pub timeouts: Timeouts,
}
