//! `From` implementations bridging `gazelab_config` types to `gazelab_core` types.

use gazelab_traits::Point;

use crate::condition::Condition;
use crate::config::{
    CalibrationCfg, ExperimentCfg, FixationCfg, JitterCfg, ResponseCfg, RunCfg, StimulusCfg,
    Timeouts,
};
use crate::step::Step;

impl From<gazelab_config::StimulusKind> for Step {
    fn from(k: gazelab_config::StimulusKind) -> Self {
        match k {
            gazelab_config::StimulusKind::Clips => Step::Clips,
            gazelab_config::StimulusKind::Collisions => Step::Collisions,
        }
    }
}

impl From<&gazelab_config::Experiment> for ExperimentCfg {
    fn from(c: &gazelab_config::Experiment) -> Self {
        Self {
            participant_id: c.participant_id.clone(),
            conditions: c.conditions.iter().map(|s| Condition::new(s.as_str())).collect(),
            randomize: c.randomize,
            fixation_required: c.fixation_required,
            stimulus: c.stimulus.into(),
            seed: c.seed,
            output_file: c.output_file.clone(),
        }
    }
}

impl From<&gazelab_config::CalibrationCfg> for CalibrationCfg {
    fn from(c: &gazelab_config::CalibrationCfg) -> Self {
        Self {
            grid_cols: c.grid_cols,
            grid_rows: c.grid_rows,
            padding_px: c.padding_px,
            area_width_px: c.area_width_px,
            area_height_px: c.area_height_px,
            randomize_order: c.randomize_order,
            hold_ms: c.hold_ms,
            max_passes: c.max_passes,
            last_k: c.last_k,
            min_score: c.min_score,
            floor_px: c.floor_px,
            offset_px: c.offset_px,
            gamma: c.gamma,
            max_threshold_px: c.max_threshold_px,
        }
    }
}

impl From<&gazelab_config::JitterCfg> for JitterCfg {
    fn from(c: &gazelab_config::JitterCfg) -> Self {
        Self {
            min_s: c.min_s,
            max_s: c.max_s,
            intro_ms: c.intro_ms,
        }
    }
}

impl From<&gazelab_config::ResponseCfg> for ResponseCfg {
    fn from(c: &gazelab_config::ResponseCfg) -> Self {
        Self {
            scale_min: c.scale_min,
            scale_max: c.scale_max,
            default: c.default,
            ask_confidence: c.ask_confidence,
        }
    }
}

impl From<&gazelab_config::StimulusCfg> for StimulusCfg {
    fn from(c: &gazelab_config::StimulusCfg) -> Self {
        Self {
            display_ms: c.display_ms,
        }
    }
}

/// The fixation anchor defaults to the centre of the calibration area.
impl From<&gazelab_config::Config> for RunCfg {
    fn from(c: &gazelab_config::Config) -> Self {
        let calibration = CalibrationCfg::from(&c.calibration);
        let center = calibration.center();
        let anchor = Point::new(
            c.fixation.anchor_x.unwrap_or(center.x),
            c.fixation.anchor_y.unwrap_or(center.y),
        );
        Self {
            experiment: (&c.experiment).into(),
            calibration,
            fixation: FixationCfg {
                anchor,
                required_run_length: c.fixation.required_run_length,
                sample_rate_hz: c.fixation.sample_rate_hz,
            },
            jitter: (&c.jitter).into(),
            response: (&c.response).into(),
            stimulus: (&c.stimulus).into(),
            timeouts: Timeouts::default(),
        }
    }
}
