#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and gaze-trace parsing for the experiment runner.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//!   Every section has defaults, so an empty file is a valid experiment.
//! - The gaze-trace CSV loader enforces headers and timestamp ordering so a
//!   recorded session can be replayed through the simulated sensor.
use serde::Deserialize;
use serde::de::Deserializer;

/// Which stimulus step each condition group presents.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StimulusKind {
    #[default]
    Clips,
    Collisions,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Experiment {
    pub participant_id: String,
    /// Accepts either an array of strings or of integers (scene numbers).
    #[serde(deserialize_with = "de_conditions")]
    pub conditions: Vec<String>,
    /// Shuffle the selected conditions once during setup.
    pub randomize: bool,
    /// Require central fixation during stimulus presentation.
    pub fixation_required: bool,
    pub stimulus: StimulusKind,
    /// Seed for shuffling, calibration order and jitter; random when absent.
    pub seed: Option<u64>,
    pub output_file: String,
}

impl Default for Experiment {
    fn default() -> Self {
        Self {
            participant_id: "test".to_string(),
            conditions: vec!["and".into(), "or".into(), "none".into()],
            randomize: true,
            fixation_required: false,
            stimulus: StimulusKind::Clips,
            seed: None,
            output_file: "causality-experiment-data.json".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CalibrationCfg {
    pub grid_cols: u32,
    pub grid_rows: u32,
    pub padding_px: f64,
    pub area_width_px: f64,
    pub area_height_px: f64,
    pub randomize_order: bool,
    /// How long the participant fixates each target before it is sampled.
    pub hold_ms: u64,
    pub max_passes: u32,
    /// Number of trailing samples used for the error estimate.
    pub last_k: usize,
    /// A pass is accepted when its score reaches this value (0..=100).
    pub min_score: u8,
    pub floor_px: f64,
    pub offset_px: f64,
    pub gamma: f64,
    /// Error at which the score bottoms out; also the tolerance ceiling.
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FixationCfg {
    /// Anchor (fixation cross) position; defaults to the calibration area center.
    pub anchor_x: Option<f64>,
    pub anchor_y: Option<f64>,
    /// Consecutive off-tolerance samples needed to break fixation.
    pub required_run_length: u32,
    /// Samples closer together than 1/rate are ignored.
    pub sample_rate_hz: u32,
}

impl Default for FixationCfg {
    fn default() -> Self {
        Self {
            anchor_x: None,
            anchor_y: None,
            required_run_length: 5,
            sample_rate_hz: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct JitterCfg {
    /// Inclusive bounds, whole seconds.
    pub min_s: u64,
    pub max_s: u64,
    /// How long the "get ready" intro stays visible.
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

#[derive(Debug, Deserialize)]
#[serde(default)]
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StimulusCfg {
    /// Presentation length for simulated clips and collision scenes.
    pub display_ms: u64,
    /// Directory clips are resolved against.
    pub clip_dir: String,
}

impl Default for StimulusCfg {
    fn default() -> Self {
        Self {
            display_ms: 4000,
            clip_dir: "clips".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SensorCfg {
    /// Max time the sampler blocks waiting for the next estimate.
    pub read_timeout_ms: u64,
    /// Max time a calibration probe waits for a current estimate before failing open.
    pub estimate_timeout_ms: u64,
    /// Replay a recorded trace (timestamp_ms,x,y) instead of the synthetic eye.
    pub trace_csv: Option<String>,
}

impl Default for SensorCfg {
    fn default() -> Self {
        Self {
            read_timeout_ms: 100,
            estimate_timeout_ms: 250,
            trace_csv: None,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub experiment: Experiment,
    pub calibration: CalibrationCfg,
    pub fixation: FixationCfg,
    pub jitter: JitterCfg,
    pub response: ResponseCfg,
    pub stimulus: StimulusCfg,
    pub sensor: SensorCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ConditionToml {
    Name(String),
    Scene(i64),
}

fn de_conditions<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let items: Vec<ConditionToml> = Vec::deserialize(deserializer)?;
    Ok(items
        .into_iter()
        .map(|c| match c {
            ConditionToml::Name(s) => s,
            ConditionToml::Scene(n) => n.to_string(),
        })
        .collect())
}

/// Gaze-trace CSV schema.
///
/// Expected headers:
/// timestamp_ms,x,y
///
/// Example:
/// timestamp_ms,x,y
/// 0,640.0,360.0
/// 33,642.5,358.1
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct TraceRow {
    pub timestamp_ms: u64,
    pub x: f64,
    pub y: f64,
}

/// Validate parsed rows: at least one row, finite coordinates, non-decreasing time.
pub fn check_trace(rows: &[TraceRow]) -> eyre::Result<()> {
    if rows.is_empty() {
        eyre::bail!("gaze trace must contain at least one row");
    }
    for (i, r) in rows.iter().enumerate() {
        if !(r.x.is_finite() && r.y.is_finite()) {
            eyre::bail!("gaze trace row {} has non-finite coordinates", i + 2);
        }
        if i > 0 && r.timestamp_ms < rows[i - 1].timestamp_ms {
            eyre::bail!(
                "gaze trace timestamps must be non-decreasing (row {} goes back in time)",
                i + 2
            );
        }
    }
    Ok(())
}

pub fn load_gaze_trace_csv(path: &std::path::Path) -> eyre::Result<Vec<TraceRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open gaze trace CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["timestamp_ms", "x", "y"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "gaze trace CSV must have headers 'timestamp_ms,x,y', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<TraceRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }

    check_trace(&rows)?;
    Ok(rows)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Experiment
        if self.experiment.participant_id.trim().is_empty() {
            eyre::bail!("experiment.participant_id must not be empty");
        }
        if self.experiment.conditions.iter().any(|c| c.trim().is_empty()) {
            eyre::bail!("experiment.conditions must not contain empty names");
        }
        if self.experiment.output_file.trim().is_empty() {
            eyre::bail!("experiment.output_file must not be empty");
        }

        // Calibration
        let c = &self.calibration;
        if c.grid_cols == 0 || c.grid_rows == 0 {
            eyre::bail!("calibration.grid_cols and calibration.grid_rows must be >= 1");
        }
        if !(c.area_width_px > 0.0 && c.area_height_px > 0.0) {
            eyre::bail!("calibration.area_width_px and area_height_px must be > 0");
        }
        if c.padding_px < 0.0
            || 2.0 * c.padding_px >= c.area_width_px
            || 2.0 * c.padding_px >= c.area_height_px
        {
            eyre::bail!("calibration.padding_px must be >= 0 and leave room inside the area");
        }
        if c.hold_ms > 60_000 {
            eyre::bail!("calibration.hold_ms is unreasonably large (>60s)");
        }
        if c.max_passes == 0 {
            eyre::bail!("calibration.max_passes must be >= 1");
        }
        if c.last_k == 0 {
            eyre::bail!("calibration.last_k must be >= 1");
        }
        if c.min_score > 100 {
            eyre::bail!("calibration.min_score must be in [0, 100]");
        }
        if !(c.floor_px.is_finite() && c.floor_px > 0.0) {
            eyre::bail!("calibration.floor_px must be > 0");
        }
        if !(c.max_threshold_px.is_finite() && c.max_threshold_px >= c.floor_px) {
            eyre::bail!("calibration.max_threshold_px must be >= calibration.floor_px");
        }
        if !(c.offset_px.is_finite() && c.offset_px >= 0.0) {
            eyre::bail!("calibration.offset_px must be >= 0");
        }
        if !(c.gamma.is_finite() && c.gamma > 0.0) {
            eyre::bail!("calibration.gamma must be > 0");
        }

        // Fixation
        if self.fixation.required_run_length == 0 {
            eyre::bail!("fixation.required_run_length must be >= 1");
        }
        if self.fixation.sample_rate_hz == 0 {
            eyre::bail!("fixation.sample_rate_hz must be > 0");
        }
        for (name, v) in [
            ("anchor_x", self.fixation.anchor_x),
            ("anchor_y", self.fixation.anchor_y),
        ] {
            if let Some(v) = v
                && !v.is_finite()
            {
                eyre::bail!("fixation.{name} must be finite");
            }
        }

        // Jitter
        if self.jitter.min_s > self.jitter.max_s {
            eyre::bail!("jitter.min_s must be <= jitter.max_s");
        }
        if self.jitter.max_s > 60 {
            eyre::bail!("jitter.max_s is unreasonably large (>60s)");
        }

        // Response
        let r = &self.response;
        if r.scale_min >= r.scale_max {
            eyre::bail!("response.scale_min must be < response.scale_max");
        }
        if r.scale_max > 100 {
            eyre::bail!("response.scale_max must be <= 100");
        }
        if !(r.scale_min..=r.scale_max).contains(&r.default) {
            eyre::bail!("response.default must lie within [scale_min, scale_max]");
        }

        // Stimulus
        if self.stimulus.display_ms == 0 {
            eyre::bail!("stimulus.display_ms must be >= 1");
        }

        // Sensor
        if self.sensor.read_timeout_ms == 0 {
            eyre::bail!("sensor.read_timeout_ms must be >= 1");
        }
        if self.sensor.estimate_timeout_ms == 0 {
            eyre::bail!("sensor.estimate_timeout_ms must be >= 1");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let cfg = load_toml("").expect("parse");
        cfg.validate().expect("defaults validate");
        assert_eq!(cfg.calibration.grid_cols, 3);
        assert_eq!(cfg.fixation.sample_rate_hz, 30);
        assert_eq!(cfg.experiment.stimulus, StimulusKind::Clips);
    }

    #[test]
    fn scene_numbers_become_condition_names() {
        let cfg = load_toml(
            r#"
[experiment]
conditions = [3, 4, "and"]
stimulus = "collisions"
"#,
        )
        .expect("parse");
        assert_eq!(cfg.experiment.conditions, vec!["3", "4", "and"]);
        assert_eq!(cfg.experiment.stimulus, StimulusKind::Collisions);
    }

    #[test]
    fn trace_rejects_time_going_backwards() {
        let rows = [
            TraceRow {
                timestamp_ms: 10,
                x: 0.0,
                y: 0.0,
            },
            TraceRow {
                timestamp_ms: 5,
                x: 0.0,
                y: 0.0,
            },
        ];
        let err = check_trace(&rows).expect_err("must reject");
        assert!(err.to_string().contains("non-decreasing"));
    }
}
