//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "gazelab", version, about = "Gaze-contingent experiment runner")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/gazelab.toml")]
    pub config: PathBuf,

    /// Log and report as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one session against the simulated participant
    Run {
        /// Participant identifier (overrides experiment.participant_id)
        #[arg(long, value_name = "ID")]
        participant: Option<String>,
        /// Seed for condition order, calibration targets and the simulated eye
        #[arg(long, value_name = "N")]
        seed: Option<u64>,
        /// Directory the run export is written to
        #[arg(long, value_name = "DIR", default_value = ".")]
        out: PathBuf,
        /// Require fixation during stimulus presentation
        #[arg(long, action = ArgAction::SetTrue)]
        fixation: bool,
        /// Comma-separated condition list (overrides experiment.conditions)
        #[arg(long, value_name = "LIST", value_delimiter = ',')]
        conditions: Option<Vec<String>>,
        /// Let timers and playback take wall-clock time, sampling on a background thread
        #[arg(long, action = ArgAction::SetTrue)]
        realtime: bool,
        /// Have the participant look away at the start of these conditions
        #[arg(long = "glance-away", value_name = "LIST", value_delimiter = ',')]
        glance_away: Option<Vec<String>>,
    },
    /// Load and validate the config, then print the effective settings
    CheckConfig,
    /// Run calibration passes only and report score and tolerance
    Calibrate {
        /// Maximum passes (overrides calibration.max_passes)
        #[arg(long, value_name = "N")]
        passes: Option<u32>,
    },
}
