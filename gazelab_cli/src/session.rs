//! Session wiring: config mapping, simulated collaborators and run execution.

use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::WrapErr;
use gazelab_config::{Config, TraceRow};
use gazelab_core::{
    Condition, Entry, EventBus, EventSender, ExecutionStack, InlineScheduler, RunCfg, RunSummary,
    Sampler, SequencerBuilder, Step, StepSequencer, ThreadScheduler,
};
use gazelab_sim::{
    AutoParticipant, ClipPlayer, CollisionDemo, ConsoleRenderer, InlineGaze, JsonFilePersistence,
    Pace, SimulatedEye, SimulatedGaze, TraceGaze,
};
use gazelab_traits::{GazeSource, MonotonicClock, Point, TestClock};

/// Seed for the simulated eye and participant when none is given.
const SIM_SEED: u64 = 7;
/// Systematic offset and jitter of the simulated eye, in px.
const EYE_BIAS: Point = Point::new(3.0, -2.0);
const EYE_NOISE_PX: f64 = 2.0;
/// Where the participant looks when told to glance away.
const GLANCE_TARGET: Point = Point::new(0.0, 0.0);

/// Flags from `gazelab run` that shape a session.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub participant: Option<String>,
    pub seed: Option<u64>,
    pub out: PathBuf,
    pub fixation: bool,
    pub conditions: Option<Vec<String>>,
    pub realtime: bool,
    pub glance_away: Vec<String>,
}

pub fn load_config(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read config {}", path.display()))?;
    let cfg = gazelab_config::load_toml(&text)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Resolve the runtime config and apply command-line overrides.
pub fn run_cfg(cfg: &Config, opts: &RunOptions) -> RunCfg {
    let mut run: RunCfg = cfg.into();
    if let Some(p) = &opts.participant {
        run.experiment.participant_id = p.clone();
    }
    if opts.seed.is_some() {
        run.experiment.seed = opts.seed;
    }
    if opts.fixation {
        run.experiment.fixation_required = true;
    }
    if let Some(list) = &opts.conditions {
        run.experiment.conditions = list
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(Condition::from)
            .collect();
    }
    run.timeouts.idle_ms = Some(idle_budget_ms(&run));
    run
}

/// Longest a healthy session can go without an event, plus slack.
fn idle_budget_ms(run: &RunCfg) -> u64 {
    let jitter = run.jitter.max_s.saturating_mul(1_000) + run.jitter.intro_ms;
    let longest = jitter
        .max(run.stimulus.display_ms)
        .max(run.calibration.hold_ms);
    longest + 10_000
}

fn trace_rows(cfg: &Config) -> eyre::Result<Option<Vec<TraceRow>>> {
    cfg.sensor
        .trace_csv
        .as_deref()
        .map(|p| gazelab_config::load_gaze_trace_csv(Path::new(p)))
        .transpose()
}

/// Stop the run from Ctrl-C. Only one handler may be installed per process.
fn install_ctrlc(tx: EventSender) {
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = tx.send(gazelab_core::Event::Shutdown);
    }) {
        tracing::warn!(error = %e, "could not install Ctrl-C handler");
    }
}

/// Everything the simulated collaborators need beyond the runtime config.
struct Wiring {
    clip_dir: PathBuf,
    out: PathBuf,
    realtime: bool,
    trace: Option<Vec<TraceRow>>,
    read_timeout: Duration,
    estimate_timeout: Duration,
    glance_away: Vec<Condition>,
    json: bool,
}

impl Wiring {
    fn new(cfg: &Config, out: &Path, realtime: bool, json: bool) -> eyre::Result<Self> {
        Ok(Self {
            clip_dir: PathBuf::from(&cfg.stimulus.clip_dir),
            out: out.to_path_buf(),
            realtime,
            trace: trace_rows(cfg)?,
            read_timeout: Duration::from_millis(cfg.sensor.read_timeout_ms),
            estimate_timeout: Duration::from_millis(cfg.sensor.estimate_timeout_ms),
            glance_away: Vec::new(),
            json,
        })
    }
}

fn build(run: RunCfg, template: ExecutionStack, w: Wiring) -> eyre::Result<StepSequencer> {
    let seed = run.experiment.seed.unwrap_or(SIM_SEED);
    let bus = EventBus::new();
    install_ctrlc(bus.sender());

    let eye = SimulatedEye::new(run.fixation.anchor, EYE_BIAS, EYE_NOISE_PX);
    let mut participant =
        AutoParticipant::new(bus.sender(), eye.clone(), run.response.clone(), seed);
    if !w.glance_away.is_empty() {
        // long enough to trip the monitor once
        let samples = run.fixation.required_run_length + 3;
        participant = participant.glance_away_on(w.glance_away.clone(), GLANCE_TARGET, samples);
    }
    // keep stdout for the JSON summary
    let renderer = if w.json {
        ConsoleRenderer::new(std::io::stderr())
    } else {
        ConsoleRenderer::new(std::io::stdout())
    };

    let rate_hz = run.fixation.sample_rate_hz;
    let stimulus = run.experiment.stimulus;
    let builder = StepSequencer::builder()
        .with_renderer(renderer.with_participant(participant))
        .with_persistence(JsonFilePersistence::new(&w.out))
        .with_template(template)
        .with_config(run);

    let builder = match (w.realtime, w.trace.clone()) {
        (false, Some(rows)) => attach_instant(
            builder,
            TraceGaze::new(rows, TestClock::new()),
            &bus,
            &w,
            stimulus,
            rate_hz,
        ),
        (false, None) => attach_instant(
            builder,
            SimulatedGaze::new(eye, rate_hz, TestClock::new(), seed),
            &bus,
            &w,
            stimulus,
            rate_hz,
        ),
        (true, Some(rows)) => attach_realtime(
            builder,
            TraceGaze::new(rows, MonotonicClock::new()),
            &bus,
            &w,
            stimulus,
        ),
        (true, None) => attach_realtime(
            builder,
            SimulatedGaze::new(eye, rate_hz, MonotonicClock::new(), seed),
            &bus,
            &w,
            stimulus,
        ),
    };

    builder.with_bus(bus).try_build()
}

fn with_player(
    builder: SequencerBuilder,
    stimulus: Step,
    clip_dir: &Path,
    pace: Pace,
) -> SequencerBuilder {
    match stimulus {
        Step::Collisions => builder.with_stimulus(CollisionDemo::new(pace)),
        _ => builder.with_stimulus(ClipPlayer::new(clip_dir, pace)),
    }
}

/// Timers fire at once and playback pulls its samples from the shared source.
fn attach_instant<G>(
    builder: SequencerBuilder,
    source: G,
    bus: &EventBus,
    w: &Wiring,
    stimulus: Step,
    rate_hz: u32,
) -> SequencerBuilder
where
    G: GazeSource + Send + 'static,
{
    let gaze = InlineGaze::new(source);
    let pace = Pace::Instant {
        feed: Some(gaze.clone()),
        rate_hz,
    };
    with_player(builder, stimulus, &w.clip_dir, pace)
        .with_scheduler(InlineScheduler::new(bus.sender()))
        .with_sensor(gaze)
}

/// Wall-clock timers and a background sampler thread.
fn attach_realtime<G>(
    builder: SequencerBuilder,
    source: G,
    bus: &EventBus,
    w: &Wiring,
    stimulus: Step,
) -> SequencerBuilder
where
    G: GazeSource + Send + 'static,
{
    let sampler = Sampler::spawn(
        source,
        bus.sender(),
        w.read_timeout,
        w.estimate_timeout,
        MonotonicClock::new(),
    );
    with_player(builder, stimulus, &w.clip_dir, Pace::Realtime)
        .with_scheduler(ThreadScheduler::new(bus.sender(), MonotonicClock::new()))
        .with_sensor(sampler)
}

/// `gazelab run`: one full session.
pub fn run_session(cfg: &Config, opts: &RunOptions, json: bool) -> eyre::Result<RunSummary> {
    let run = run_cfg(cfg, opts);
    tracing::info!(
        participant = %run.experiment.participant_id,
        conditions = run.experiment.conditions.len(),
        fixation = run.experiment.fixation_required,
        realtime = opts.realtime,
        "starting session"
    );
    let mut wiring = Wiring::new(cfg, &opts.out, opts.realtime, json)?;
    wiring.glance_away = opts.glance_away.iter().map(|c| Condition::from(c.as_str())).collect();
    let mut seq = build(run, ExecutionStack::standard(), wiring)?;
    seq.run()
}

/// `gazelab calibrate`: calibration passes only, nothing exported.
pub fn run_calibration(cfg: &Config, passes: Option<u32>, json: bool) -> eyre::Result<RunSummary> {
    let mut run = run_cfg(cfg, &RunOptions::default());
    if let Some(n) = passes {
        if n == 0 {
            eyre::bail!("--passes must be >= 1");
        }
        run.calibration.max_passes = n;
    }
    let template = ExecutionStack::from_template([Entry::Step(Step::Calibration)]);
    let wiring = Wiring::new(cfg, Path::new("."), false, json)?;
    let mut seq = build(run, template, wiring)?;
    seq.run()
}

/// Human summary for non-JSON output.
pub fn describe(summary: &RunSummary) -> String {
    let mut out = format!(
        "participant {}: {} trials, {} fixation breaks, {} calibration passes, tolerance {:.1} px",
        summary.participant_id,
        summary.trials,
        summary.fixation_breaks,
        summary.calibration_passes,
        summary.tolerance_px
    );
    if let Some(p) = &summary.exported {
        out.push_str(&format!("\nsaved {}", p.display()));
    }
    out
}
