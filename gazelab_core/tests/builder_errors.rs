use gazelab_core::mocks::{MemoryPersistence, RecordingRenderer, ScriptedStimulus};
use gazelab_core::{BuildError, EventBus, RunCfg, Step, StepSequencer};
use rstest::rstest;

fn build_err(
    f: impl FnOnce(gazelab_core::SequencerBuilder) -> gazelab_core::SequencerBuilder,
) -> BuildError {
    let bus = EventBus::new();
    let builder = StepSequencer::builder().with_bus(bus);
    match f(builder).try_build() {
        Err(e) => e.downcast::<BuildError>().expect("typed build error"),
        Ok(_) => panic!("build should fail"),
    }
}

#[test]
fn renderer_stimulus_and_persistence_are_required() {
    let tx = EventBus::new().sender();
    assert!(matches!(build_err(|b| b), BuildError::MissingRenderer));

    let tx2 = tx.clone();
    assert!(matches!(
        build_err(move |b| b.with_renderer(RecordingRenderer::new(tx2))),
        BuildError::MissingStimulus
    ));

    assert!(matches!(
        build_err(move |b| b
            .with_renderer(RecordingRenderer::new(tx))
            .with_stimulus(ScriptedStimulus::new())),
        BuildError::MissingPersistence
    ));
}

#[rstest]
#[case::stimulus_step(
    |c: &mut RunCfg| c.experiment.stimulus = Step::Response,
    "clips or collisions"
)]
#[case::run_length(|c: &mut RunCfg| c.fixation.required_run_length = 0, "required_run_length")]
#[case::passes(|c: &mut RunCfg| c.calibration.max_passes = 0, "max_passes")]
#[case::floor(|c: &mut RunCfg| c.calibration.floor_px = 500.0, "floor_px")]
#[case::nan_floor(|c: &mut RunCfg| c.calibration.floor_px = f64::NAN, "must be finite")]
#[case::infinite_ceiling(
    |c: &mut RunCfg| c.calibration.max_threshold_px = f64::INFINITY,
    "max_threshold_px"
)]
#[case::nan_gamma(|c: &mut RunCfg| c.calibration.gamma = f64::NAN, "gamma")]
#[case::jitter(|c: &mut RunCfg| { c.jitter.min_s = 5; c.jitter.max_s = 1; }, "min_s")]
fn invalid_runtime_config_is_rejected(#[case] tweak: fn(&mut RunCfg), #[case] needle: &str) {
    let mut cfg = RunCfg::default();
    tweak(&mut cfg);
    let tx = EventBus::new().sender();
    let err = build_err(move |b| {
        b.with_config(cfg)
            .with_renderer(RecordingRenderer::new(tx))
            .with_stimulus(ScriptedStimulus::new())
            .with_persistence(MemoryPersistence::new())
    });
    assert!(
        err.to_string().contains(needle),
        "'{err}' should mention '{needle}'"
    );
}
