use std::time::Duration;

use gazelab_core::config::ResponseCfg;
use gazelab_core::{
    Condition, EventBus, InlineScheduler, RunCfg, Sampler, StepSequencer, ThreadScheduler,
};
use gazelab_sim::{
    AutoParticipant, ClipPlayer, CollisionDemo, ConsoleRenderer, InlineGaze, JsonFilePersistence,
    Pace, SimulatedEye, SimulatedGaze,
};
use gazelab_traits::{MonotonicClock, Point, TestClock};

fn cfg(conditions: &[&str]) -> RunCfg {
    let mut cfg = RunCfg::default();
    cfg.experiment.participant_id = "sim".into();
    cfg.experiment.conditions = conditions.iter().map(|c| Condition::from(*c)).collect();
    cfg.experiment.seed = Some(3);
    cfg.timeouts.idle_ms = Some(5_000);
    cfg
}

#[test]
fn instant_session_with_a_glance_records_every_condition() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut run_cfg = cfg(&["and", "or", "none"]);
    run_cfg.experiment.fixation_required = true;

    let bus = EventBus::new();
    let eye = SimulatedEye::new(run_cfg.fixation.anchor, Point::new(4.0, -3.0), 2.0);
    let gaze = InlineGaze::new(SimulatedGaze::new(eye.clone(), 30, TestClock::new(), 11));
    let participant = AutoParticipant::new(bus.sender(), eye, ResponseCfg::default(), 11)
        .glance_away_on([Condition::from("or")], Point::new(0.0, 0.0), 8);
    let player = ClipPlayer::new(
        "clips",
        Pace::Instant {
            feed: Some(gaze.clone()),
            rate_hz: 30,
        },
    );

    let mut seq = StepSequencer::builder()
        .with_config(run_cfg)
        .with_scheduler(InlineScheduler::new(bus.sender()))
        .with_renderer(ConsoleRenderer::new(std::io::sink()).with_participant(participant))
        .with_stimulus(player)
        .with_persistence(JsonFilePersistence::new(dir.path()))
        .with_sensor(gaze)
        .with_bus(bus)
        .try_build()
        .expect("build");

    let summary = seq.run().expect("run");

    assert_eq!(summary.trials, 3);
    assert_eq!(summary.fixation_breaks, 1);
    assert_eq!(summary.calibration_passes, 1);
    // a 5 px estimation error calibrates close to the floor
    assert!(summary.tolerance_px < 70.0, "{}", summary.tolerance_px);

    let path = summary.exported.expect("exported");
    assert_eq!(path, dir.path().join("causality-experiment-data.json"));
    let v: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).expect("read")).expect("json");
    assert_eq!(v["participantID"], "sim");
    let trials = v["trials"].as_array().expect("trials");
    assert_eq!(trials.len(), 3);
    // 4000 ms at 30 Hz on every completed presentation
    for t in trials {
        assert_eq!(t["eyetracking_data"].as_array().expect("samples").len(), 120);
    }
}

#[test]
fn collision_scenes_play_by_number() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut run_cfg = cfg(&["3", "16"]);
    run_cfg.experiment.stimulus = gazelab_core::Step::Collisions;
    let bus = EventBus::new();
    let eye = SimulatedEye::new(Point::default(), Point::default(), 0.0);
    let participant = AutoParticipant::new(bus.sender(), eye, ResponseCfg::default(), 1);
    let mut seq = StepSequencer::builder()
        .with_config(run_cfg)
        .with_scheduler(InlineScheduler::new(bus.sender()))
        .with_renderer(ConsoleRenderer::new(std::io::sink()).with_participant(participant))
        .with_stimulus(CollisionDemo::new(Pace::Instant {
            feed: None,
            rate_hz: 30,
        }))
        .with_persistence(JsonFilePersistence::new(dir.path()))
        .with_bus(bus)
        .try_build()
        .expect("build");

    assert_eq!(seq.run().expect("run").trials, 2);
}

#[test]
fn unknown_scene_fails_the_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut run_cfg = cfg(&["7"]);
    run_cfg.experiment.stimulus = gazelab_core::Step::Collisions;
    let bus = EventBus::new();
    let eye = SimulatedEye::new(Point::default(), Point::default(), 0.0);
    let participant = AutoParticipant::new(bus.sender(), eye, ResponseCfg::default(), 1);
    let mut seq = StepSequencer::builder()
        .with_config(run_cfg)
        .with_scheduler(InlineScheduler::new(bus.sender()))
        .with_renderer(ConsoleRenderer::new(std::io::sink()).with_participant(participant))
        .with_stimulus(CollisionDemo::new(Pace::Instant {
            feed: None,
            rate_hz: 30,
        }))
        .with_persistence(JsonFilePersistence::new(dir.path()))
        .with_bus(bus)
        .try_build()
        .expect("build");

    let err = seq.run().expect_err("scene 7 does not exist");
    assert!(err.to_string().contains("unknown collision scene '7'"), "{err}");
}

#[test]
fn realtime_session_with_sampler_thread_completes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut run_cfg = cfg(&["and", "or"]);
    run_cfg.calibration.hold_ms = 5;
    run_cfg.jitter.intro_ms = 5;
    run_cfg.jitter.min_s = 0;
    run_cfg.jitter.max_s = 0;
    run_cfg.stimulus.display_ms = 60;

    let bus = EventBus::new();
    let eye = SimulatedEye::new(run_cfg.fixation.anchor, Point::default(), 1.0);
    let sampler = Sampler::spawn(
        SimulatedGaze::new(eye.clone(), 30, MonotonicClock::new(), 2),
        bus.sender(),
        Duration::from_millis(50),
        Duration::from_millis(250),
        MonotonicClock::new(),
    );
    let participant = AutoParticipant::new(bus.sender(), eye, ResponseCfg::default(), 2);
    let mut seq = StepSequencer::builder()
        .with_config(run_cfg)
        .with_scheduler(ThreadScheduler::new(bus.sender(), MonotonicClock::new()))
        .with_renderer(ConsoleRenderer::new(std::io::sink()).with_participant(participant))
        .with_stimulus(ClipPlayer::new("clips", Pace::Realtime))
        .with_persistence(JsonFilePersistence::new(dir.path()))
        .with_sensor(sampler)
        .with_bus(bus)
        .try_build()
        .expect("build");

    let summary = seq.run().expect("run");
    assert_eq!(summary.trials, 2);
    assert_eq!(summary.max_active_steps, 1);
    assert!(dir.path().join("causality-experiment-data.json").exists());
}
