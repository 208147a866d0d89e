use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Minimal valid config; instant mode makes timings irrelevant but keep them short.
fn write_valid_config(dir: &tempfile::TempDir, extra: &str) -> PathBuf {
    let toml = format!(
        r#"
[experiment]
participant_id = "cli"
conditions = ["and", "or", "none"]
seed = 3

[calibration]
hold_ms = 5
max_passes = 3

[jitter]
min_s = 0
max_s = 1
intro_ms = 5

[stimulus]
display_ms = 1000
{extra}
"#
    );
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn gazelab(cfg: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("gazelab").unwrap();
    cmd.arg("--config").arg(cfg).arg("--log-level").arg("warn");
    cmd
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["check-config"], 0, "config ok", "stdout")]
#[case(&["calibrate", "--passes", "2"], 0, "calibration finished", "stdout")]
#[case(&["calibrate", "--passes", "0"], 1, "passes must be >= 1", "stderr")]
#[case(&["bogus"], 2, "unrecognized subcommand", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir, "");

    let mut cmd = gazelab(&cfg);
    for a in args {
        cmd.arg(a);
    }
    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => assert.stdout(predicate::str::contains(needle)),
        _ => assert.stderr(predicate::str::contains(needle)),
    };
}

#[test]
fn run_prints_json_summary_and_saves_export() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir, "");
    let out = dir.path().join("out");

    let output = gazelab(&cfg)
        .args(["--json", "run", "--participant", "p42", "--out"])
        .arg(&out)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["participant_id"], "p42");
    assert_eq!(summary["trials"], 3);
    assert_eq!(summary["max_active_steps"], 1);

    let saved = out.join("causality-experiment-data.json");
    let export: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(saved).unwrap()).unwrap();
    assert_eq!(export["participantID"], "p42");
    assert_eq!(export["trials"].as_array().unwrap().len(), 3);
}

#[test]
fn glance_away_under_fixation_replays_the_condition() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir, "");

    let output = gazelab(&cfg)
        .args(["--json", "run", "--fixation", "--glance-away", "or", "--out"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["trials"], 3);
    assert_eq!(summary["fixation_breaks"], 1);
    let steps: Vec<&str> = summary["steps"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|s| s.as_str())
        .collect();
    assert_eq!(steps.iter().filter(|s| **s == "error").count(), 1);
    assert_eq!(steps.iter().filter(|s| **s == "clips").count(), 4);
}

#[test]
fn conditions_flag_overrides_config() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir, "");

    gazelab(&cfg)
        .args(["--json", "run", "--conditions", "and,none", "--out"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"trials\":2"));
}

#[test]
fn invalid_config_exits_with_generic_code() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("bad.toml");
    fs::write(&cfg, "[calibration]\nmax_passes = 0\n").unwrap();

    gazelab(&cfg)
        .arg("check-config")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("max_passes"));
}

#[test]
fn missing_config_file_is_explained() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("nope.toml");

    gazelab(&cfg)
        .arg("check-config")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("could not be read"));
}

#[test]
fn unwritable_output_exits_with_persistence_code() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir, "");
    // a regular file where the output directory should be
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "x").unwrap();

    gazelab(&cfg)
        .args(["--json", "run", "--out"])
        .arg(&blocker)
        .assert()
        .code(4)
        .stderr(predicate::str::contains("\"reason\":\"Persistence\""));
}

#[test]
fn unknown_collision_scene_fails_the_run() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir, "");
    fs::write(
        &cfg,
        fs::read_to_string(&cfg)
            .unwrap()
            .replace("seed = 3", "seed = 3\nstimulus = \"collisions\""),
    )
    .unwrap();

    gazelab(&cfg)
        .args(["run", "--conditions", "3,7", "--out"])
        .arg(dir.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown collision scene '7'"));
}

#[test]
fn gaze_trace_with_wrong_headers_is_rejected() {
    let dir = tempdir().unwrap();
    let trace = dir.path().join("trace.csv");
    fs::write(&trace, "t,x,y\n0,1,2\n").unwrap();
    let extra = format!("\n[sensor]\ntrace_csv = {:?}\n", trace.display().to_string());
    let cfg = write_valid_config(&dir, &extra);

    gazelab(&cfg)
        .args(["run", "--out"])
        .arg(dir.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("timestamp_ms,x,y"));
}
