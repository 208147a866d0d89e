use std::fs::File;
use std::io::Write;

use gazelab_config::{TraceRow, load_gaze_trace_csv};
use rstest::rstest;
use tempfile::tempdir;

fn write_csv(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("trace.csv");
    let mut f = File::create(&path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    (dir, path)
}

#[rstest]
fn loads_well_formed_trace() {
    let (_dir, path) =
        write_csv("timestamp_ms,x,y\n0,640.0,360.0\n33,642.5,358.0\n66, 700 , 300\n");
    let rows = load_gaze_trace_csv(&path).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(
        rows[2],
        TraceRow {
            timestamp_ms: 66,
            x: 700.0,
            y: 300.0
        }
    );
}

#[rstest]
#[case("ts,x,y\n0,1,2\n", "headers 'timestamp_ms,x,y'")]
#[case("timestamp_ms,x,y\n", "at least one row")]
#[case("timestamp_ms,x,y\n0,1,2\nabc,1,2\n", "invalid CSV row 3")]
#[case("timestamp_ms,x,y\n10,1,2\n5,1,2\n", "non-decreasing")]
fn rejects_malformed_trace(#[case] contents: &str, #[case] needle: &str) {
    let (_dir, path) = write_csv(contents);
    let err = load_gaze_trace_csv(&path).expect_err("should reject");
    assert!(
        format!("{err}").contains(needle),
        "expected '{needle}' in '{err}'"
    );
}

#[rstest]
fn missing_file_reports_path() {
    let dir = tempdir().unwrap();
    let err = load_gaze_trace_csv(&dir.path().join("nope.csv")).expect_err("missing");
    assert!(format!("{err}").contains("nope.csv"));
}
