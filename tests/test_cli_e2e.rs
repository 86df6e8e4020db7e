mod common;

use common::{bin, run_command};
use logpipe::error::ExitCode;

// ============================================================================
// parent command
// ============================================================================

#[test]
fn parent_reemits_child_lines_on_stderr() {
    let output = run_command(&[
        "--quiet", "parent", "--name", "demo", "--", bin(), "--quiet", "child", "-n", "2", "-m",
        "ping",
    ]);
    assert!(
        output.status.success(),
        "parent should exit 0: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    let lines: Vec<&str> = stderr.lines().collect();
    assert_eq!(lines.len(), 2, "stderr: {stderr}");
    for (seq, line) in lines.iter().enumerate() {
        assert!(line.starts_with("INFO ["), "line: {line}");
        assert!(line.contains("[demo/child] []"), "line: {line}");
        assert!(line.contains("ping"), "line: {line}");
        assert!(line.ends_with(&format!("seq = {seq} ")), "line: {line}");
    }
    assert!(output.stdout.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn parent_without_child_levels_releases_waiting_child() {
    let output = tokio::time::timeout(
        common::DEFAULT_TIMEOUT,
        tokio::process::Command::new(bin())
            .args([
                "--quiet",
                "parent",
                "--",
                bin(),
                "--quiet",
                "child",
                "-n",
                "1",
                "--await-control",
            ])
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true)
            .output(),
    )
    .await
    .expect("parent hung waiting for child")
    .expect("failed to run logpipe");

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.lines().count(), 1, "stderr: {stderr}");
}

#[test]
fn parent_pushes_child_levels_and_emits_json() {
    let output = run_command(&[
        "--quiet",
        "parent",
        "--format",
        "json",
        "--child-levels",
        "*:DEBUG",
        "--",
        bin(),
        "--quiet",
        "child",
        "-n",
        "1",
        "--await-control",
    ]);
    assert!(output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    let values: Vec<serde_json::Value> = stderr
        .lines()
        .map(|line| serde_json::from_str(line).expect("JSON line"))
        .collect();
    assert_eq!(values.len(), 2, "stderr: {stderr}");
    assert_eq!(values[0]["LogLevel"], 2);
    assert_eq!(values[1]["LogLevel"], 1);
    // Program name is the default prefix.
    assert_eq!(values[0]["LoggerName"], "logpipe/child");
}

#[test]
fn parent_propagates_child_exit_code() {
    let output = run_command(&[
        "--quiet", "parent", "--", bin(), "--quiet", "child", "--level", "*:LOUD",
    ]);
    assert_eq!(output.status.code(), Some(ExitCode::CONFIG_ERROR));
}

#[test]
fn parent_rejects_invalid_child_levels_with_suggestion() {
    let output = run_command(&[
        "parent",
        "--child-levels",
        "*:DEGUB",
        "--",
        bin(),
        "child",
    ]);
    assert_eq!(output.status.code(), Some(ExitCode::CONFIG_ERROR));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("did you mean 'DEBUG'?"), "stderr: {stderr}");
}

#[test]
fn parent_reports_missing_program() {
    let output = run_command(&["parent", "--", "/nonexistent/logpipe-test-binary"]);
    assert_eq!(output.status.code(), Some(ExitCode::IO_ERROR));
}

// ============================================================================
// child command
// ============================================================================

#[test]
fn child_writes_frames_to_stdout() {
    let output = run_command(&["--quiet", "child", "-n", "2"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let frames: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("frame is one JSON line"))
        .collect();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[1]["Args"], serde_json::json!(["seq", "1"]));
}

#[test]
fn usage_error_exits_nonzero() {
    let output = run_command(&["child", "--count", "many"]);
    assert!(!output.status.success());
}
