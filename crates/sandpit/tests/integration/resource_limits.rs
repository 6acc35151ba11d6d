use std::time::{Duration, Instant};

use sandpit::process::{self, OUTPUT_LIMIT_MESSAGE, ProcessCommand, TIMED_OUT_MESSAGE};
use sandpit::runner::Runner;
use sandpit::types::{ExecutionRequest, ExecutionStatus};

use super::{shell_config, shell_runner, workspace_count};

#[tokio::test]
async fn test_language_timeout_override() {
    let root = tempfile::tempdir().unwrap();
    let runner = shell_runner(root.path());

    let started = Instant::now();
    let result = runner
        .execute(&ExecutionRequest::new("slow", "echo before; sleep 30; echo after"))
        .await
        .expect("Execution failed");

    // 300ms timeout plus 200ms grace, with room for a loaded machine
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(result.output, "before\n");
    assert_eq!(result.error.as_deref(), Some(TIMED_OUT_MESSAGE));
    assert_eq!(result.exit_code, Some(-1));
    assert_eq!(workspace_count(root.path()), 0);
}

#[tokio::test]
async fn test_timeout_ignoring_sigterm() {
    let root = tempfile::tempdir().unwrap();
    let runner = shell_runner(root.path());

    let code = "trap 'echo ignored' TERM\nwhile :; do sleep 0.1; done";
    let started = Instant::now();
    let result = runner
        .execute(&ExecutionRequest::new("slow", code))
        .await
        .expect("Execution failed");

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(result.error.as_deref(), Some(TIMED_OUT_MESSAGE));
    assert_eq!(workspace_count(root.path()), 0);
}

#[tokio::test]
async fn test_custom_default_timeout() {
    let root = tempfile::tempdir().unwrap();
    let mut config = shell_config(root.path());
    config.default_limits.timeout_ms = Some(250);
    let runner = Runner::new(config);

    let result = runner
        .execute(&ExecutionRequest::new("shell", "sleep 10"))
        .await
        .expect("Execution failed");

    assert_eq!(result.error.as_deref(), Some(TIMED_OUT_MESSAGE));
    assert!(result.execution_time < 5_000);
}

#[tokio::test]
async fn test_output_limit_stdout() {
    let root = tempfile::tempdir().unwrap();
    let runner = shell_runner(root.path());

    let result = runner
        .execute(&ExecutionRequest::new("shell", "yes 'flood'"))
        .await
        .expect("Execution failed");

    assert_eq!(result.error.as_deref(), Some(OUTPUT_LIMIT_MESSAGE));
    assert_eq!(result.output.len(), 65536);
    assert!(result.output.starts_with("flood\nflood\n"));
    assert_eq!(result.exit_code, Some(-1));
    assert_eq!(workspace_count(root.path()), 0);
}

#[tokio::test]
async fn test_output_limit_stderr() {
    let root = tempfile::tempdir().unwrap();
    let runner = shell_runner(root.path());

    let result = runner
        .execute(&ExecutionRequest::new("shell", "yes 'noise' >&2"))
        .await
        .expect("Execution failed");

    assert_eq!(result.error.as_deref(), Some(OUTPUT_LIMIT_MESSAGE));
    assert_eq!(result.stderr.len(), 65536);
}

#[tokio::test]
async fn test_output_at_cap_is_not_exceeded() {
    let root = tempfile::tempdir().unwrap();
    let mut config = shell_config(root.path());
    config.default_limits.output_byte_cap = Some(5);
    let runner = Runner::new(config);

    let result = runner
        .execute(&ExecutionRequest::new("shell", "printf 12345"))
        .await
        .expect("Execution failed");

    assert!(result.is_success());
    assert_eq!(result.output, "12345");
}

#[tokio::test]
async fn test_process_runner_reports_wall_time() {
    let command = ProcessCommand::new("sleep")
        .arg("0.2")
        .timeout(Duration::from_secs(5));

    let result = process::run(command).await.expect("spawn failed");

    assert_eq!(result.status, ExecutionStatus::Ok);
    assert!(result.wall_time >= Duration::from_millis(200));
    assert!(result.wall_time < Duration::from_secs(5));
}

#[tokio::test]
async fn test_process_runner_kills_whole_group() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("survivor");
    let script = format!("(sleep 1; touch {}) & sleep 30", marker.display());

    let command = ProcessCommand::new("sh")
        .arg("-c")
        .arg(script)
        .timeout(Duration::from_millis(200))
        .grace_period(Duration::from_millis(100));
    let result = process::run(command).await.expect("spawn failed");
    assert_eq!(result.status, ExecutionStatus::TimedOut);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(!marker.exists());
}
