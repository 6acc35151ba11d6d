use sandpit::runner::ExecuteError;
use sandpit::types::{ExecutionRequest, ExecutionResult};

use super::{shell_runner, workspace_count};

#[tokio::test]
async fn test_compile_success_then_run() {
    let root = tempfile::tempdir().unwrap();
    let runner = shell_runner(root.path());

    let request =
        ExecutionRequest::new("checked", "read x; echo \"compiled $x\"").with_stdin("ok\n");
    let result = runner.execute(&request).await.expect("Execution failed");

    assert!(result.is_success());
    assert_eq!(result.output, "compiled ok\n");
    assert_eq!(result.exit_code, Some(0));
}

#[tokio::test]
async fn test_compile_error_never_runs() {
    let root = tempfile::tempdir().unwrap();
    let markers = tempfile::tempdir().unwrap();
    let marker = markers.path().join("ran");
    let runner = shell_runner(root.path());

    // Valid first line, broken second line
    let code = format!("touch {}\nfi\n", marker.display());
    let result = runner
        .execute(&ExecutionRequest::new("checked", code))
        .await
        .expect("Compilation call failed");

    assert_eq!(
        result.error.as_deref(),
        Some(ExecutionResult::COMPILATION_FAILED)
    );
    assert!(!result.stderr.is_empty());
    assert!(matches!(result.exit_code, Some(code) if code > 0));
    assert!(!marker.exists());
    assert_eq!(workspace_count(root.path()), 0);
}

#[tokio::test]
async fn test_compile_time_counts_toward_elapsed() {
    let root = tempfile::tempdir().unwrap();
    let runner = shell_runner(root.path());

    let result = runner
        .execute(&ExecutionRequest::new("checked", "exit 0"))
        .await
        .expect("Execution failed");

    assert!(result.is_success());
    assert!(result.execution_time < 5_000);
}

#[tokio::test]
async fn test_compile_step_in_existing_workspace() {
    let root = tempfile::tempdir().unwrap();
    let runner = shell_runner(root.path());
    let language = runner.config().get_language("checked").unwrap();

    let mut workspace = runner.workspaces().create().await.unwrap();
    workspace
        .write_file(
            &language.source_name("main"),
            b"if true; then echo yes; fi\n",
        )
        .await
        .unwrap();

    let outcome = runner
        .compile(&workspace, language, "main")
        .await
        .expect("Compilation call failed");
    assert!(outcome.is_success());
    assert!(outcome.diagnostics().is_empty());

    let result = runner
        .run(&workspace, language, "main", b"")
        .await
        .expect("Execution failed");
    assert_eq!(result.stdout, b"yes\n");

    workspace.destroy().await;
    assert_eq!(workspace_count(root.path()), 0);
}

#[tokio::test]
async fn test_compile_interpreted_language() {
    let root = tempfile::tempdir().unwrap();
    let runner = shell_runner(root.path());
    let language = runner.config().get_language("shell").unwrap();

    let mut workspace = runner.workspaces().create().await.unwrap();
    let result = runner.compile(&workspace, language, "main").await;
    assert!(matches!(result, Err(ExecuteError::NotCompiled(_))));

    workspace.destroy().await;
}
