//! End-to-end runs against real compilers and interpreters

use sandpit::config::Config;
use sandpit::runner::Runner;
use sandpit::types::{ExecutionRequest, ExecutionResult};

use super::{fixture_source, workspace_count};

fn runner(root: &std::path::Path) -> Runner {
    Runner::new(Config::default().with_workspace_root(root))
}

async fn execute(
    root: &std::path::Path,
    language: &str,
    source: &str,
    stdin: Option<&str>,
) -> ExecutionResult {
    let mut request = ExecutionRequest::new(language, fixture_source(source));
    if let Some(stdin) = stdin {
        request = request.with_stdin(stdin);
    }
    runner(root)
        .execute(&request)
        .await
        .expect("Execution failed")
}

#[tokio::test]
async fn test_python_hello_world() {
    let root = tempfile::tempdir().unwrap();
    let result = execute(root.path(), "python", "hello.py", None).await;

    assert_eq!(result.output, "Hello, World!\n");
    assert_eq!(result.stderr, "");
    assert!(result.error.is_none());
    assert_eq!(result.exit_code, Some(0));
    assert_eq!(workspace_count(root.path()), 0);
}

#[tokio::test]
async fn test_python_runtime_error() {
    let root = tempfile::tempdir().unwrap();
    let result = execute(root.path(), "python", "runtime_error.py", None).await;

    assert_eq!(result.output, "before failure\n");
    assert_eq!(result.error.as_deref(), Some("exited with code 3"));
    assert_eq!(result.exit_code, Some(3));
}

#[tokio::test]
async fn test_javascript_hello_world() {
    let root = tempfile::tempdir().unwrap();
    let result = execute(root.path(), "javascript", "hello.js", None).await;

    assert!(result.is_success());
    assert_eq!(result.output, "Hello, World!\n");
}

#[tokio::test]
async fn test_c_hello_world() {
    let root = tempfile::tempdir().unwrap();
    let result = execute(root.path(), "c", "hello.c", None).await;

    assert!(result.is_success());
    assert_eq!(result.output, "Hello, World!\n");
}

#[tokio::test]
async fn test_cpp_hello_world() {
    let root = tempfile::tempdir().unwrap();
    let result = execute(root.path(), "cpp", "hello.cpp", None).await;

    assert!(result.is_success());
    assert_eq!(result.output, "Hello, World!\n");
    assert_eq!(workspace_count(root.path()), 0);
}

#[tokio::test]
async fn test_cpp_echo_stdin() {
    let root = tempfile::tempdir().unwrap();
    let stdin = "line one\nline two\n";
    let result = execute(root.path(), "cpp", "echo.cpp", Some(stdin)).await;

    assert!(result.is_success());
    assert_eq!(result.output, "line one\nline two\n");
}

#[tokio::test]
async fn test_cpp_compile_error() {
    let root = tempfile::tempdir().unwrap();
    let result = execute(root.path(), "cpp", "compile_error.cpp", None).await;

    assert_eq!(
        result.error.as_deref(),
        Some(ExecutionResult::COMPILATION_FAILED)
    );
    assert!(result.stderr.contains("error"));
    assert_ne!(result.exit_code, Some(0));
    assert_eq!(workspace_count(root.path()), 0);
}

#[tokio::test]
async fn test_java_public_class_name() {
    let root = tempfile::tempdir().unwrap();
    let result = execute(root.path(), "java", "Greeter.java", Some("sandpit\n")).await;

    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.output, "Hello, sandpit!\n");
}

#[tokio::test]
async fn test_java_nested_public_class_runs_main() {
    let root = tempfile::tempdir().unwrap();
    let result = execute(root.path(), "java", "NestedNode.java", Some("7\n")).await;

    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.output, "node 7\n");
    assert_eq!(workspace_count(root.path()), 0);
}
