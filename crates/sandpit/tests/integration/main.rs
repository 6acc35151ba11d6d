//! Integration tests for sandpit
//!
//! Most tests drive the pipeline through languages backed by `sh`, so they only
//! need a POSIX userland. Tests against real compilers and interpreters (g++,
//! javac, python3, node) are gated behind a feature:
//!    cargo test -p sandpit --features integration-tests

use std::fs;
use std::path::Path;

use sandpit::config::Config;
use sandpit::runner::Runner;

mod compilation;
mod config_loading;
mod resource_limits;
#[cfg(feature = "integration-tests")]
mod toolchains;

const FIXTURES_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

/// Helper to get fixture file content
pub(crate) fn fixture_source(name: &str) -> String {
    let path = format!("{FIXTURES_PATH}/sources/{name}");
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to read fixture {path}: {e}"))
}

/// Shell-backed test config rooted at `root`
pub(crate) fn shell_config(root: &Path) -> Config {
    let path = format!("{FIXTURES_PATH}/configs/shell.toml");
    Config::from_file(&path)
        .unwrap_or_else(|e| panic!("Failed to load {path}: {e}"))
        .with_workspace_root(root)
}

pub(crate) fn shell_runner(root: &Path) -> Runner {
    Runner::new(shell_config(root))
}

/// Number of entries left under a workspace root
pub(crate) fn workspace_count(root: &Path) -> usize {
    fs::read_dir(root).map(|dir| dir.count()).unwrap_or(0)
}
