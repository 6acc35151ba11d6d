//! A library for running untrusted source code in many languages.
//!
//! Sandpit takes a source file, a language id and optional standard input, and
//! returns the program's output. Each execution gets a private workspace
//! directory, an optional compile step and a run step bounded by a wall clock
//! timeout and a per-stream output cap. The workspace is removed afterwards,
//! and a background sweeper reclaims anything a crash left behind.
//!
//! # Features
//!
//! - **Multi-language**: Compiled and interpreted languages described in TOML.
//! - **Argument-list commands**: Programs are spawned directly, never through a shell.
//! - **Bounded runs**: Timeouts and output caps end in SIGTERM, then SIGKILL, to the whole
//!   process group.
//! - **Workspace lifecycle**: One UUID-named directory per execution, always cleaned up.
//! - **Reclamation sweeper**: Periodic removal of stale workspaces with explicit start and stop.

pub use config::{Config, ConfigError, EXAMPLE_CONFIG, Language};
pub use process::{ProcessCommand, ProcessError};
pub use runner::{CompileOutcome, ExecuteError, Runner};
pub use types::{
    ExecutionRequest, ExecutionResult, ExecutionStatus, ProcessResult, RequestLimits,
    ResourceLimits,
};
pub use workspace::{
    SweepReport, Sweeper, SweeperHandle, Workspace, WorkspaceError, WorkspaceManager,
};

pub mod config;
pub mod process;
pub mod runner;
pub mod types;
pub mod workspace;
