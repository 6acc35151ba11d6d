//! Code runner for sandpit
//!
//! Provides the execution pipeline: validate the request, prepare a workspace,
//! compile if the language needs it, run, and always clean up.

use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

pub use crate::runner::compile::{CompileOutcome, compile};
pub use crate::runner::execute::run;

mod compile;
mod execute;

use crate::{
    config::{Config, Language},
    process::ProcessError,
    types::{ExecutionRequest, ExecutionResult, ProcessResult},
    workspace::{Workspace, WorkspaceError, WorkspaceManager},
};

/// Errors that prevent an execution result from being produced
///
/// Program failures (compile errors, crashes, timeouts, output overflow) are not
/// errors; they are reported inside [`ExecutionResult`].
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("code is {len} bytes, limit is {max}")]
    CodeTooLarge { len: usize, max: usize },

    #[error("input is {len} bytes, limit is {max}")]
    InputTooLarge { len: usize, max: usize },

    #[error("language '{0}' does not support compilation")]
    NotCompiled(String),

    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    #[error("process error: {0}")]
    Process(#[from] ProcessError),
}

impl ExecuteError {
    /// Whether the request itself was at fault rather than the host
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ExecuteError::UnsupportedLanguage(_)
                | ExecuteError::CodeTooLarge { .. }
                | ExecuteError::InputTooLarge { .. }
        )
    }
}

/// High-level runner for code execution
#[derive(Debug, Clone)]
pub struct Runner {
    config: Config,
    workspaces: WorkspaceManager,
}

impl Runner {
    /// Create a new runner with the given configuration
    pub fn new(config: Config) -> Self {
        let workspaces = WorkspaceManager::new(config.workspace_root.clone());
        Self { config, workspaces }
    }

    /// Create a new runner with default configuration
    pub fn with_defaults() -> Self {
        Self::new(Config::default())
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Workspace allocator used by this runner
    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    /// Execute one request from source text to result
    ///
    /// Size and language checks happen before any workspace exists. Once a
    /// workspace has been created it is destroyed on every path, including
    /// spawn failures.
    #[instrument(
        skip(self, request),
        fields(language = %request.language, code_len = request.code.len())
    )]
    pub async fn execute(
        &self,
        request: &ExecutionRequest,
    ) -> Result<ExecutionResult, ExecuteError> {
        let started = Instant::now();

        self.validate(request)?;
        let language = self
            .config
            .get_language(&request.language)
            .map_err(|_| ExecuteError::UnsupportedLanguage(request.language.clone()))?;

        let mut workspace = self.workspaces.create().await?;
        let outcome = self
            .execute_in(&mut workspace, language, request, started)
            .await;
        workspace.destroy().await;

        match &outcome {
            Ok(result) => info!(
                workspace = %workspace.id(),
                elapsed_ms = result.execution_time,
                exit_code = ?result.exit_code,
                error = ?result.error,
                "execution finished"
            ),
            Err(e) => warn!(workspace = %workspace.id(), error = %e, "execution failed"),
        }

        outcome
    }

    /// Compile the program already written to `workspace`
    pub async fn compile(
        &self,
        workspace: &Workspace,
        language: &Language,
        program: &str,
    ) -> Result<CompileOutcome, ExecuteError> {
        compile::compile(workspace, &self.config, language, program).await
    }

    /// Run the program in `workspace` with the given standard input
    pub async fn run(
        &self,
        workspace: &Workspace,
        language: &Language,
        program: &str,
        stdin: &[u8],
    ) -> Result<ProcessResult, ExecuteError> {
        execute::run(workspace, &self.config, language, program, stdin).await
    }

    fn validate(&self, request: &ExecutionRequest) -> Result<(), ExecuteError> {
        let limits = &self.config.request_limits;

        if request.code.len() > limits.max_code_bytes {
            return Err(ExecuteError::CodeTooLarge {
                len: request.code.len(),
                max: limits.max_code_bytes,
            });
        }

        let input_len = request.stdin_bytes().len();
        if input_len > limits.max_input_bytes {
            return Err(ExecuteError::InputTooLarge {
                len: input_len,
                max: limits.max_input_bytes,
            });
        }

        Ok(())
    }

    async fn execute_in(
        &self,
        workspace: &mut Workspace,
        language: &Language,
        request: &ExecutionRequest,
        started: Instant,
    ) -> Result<ExecutionResult, ExecuteError> {
        let program = language.program_name(&request.code);
        let source_name = language.source_name(&program);
        workspace
            .write_file(&source_name, request.code.as_bytes())
            .await?;

        debug!(workspace = %workspace.id(), source_name, "wrote source file");

        if language.is_compiled() {
            let outcome = self.compile(workspace, language, &program).await?;
            if !outcome.is_success() {
                debug!(
                    workspace = %workspace.id(),
                    diagnostics = %outcome.diagnostics(),
                    "compilation failed"
                );
                return Ok(ExecutionResult::compilation_failed(
                    &outcome.process,
                    started.elapsed(),
                ));
            }
        }

        let result = self
            .run(workspace, language, &program, request.stdin_bytes())
            .await?;

        Ok(ExecutionResult::from_run(&result, started.elapsed()))
    }
}
