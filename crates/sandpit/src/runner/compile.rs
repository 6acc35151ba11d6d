//! Compilation step for code execution
//!
//! Runs a language's compile command inside the workspace.

use tracing::{debug, instrument, warn};

use crate::config::{CommandContext, Config, Language};
use crate::process::{self, ProcessCommand};
use crate::runner::ExecuteError;
use crate::types::ProcessResult;
use crate::workspace::Workspace;

/// Result of a compile step
#[derive(Debug, Clone)]
pub struct CompileOutcome {
    /// Whether the compiler exited with code 0 on its own
    pub success: bool,

    /// Raw compiler process result
    pub process: ProcessResult,
}

impl CompileOutcome {
    /// Check if compilation was successful
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Compiler diagnostics, stderr followed by stdout
    pub fn diagnostics(&self) -> String {
        let mut output = self.process.stderr_lossy();
        let stdout = self.process.stdout_lossy();
        if !output.is_empty() && !stdout.is_empty() {
            output.push('\n');
        }
        output.push_str(&stdout);
        output
    }
}

/// Compile the program whose source is already in `workspace`
#[instrument(
    skip(workspace, config, language),
    fields(workspace = %workspace.id(), language = %language.name)
)]
pub async fn compile(
    workspace: &Workspace,
    config: &Config,
    language: &Language,
    program: &str,
) -> Result<CompileOutcome, ExecuteError> {
    let compile_config = language
        .compile
        .as_ref()
        .ok_or_else(|| ExecuteError::NotCompiled(language.name.clone()))?;

    let context = CommandContext::new(workspace.path(), language, program);
    let argv = context.expand(&compile_config.command);
    let limits = config.effective_limits(compile_config.limits.as_ref());

    debug!(?argv, timeout_ms = ?limits.timeout_ms, "compiling");

    let command = ProcessCommand::from_argv(argv)?
        .working_dir(workspace.path())
        .envs(&compile_config.env)
        .limits(&limits);

    let process = process::run(command).await?;
    let success = process.is_success();

    if process.status.is_forced() {
        warn!(status = ?process.status, "compiler stopped by the runner");
    }

    debug!(
        success,
        status = ?process.status,
        exit_code = process.exit_code,
        "compilation complete"
    );

    Ok(CompileOutcome { success, process })
}
