//! Run step for compiled or interpreted programs

use tracing::{debug, instrument};

use crate::config::{CommandContext, Config, Language};
use crate::process::{self, ProcessCommand};
use crate::runner::ExecuteError;
use crate::types::ProcessResult;
use crate::workspace::Workspace;

/// Run the program in `workspace` with `stdin` bound to its standard input
///
/// For compiled languages the compile step must already have succeeded; for
/// interpreted languages the source file must already be written.
#[instrument(
    skip(workspace, config, language, stdin),
    fields(workspace = %workspace.id(), language = %language.name)
)]
pub async fn run(
    workspace: &Workspace,
    config: &Config,
    language: &Language,
    program: &str,
    stdin: &[u8],
) -> Result<ProcessResult, ExecuteError> {
    let context = CommandContext::new(workspace.path(), language, program);
    let argv = context.expand(&language.run.command);
    let limits = config.effective_limits(language.run.limits.as_ref());

    debug!(?argv, stdin_len = stdin.len(), "executing program");

    let command = ProcessCommand::from_argv(argv)?
        .working_dir(workspace.path())
        .envs(&language.run.env)
        .stdin(stdin)
        .limits(&limits);

    let result = process::run(command).await?;

    debug!(
        status = ?result.status,
        exit_code = result.exit_code,
        wall_ms = result.wall_time.as_millis() as u64,
        "execution complete"
    );

    Ok(result)
}
