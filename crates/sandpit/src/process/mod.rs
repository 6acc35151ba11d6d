//! Subprocess execution with output capping and forced termination
//!
//! [`run`] spawns one program with an argument list (no shell), feeds it stdin,
//! and captures both output streams while racing three events: output arriving,
//! the wall clock deadline and the process exiting. Whichever terminal event is
//! seen first decides the outcome. Forced outcomes tear down the whole process
//! group with SIGTERM and then SIGKILL after the grace period.

use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

pub use crate::process::command::{DEFAULT_PATH, ProcessCommand};

use crate::process::capture::{OutputCapture, Stream, spawn_reader};
use crate::types::{ExecutionStatus, FORCED_EXIT_CODE, ProcessResult};

mod capture;
mod command;
mod terminate;

/// Error text for a run stopped at its deadline
pub const TIMED_OUT_MESSAGE: &str = "execution timed out";

/// Error text for a run stopped for writing too much output
pub const OUTPUT_LIMIT_MESSAGE: &str = "output limit exceeded";

/// Chunks buffered between the pipe readers and the event loop
const CHANNEL_CAPACITY: usize = 32;

/// How long to keep collecting output once the process is gone
const DRAIN_TIMEOUT: Duration = Duration::from_millis(250);

/// Errors that prevent a process result from being produced
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("empty command")]
    EmptyCommand,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// The event that ended the main loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Exited,
    TimedOut,
    OutputLimit,
}

/// Run a command to completion
///
/// Returns `Err` only when the program could not be started or waited on.
/// Non-zero exits, signals, timeouts and output overflow are all reported
/// through [`ProcessResult::status`].
#[instrument(skip(command), fields(program = %command.program()))]
pub async fn run(command: ProcessCommand) -> Result<ProcessResult, ProcessError> {
    let stdin_data = command.stdin_data().to_vec();

    let mut cmd = Command::new(command.program());
    cmd.args(command.get_args())
        .env_clear()
        .envs(command.environment())
        .stdin(if stdin_data.is_empty() {
            Stdio::null()
        } else {
            Stdio::piped()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .kill_on_drop(true);

    if let Some(dir) = command.get_working_dir() {
        cmd.current_dir(dir);
    }

    let start = Instant::now();
    let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
        program: command.program().to_owned(),
        source,
    })?;
    let pgid = child.id();

    debug!(
        pid = ?pgid,
        args = ?command.get_args(),
        timeout_ms = command.get_timeout().as_millis() as u64,
        "spawned process"
    );

    let stdin_task = child.stdin.take().map(|mut stdin| {
        tokio::spawn(async move {
            if let Err(e) = stdin.write_all(&stdin_data).await
                && e.kind() != io::ErrorKind::BrokenPipe
            {
                debug!(error = %e, "failed to write stdin");
            }
            // Dropping the handle closes the pipe so the program sees EOF
        })
    });

    let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);
    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(spawn_reader(stdout, Stream::Stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(spawn_reader(stderr, Stream::Stderr, tx.clone()));
    }
    drop(tx);

    let mut capture = OutputCapture::new(command.get_output_cap());
    let deadline = tokio::time::sleep(command.get_timeout());
    tokio::pin!(deadline);

    let mut streams_open = true;
    let mut exit_status = None;
    let trigger = loop {
        tokio::select! {
            biased;

            () = &mut deadline => break Trigger::TimedOut,
            chunk = rx.recv(), if streams_open => match chunk {
                Some(chunk) => {
                    if capture.push(chunk).is_err() {
                        break Trigger::OutputLimit;
                    }
                }
                None => streams_open = false,
            },
            status = child.wait() => {
                exit_status = Some(status?);
                break Trigger::Exited;
            }
        }
    };

    if trigger == Trigger::Exited {
        drain(&mut rx, &mut capture).await;
        // Descendants may outlive the leader while holding the pipes
        if let Some(pgid) = pgid {
            terminate::kill_group(pgid);
        }
    } else {
        debug!(?trigger, "terminating process group");
        exit_status = terminate::terminate(&mut child, pgid, command.get_grace_period()).await;
        drain(&mut rx, &mut capture).await;
    }

    let wall_time = start.elapsed();

    for reader in readers {
        reader.abort();
    }
    if let Some(task) = stdin_task {
        task.abort();
    }

    // Output past the cap counts even if it was only seen while draining
    let trigger = if trigger == Trigger::Exited && capture.overflowed() {
        Trigger::OutputLimit
    } else {
        trigger
    };

    let (stdout, stderr) = capture.into_parts();
    let mut result = classify(trigger, exit_status);
    result.stdout = stdout;
    result.stderr = stderr;
    result.wall_time = wall_time;

    debug!(
        status = ?result.status,
        exit_code = result.exit_code,
        signal = ?result.signal,
        wall_ms = wall_time.as_millis() as u64,
        stdout_len = result.stdout.len(),
        stderr_len = result.stderr.len(),
        "process finished"
    );

    Ok(result)
}

/// Collect whatever the readers still deliver, bounded by [`DRAIN_TIMEOUT`]
async fn drain(rx: &mut mpsc::Receiver<capture::Chunk>, capture: &mut OutputCapture) {
    let collect = async {
        while let Some(chunk) = rx.recv().await {
            // Keep receiving after an overflow so the readers are never blocked
            let _ = capture.push(chunk);
        }
    };

    if tokio::time::timeout(DRAIN_TIMEOUT, collect).await.is_err() {
        warn!(
            drain_ms = DRAIN_TIMEOUT.as_millis() as u64,
            "output streams still open after process exit"
        );
    }
}

/// Map the terminal event and exit status to a result without output
fn classify(trigger: Trigger, exit_status: Option<ExitStatus>) -> ProcessResult {
    let signal = exit_status.and_then(|status| status.signal());

    let (status, exit_code, error) = match trigger {
        Trigger::TimedOut => (
            ExecutionStatus::TimedOut,
            FORCED_EXIT_CODE,
            Some(TIMED_OUT_MESSAGE.to_owned()),
        ),
        Trigger::OutputLimit => (
            ExecutionStatus::OutputLimitExceeded,
            FORCED_EXIT_CODE,
            Some(OUTPUT_LIMIT_MESSAGE.to_owned()),
        ),
        Trigger::Exited => match (exit_status.and_then(|status| status.code()), signal) {
            (Some(0), _) => (ExecutionStatus::Ok, 0, None),
            (Some(code), _) => (
                ExecutionStatus::RuntimeError,
                code,
                Some(format!("exited with code {code}")),
            ),
            (None, Some(sig)) => (
                ExecutionStatus::Signaled,
                FORCED_EXIT_CODE,
                Some(format!("terminated by signal {sig}")),
            ),
            (None, None) => (
                ExecutionStatus::RuntimeError,
                FORCED_EXIT_CODE,
                Some("exit status unavailable".to_owned()),
            ),
        },
    };

    ProcessResult {
        status,
        exit_code,
        signal,
        error,
        ..Default::default()
    }
}
