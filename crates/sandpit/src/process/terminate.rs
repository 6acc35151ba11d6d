//! Two-stage termination of a child's process group

use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use tokio::process::Child;
use tracing::{debug, warn};

/// Send `signal` to the whole process group led by `pgid`
///
/// A group that no longer exists is not an error.
fn signal_group(pgid: u32, signal: Signal) {
    let Ok(raw) = i32::try_from(pgid) else {
        warn!(pgid, "process group id out of range");
        return;
    };

    match killpg(Pid::from_raw(raw), signal) {
        Ok(()) => debug!(pgid, ?signal, "signalled process group"),
        Err(Errno::ESRCH) => debug!(pgid, ?signal, "process group already gone"),
        Err(e) => warn!(pgid, ?signal, error = %e, "failed to signal process group"),
    }
}

/// SIGKILL whatever is left in a process group whose leader has been reaped
pub(crate) fn kill_group(pgid: u32) {
    signal_group(pgid, Signal::SIGKILL);
}

/// Terminate the child and everything in its process group
///
/// Sends SIGTERM, waits up to `grace` for the child to exit, then sends SIGKILL.
/// The child is always reaped before this returns. Returns the exit status
/// if it could be collected.
pub(crate) async fn terminate(
    child: &mut Child,
    pgid: Option<u32>,
    grace: Duration,
) -> Option<std::process::ExitStatus> {
    let Some(pgid) = pgid else {
        // Already reaped
        return child.try_wait().ok().flatten();
    };

    signal_group(pgid, Signal::SIGTERM);

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => {
            // Stragglers that ignored SIGTERM still get killed
            kill_group(pgid);
            return Some(status);
        }
        Ok(Err(e)) => warn!(pgid, error = %e, "wait failed after SIGTERM"),
        Err(_) => debug!(
            pgid,
            grace_ms = grace.as_millis() as u64,
            "process ignored SIGTERM, escalating to SIGKILL"
        ),
    }

    signal_group(pgid, Signal::SIGKILL);

    match child.wait().await {
        Ok(status) => Some(status),
        Err(e) => {
            warn!(pgid, error = %e, "failed to reap killed process");
            None
        }
    }
}
