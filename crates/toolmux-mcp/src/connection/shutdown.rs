//! Graceful termination of server processes with SIGTERM → SIGKILL escalation.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;

#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Terminate `child` and reap it.
///
/// 1. SIGTERM, then wait up to `grace`
/// 2. SIGKILL if it is still running
/// 3. Wait for reaping
///
/// Windows has no SIGTERM equivalent and kills immediately.
pub async fn terminate_child(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    if let Some(status) = child.try_wait()? {
        return Ok(status);
    }

    #[cfg(unix)]
    {
        if let Some(pid) = child.id().and_then(|pid| i32::try_from(pid).ok()) {
            match signal::kill(Pid::from_raw(pid), Signal::SIGTERM) {
                // Already gone; just reap it.
                Err(nix::errno::Errno::ESRCH) => return child.wait().await,
                Err(e) => return Err(io::Error::other(e)),
                Ok(()) => {
                    if let Ok(status) = tokio::time::timeout(grace, child.wait()).await {
                        return status;
                    }
                    tracing::debug!(pid, ?grace, "grace period elapsed, sending SIGKILL");
                }
            }
        }
    }

    #[cfg(not(unix))]
    let _ = grace;

    child.kill().await?;
    child.wait().await
}
