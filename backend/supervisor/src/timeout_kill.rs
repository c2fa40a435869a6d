//! Timeout Killer
//!
//! Escalates termination of a child: SIGTERM, wait up to a grace period,
//! then a forced kill.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Terminate `child` and reap it.
///
/// A zero `grace` skips the polite request and kills immediately.
pub async fn terminate(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    let pid = child.id();

    if !grace.is_zero() && request_exit(pid) {
        match timeout(grace, child.wait()).await {
            Ok(status) => return status,
            Err(_) => warn!(pid = ?pid, grace_ms = grace.as_millis() as u64, "Process ignored SIGTERM; killing"),
        }
    }

    if let Err(e) = child.start_kill() {
        debug!(pid = ?pid, error = %e, "Kill failed; process already gone");
    }
    child.wait().await
}

/// Ask the process to exit. Returns false when no request could be delivered.
#[cfg(unix)]
fn request_exit(pid: Option<u32>) -> bool {
    let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return false;
    };
    // The child is not reaped until we wait on it, so the pid cannot have been reused.
    let rc = unsafe { kill(pid, SIGTERM) };
    if rc == 0 {
        debug!(pid, "Sent SIGTERM");
        true
    } else {
        debug!(pid, error = %io::Error::last_os_error(), "SIGTERM failed");
        false
    }
}

#[cfg(not(unix))]
fn request_exit(_pid: Option<u32>) -> bool {
    false
}

#[cfg(unix)]
const SIGTERM: i32 = 15;

#[cfg(unix)]
extern "C" {
    fn kill(pid: i32, sig: i32) -> i32;
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use std::process::Stdio;
    use std::time::Instant;
    use tokio::process::Command;

    fn sh(script: &str) -> Child {
        Command::new("/bin/sh")
            .arg("-c")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .unwrap()
    }

    #[tokio::test]
    async fn sigterm_is_enough_for_cooperative_process() {
        let mut child = sh("exec sleep 30");
        let status = terminate(&mut child, Duration::from_secs(5)).await.unwrap();
        assert_eq!(status.signal(), Some(15));
    }

    #[tokio::test]
    async fn escalates_when_sigterm_ignored() {
        let mut child = sh("trap '' TERM; while true; do sleep 0.05; done");
        // Give the shell time to install the trap.
        tokio::time::sleep(Duration::from_millis(200)).await;

        let started = Instant::now();
        let status = terminate(&mut child, Duration::from_millis(200)).await.unwrap();
        assert_eq!(status.signal(), Some(9));
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn zero_grace_kills_immediately() {
        let mut child = sh("exec sleep 30");
        let status = terminate(&mut child, Duration::ZERO).await.unwrap();
        assert_eq!(status.signal(), Some(9));
    }
}
