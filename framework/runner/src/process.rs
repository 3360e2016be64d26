use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use cc_tunnel_core::prelude::Side;
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};

use crate::command::LaunchCommand;

/// An endpoint process started as the leader of its own process group.
///
/// Wrappers commonly fork the real endpoint binary, so signals are always sent to the whole group
/// rather than to the leader. Dropping a [`ProcessGroup`] that has not been cleaned up sends
/// `SIGTERM` to the group, so the group is signalled on every exit path of a run.
#[derive(Debug)]
pub struct ProcessGroup {
    side: Side,
    child: Child,
    pgid: Pid,
    exit_status: Option<ExitStatus>,
    cleaned_up: bool,
}

impl ProcessGroup {
    pub fn spawn(side: Side, command: &LaunchCommand) -> std::io::Result<Self> {
        log::debug!("Spawning {side}: {}", command.display());

        let child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .process_group(0)
            .spawn()?;
        let pid = child
            .id()
            .ok_or_else(|| std::io::Error::other("spawned process has no pid"))?;
        log::trace!("Started {side} with pid {pid}");

        Ok(Self {
            side,
            child,
            pgid: Pid::from_raw(pid as i32),
            exit_status: None,
            cleaned_up: false,
        })
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn pid(&self) -> u32 {
        self.pgid.as_raw() as u32
    }

    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    /// Wait for the group leader to exit. Cancel safe.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        if let Some(status) = self.exit_status {
            return Ok(status);
        }
        let status = self.child.wait().await?;
        log::trace!("{} (pid {}) exited with {status}", self.side, self.pid());
        self.exit_status = Some(status);
        Ok(status)
    }

    /// Whether any process is left in the group.
    pub fn is_alive(&self) -> bool {
        !matches!(killpg(self.pgid, None), Err(Errno::ESRCH))
    }

    /// Signal every process in the group. A group that is already gone is not an error.
    pub fn signal(&self, signal: Signal) -> nix::Result<()> {
        match killpg(self.pgid, signal) {
            Err(Errno::ESRCH) => Ok(()),
            other => other,
        }
    }

    /// Stop the group: `SIGTERM`, then `SIGKILL` if anything is left after `grace`.
    pub async fn terminate(&mut self, grace: Duration) {
        self.cleaned_up = true;

        if let Err(e) = self.signal(Signal::SIGTERM) {
            log::warn!("Failed to send SIGTERM to {} group {}: {e}", self.side, self.pgid);
        }

        // Reap the leader so it doesn't linger as a zombie member of the group.
        if tokio::time::timeout(grace, self.wait()).await.is_err() {
            log::debug!("{} (pid {}) ignored SIGTERM", self.side, self.pgid);
        }

        if self.is_alive() {
            log::debug!("Sending SIGKILL to {} group {}", self.side, self.pgid);
            if let Err(e) = self.signal(Signal::SIGKILL) {
                log::warn!("Failed to send SIGKILL to {} group {}: {e}", self.side, self.pgid);
            }
            if tokio::time::timeout(grace, self.wait()).await.is_err() {
                log::warn!("{} (pid {}) survived SIGKILL", self.side, self.pgid);
            }
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        if self.cleaned_up {
            return;
        }
        log::debug!("Dropping {} group {}, sending SIGTERM", self.side, self.pgid);
        if let Err(e) = self.signal(Signal::SIGTERM) {
            log::warn!("Failed to send SIGTERM to {} group {}: {e}", self.side, self.pgid);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> LaunchCommand {
        LaunchCommand {
            program: "sh".into(),
            args: vec!["-c".into(), script.into()],
        }
    }

    #[tokio::test]
    async fn test_should_record_exit_status() {
        let mut group = ProcessGroup::spawn(Side::Sender, &sh("exit 3")).unwrap();
        let status = group.wait().await.unwrap();
        assert_eq!(status.code(), Some(3));
        assert_eq!(group.exit_status(), Some(status));
        // A second wait returns the recorded status.
        assert_eq!(group.wait().await.unwrap().code(), Some(3));
        group.terminate(Duration::from_millis(100)).await;
    }

    /// Zombies count as dead, they are only waiting for their new parent to reap them.
    fn pid_alive(pid: u32) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat
                .rsplit_once(')')
                .map(|(_, rest)| !rest.trim_start().starts_with('Z'))
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn wait_until_dead(pid: u32) -> bool {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while pid_alive(pid) {
            if tokio::time::Instant::now() > deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        true
    }

    async fn read_pid(path: &std::path::Path) -> u32 {
        for _ in 0..100 {
            if let Ok(content) = std::fs::read_to_string(path) {
                if let Ok(pid) = content.trim().parse() {
                    return pid;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("pid file {} was never written", path.display());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_should_terminate_whole_group() {
        let dir = tempfile::TempDir::new().unwrap();
        let pid_file = dir.path().join("child.pid");
        let script = format!("sleep 30 & echo $! > {}; wait", pid_file.display());

        let mut group = ProcessGroup::spawn(Side::Receiver, &sh(&script)).unwrap();
        let grandchild = read_pid(&pid_file).await;
        assert!(group.is_alive());
        assert!(pid_alive(grandchild));

        group.terminate(Duration::from_secs(2)).await;

        assert!(group.exit_status().is_some());
        assert!(wait_until_dead(grandchild).await);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_should_kill_group_ignoring_sigterm() {
        let mut group =
            ProcessGroup::spawn(Side::Receiver, &sh("trap '' TERM; while true; do sleep 1; done"))
                .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let leader = group.pid();

        group.terminate(Duration::from_millis(300)).await;

        assert!(group.exit_status().is_some());
        assert!(wait_until_dead(leader).await);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_should_terminate_group_on_drop() {
        let group = ProcessGroup::spawn(Side::Sender, &sh("exec sleep 30")).unwrap();
        let leader = group.pid();
        drop(group);
        // The leader is our child and is never reaped after drop, so it ends up a zombie.
        assert!(wait_until_dead(leader).await);
    }

    #[test]
    fn test_should_fail_to_spawn_missing_program() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let _guard = runtime.enter();
        let command = LaunchCommand {
            program: "/does/not/exist".into(),
            args: Vec::new(),
        };
        assert!(ProcessGroup::spawn(Side::Sender, &command).is_err());
    }
}
