use std::ffi::OsString;
use std::path::Path;

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, Signal, System, UpdateKind};

/// Kill every process whose executable or command line refers to a path under `kill_dir`.
///
/// This is the emergency cleanup for when a run was aborted without its process groups being
/// cleaned up. The calling process is never killed. Returns the number of processes signalled.
pub fn sweep(kill_dir: &Path) -> usize {
    let kill_dir = kill_dir
        .canonicalize()
        .unwrap_or_else(|_| kill_dir.to_path_buf());
    log::info!("Killing processes started from {}", kill_dir.display());

    let this_process_pid = Pid::from_u32(std::process::id());
    let mut sys = System::new();
    sys.refresh_processes_specifics(
        ProcessesToUpdate::All,
        true,
        ProcessRefreshKind::nothing()
            .with_cmd(UpdateKind::Always)
            .with_exe(UpdateKind::Always),
    );

    let mut killed = 0;
    for (pid, process) in sys.processes() {
        if *pid == this_process_pid || !refers_to(process.exe(), process.cmd(), &kill_dir) {
            continue;
        }

        log::debug!("Killing {pid}: {:?}", process.cmd());
        match process.kill_with(Signal::Kill) {
            Some(true) => killed += 1,
            Some(false) => log::warn!("Failed to kill process {pid}"),
            None => log::warn!("Cannot send SIGKILL to process {pid} on this platform"),
        }
    }

    log::info!("Killed {killed} processes");
    killed
}

fn refers_to(exe: Option<&Path>, cmd: &[OsString], kill_dir: &Path) -> bool {
    if exe.is_some_and(|exe| exe.starts_with(kill_dir)) {
        return true;
    }

    cmd.iter().any(|arg| {
        let arg = arg.to_string_lossy();
        let arg: &str = &arg;
        // `--flag=/path` style arguments carry the path after the `=`.
        let value = arg.split_once('=').map_or(arg, |(_, value)| value);
        Path::new(arg).starts_with(kill_dir) || Path::new(value).starts_with(kill_dir)
    })
}
