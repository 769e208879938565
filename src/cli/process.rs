use std::{
    path::{Path, PathBuf},
    process::Stdio,
};

use anyhow::{anyhow, Result};
use sysinfo::{get_current_pid, Signal, System};
use tracing::info;

use crate::daemon::DaemonSettings;

/// Terminates every running process started from `name`, except this one and its children.
/// Returns how many were stopped.
pub fn kill_previous_servers(name: &Path) -> Result<usize> {
    let system = System::new_all();
    let current_id = get_current_pid().map_err(|e| anyhow!("Can't find own pid {e}"))?;
    let mut stopped = 0;
    for (pid, process) in system.processes().iter() {
        if *pid == current_id {
            continue;
        }
        if matches!(process.parent(), Some(p) if p == current_id) {
            continue;
        }

        if process
            .exe()
            .filter(|v| v.exists())
            .filter(|v| name == *v)
            .is_some()
        {
            info!("Stopping daemon {pid}");
            // SIGTERM lets the daemon persist its counters. On Windows this falls back to a
            // forceful kill.
            if process.kill_with(Signal::Term).is_none() {
                process.kill();
            }
            process.wait();
            stopped += 1;
        }
    }
    Ok(stopped)
}

/// Shuts down the previous daemon and starts a new one. The daemon binary detaches itself, so
/// this only waits for it to report that it did.
pub fn restart_server(daemon: PathBuf, dir: &Path, settings: &DaemonSettings) -> Result<()> {
    kill_previous_servers(&daemon)?;

    let mut command = std::process::Command::new(daemon);
    command.arg("--dir").arg(dir);
    if let Some(mm_per_point) = settings.mm_per_point {
        command.arg("--mm-per-point").arg(mm_per_point.to_string());
    }
    command.stdin(Stdio::null());

    println!("Spawning");
    let status = command.status()?;
    if !status.success() {
        return Err(anyhow!("Daemon failed to start {status}"));
    }
    println!("Success");
    Ok(())
}
