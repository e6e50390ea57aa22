//! Start / stop / status for the daemon, answered from the pid marker.
//!
//! The marker counts as "running" only if it holds a pid and that process
//! exists. Anything else (missing file, garbage, dead pid) reads as not
//! running, so a crash never leaves the daemon un-startable.

use std::path::Path;

use anyhow::Result;

use super::{RuntimePaths, ServeOptions, Shutdown};
use crate::config::MemorydConfig;
use crate::memory::MemoryStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonStatus {
    Running { pid: u32 },
    NotRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    AlreadyRunning { pid: u32 },
    /// The daemon ran and has shut down.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// SIGTERM was sent; shutdown completes asynchronously.
    Signalled { pid: u32 },
    NotRunning,
}

/// Signal-0 liveness check. `EPERM` means the process exists but is not ours.
pub fn process_alive(pid: u32) -> bool {
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    // 0 would address our own process group
    if pid <= 0 {
        return false;
    }
    if unsafe { libc::kill(pid, 0) } == 0 {
        return true;
    }
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

fn read_pid(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse().ok())
}

#[derive(Debug, Clone)]
pub struct Lifecycle {
    paths: RuntimePaths,
}

impl Lifecycle {
    pub fn new(paths: RuntimePaths) -> Self {
        Self { paths }
    }

    pub fn from_config(config: &MemorydConfig) -> Self {
        Self::new(RuntimePaths::from_config(config))
    }

    pub fn paths(&self) -> &RuntimePaths {
        &self.paths
    }

    /// Pid of the live daemon, if there is one.
    pub fn running_pid(&self) -> Option<u32> {
        let pid = read_pid(&self.paths.pid_file)?;
        if process_alive(pid) {
            Some(pid)
        } else {
            tracing::debug!(pid, "pid marker is stale");
            None
        }
    }

    pub fn is_running(&self) -> bool {
        self.running_pid().is_some()
    }

    pub fn status(&self) -> DaemonStatus {
        match self.running_pid() {
            Some(pid) => DaemonStatus::Running { pid },
            None => DaemonStatus::NotRunning,
        }
    }

    /// Whether the daemon's socket file exists. Clients check this before
    /// choosing between the socket and the in-process fallback.
    pub fn endpoint_exists(&self) -> bool {
        self.paths.socket.exists()
    }

    /// Run the daemon in this process until SIGTERM/SIGINT, unless one is
    /// already running.
    pub async fn start(&self, config: &MemorydConfig) -> Result<StartOutcome> {
        if let Some(pid) = self.live_daemon_pid() {
            return Ok(StartOutcome::AlreadyRunning { pid });
        }
        self.run_until(config, Shutdown::on_signals()?).await
    }

    /// Like [`running_pid`](Self::running_pid), but a marker holding our own
    /// pid is left over from a previous process that had the same pid.
    fn live_daemon_pid(&self) -> Option<u32> {
        let pid = self.running_pid()?;
        if pid == std::process::id() {
            tracing::warn!(pid, "pid marker holds our own pid, treating it as stale");
            return None;
        }
        Some(pid)
    }

    async fn run_until(&self, config: &MemorydConfig, shutdown: Shutdown) -> Result<StartOutcome> {
        let store_config = config.clone();
        super::run(
            &self.paths,
            move || MemoryStore::open(&store_config),
            ServeOptions::from_config(config),
            shutdown,
        )
        .await?;
        Ok(StartOutcome::Stopped)
    }

    /// Ask the running daemon to shut down. Does not wait for it to exit.
    pub fn stop(&self) -> Result<StopOutcome> {
        let Some(pid) = self.running_pid() else {
            return Ok(StopOutcome::NotRunning);
        };

        tracing::info!(pid, "sending SIGTERM to memory daemon");
        if unsafe { libc::kill(pid as i32, libc::SIGTERM) } != 0 {
            let err = std::io::Error::last_os_error();
            // it exited between the check and the signal
            if err.raw_os_error() == Some(libc::ESRCH) {
                return Ok(StopOutcome::NotRunning);
            }
            return Err(anyhow::Error::new(err).context(format!("failed to signal pid {pid}")));
        }
        Ok(StopOutcome::Signalled { pid })
    }
}
