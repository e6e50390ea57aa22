//! `start`, `stop`, `status` and `ping`.

use anyhow::Result;

use memoryd::client;
use memoryd::config::MemorydConfig;
use memoryd::daemon::lifecycle::{DaemonStatus, Lifecycle, StartOutcome, StopOutcome};
use memoryd::protocol::Request;

/// Blocks for the daemon's lifetime.
pub async fn start(config: &MemorydConfig) -> Result<()> {
    match Lifecycle::from_config(config).start(config).await? {
        StartOutcome::AlreadyRunning { pid } => println!("Daemon is already running (PID {pid})."),
        StartOutcome::Stopped => {}
    }
    Ok(())
}

pub fn stop(config: &MemorydConfig) -> Result<()> {
    match Lifecycle::from_config(config).stop()? {
        StopOutcome::Signalled { pid } => println!("Daemon stopped (PID {pid})."),
        StopOutcome::NotRunning => println!("Daemon is not running."),
    }
    Ok(())
}

pub fn status(config: &MemorydConfig) -> Result<()> {
    let lifecycle = Lifecycle::from_config(config);
    match lifecycle.status() {
        DaemonStatus::Running { pid } => {
            println!("Daemon running (PID {pid})");
            println!("Socket: {}", lifecycle.paths().socket.display());
        }
        DaemonStatus::NotRunning => println!("Daemon not running."),
    }
    Ok(())
}

/// Ping over the socket only; there is nothing to prove in-process.
pub async fn ping(config: &MemorydConfig) -> Result<()> {
    let lifecycle = Lifecycle::from_config(config);
    match client::send_if_live(&lifecycle.paths().socket, Request::Ping).await? {
        Some(response) => super::memory::print_response(&response),
        None => {
            println!("Daemon not running.");
            Ok(())
        }
    }
}
