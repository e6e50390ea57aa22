//! The long-lived daemon process.
//!
//! Lifecycle: `Starting` (claim the pid marker, clear a stale socket, load the
//! memory store, bind) → `Ready` (accept and serve one connection at a time)
//! → `ShuttingDown` (close the listener, remove the socket and pid marker).
//! [`RuntimeFiles`] owns the two marker files and removes them on every exit
//! path, error or signal.

pub mod handler;
pub mod lifecycle;
pub mod shutdown;

use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::UnixListener;

use crate::config::MemorydConfig;
use crate::memory::MemoryStore;
pub use shutdown::Shutdown;

/// Where the daemon keeps its liveness marker and its socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    pub pid_file: PathBuf,
    pub socket: PathBuf,
}

impl RuntimePaths {
    pub fn from_config(config: &MemorydConfig) -> Self {
        Self {
            pid_file: config.resolved_pid_path(),
            socket: config.resolved_socket_path(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ServeOptions {
    /// How long a client may take to send its request.
    pub read_timeout: Option<Duration>,
}

impl ServeOptions {
    pub fn from_config(config: &MemorydConfig) -> Self {
        let secs = config.daemon.request_timeout_secs;
        Self {
            read_timeout: (secs > 0).then(|| Duration::from_secs(secs)),
        }
    }
}

fn remove_if_present(path: &Path) -> std::io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// The pid marker and socket file of a running daemon.
struct RuntimeFiles {
    paths: RuntimePaths,
    pid: u32,
    released: bool,
}

impl RuntimeFiles {
    /// Write our pid to the marker, creating parent directories as needed.
    fn claim(paths: &RuntimePaths) -> Result<Self> {
        for path in [&paths.pid_file, &paths.socket] {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create directory {}", parent.display()))?;
            }
        }

        let pid = std::process::id();
        std::fs::write(&paths.pid_file, pid.to_string())
            .with_context(|| format!("failed to write pid file {}", paths.pid_file.display()))?;

        Ok(Self {
            paths: paths.clone(),
            pid,
            released: false,
        })
    }

    /// Remove a socket left behind by a daemon that died without cleaning up.
    fn clear_stale_socket(&self) -> Result<()> {
        let socket = &self.paths.socket;
        if remove_if_present(socket)
            .with_context(|| format!("failed to remove stale socket {}", socket.display()))?
        {
            tracing::warn!(socket = %socket.display(), "removed stale socket from a previous run");
        }
        Ok(())
    }

    /// Remove the socket and pid marker. Safe to call more than once; the pid
    /// marker is left alone if another process has since claimed it.
    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if let Err(e) = remove_if_present(&self.paths.socket) {
            tracing::warn!(error = %e, "failed to remove socket");
        }

        let ours = std::fs::read_to_string(&self.paths.pid_file)
            .map(|s| s.trim() == self.pid.to_string())
            .unwrap_or(false);
        if ours {
            if let Err(e) = remove_if_present(&self.paths.pid_file) {
                tracing::warn!(error = %e, "failed to remove pid file");
            }
        }
    }
}

impl Drop for RuntimeFiles {
    fn drop(&mut self) {
        self.release();
    }
}

/// Bind the socket and restrict it to the owning user.
fn bind(socket: &Path) -> Result<UnixListener> {
    let listener = UnixListener::bind(socket)
        .with_context(|| format!("failed to bind socket {}", socket.display()))?;
    std::fs::set_permissions(socket, std::fs::Permissions::from_mode(0o600))
        .with_context(|| format!("failed to restrict permissions on {}", socket.display()))?;
    Ok(listener)
}

/// Run the daemon until `shutdown` fires.
///
/// `open_store` runs on the blocking pool after the pid marker is written; if
/// it fails, or shutdown is requested while it runs, no marker or socket is
/// left behind.
pub async fn run<F>(
    paths: &RuntimePaths,
    open_store: F,
    options: ServeOptions,
    mut shutdown: Shutdown,
) -> Result<()>
where
    F: FnOnce() -> Result<MemoryStore> + Send + 'static,
{
    let mut files = RuntimeFiles::claim(paths)?;
    tracing::info!(pid = files.pid, "memory daemon starting");
    files.clear_stale_socket()?;

    tracing::info!("loading memory store");
    let store = tokio::select! {
        loaded = tokio::task::spawn_blocking(open_store) => {
            loaded.context("memory store initialization panicked")??
        }
        _ = shutdown.recv() => {
            tracing::info!("shutdown requested during startup");
            return Ok(());
        }
    };
    let store = Arc::new(store);

    let listener = bind(&paths.socket)?;
    tracing::info!(
        pid = files.pid,
        socket = %paths.socket.display(),
        "memory daemon ready"
    );

    serve(&listener, &store, &options, &mut shutdown).await;

    tracing::info!("memory daemon shutting down");
    drop(listener);
    files.release();
    tracing::info!("memory daemon stopped");
    Ok(())
}

/// Accept loop. One connection is handled to completion before the next
/// `accept`; a shutdown request interrupts either step.
async fn serve(
    listener: &UnixListener,
    store: &Arc<MemoryStore>,
    options: &ServeOptions,
    shutdown: &mut Shutdown,
) {
    loop {
        let stream = tokio::select! {
            _ = shutdown.recv() => return,
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => stream,
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    continue;
                }
            },
        };

        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("shutdown requested while a request was in flight");
                return;
            }
            handled = handler::handle_connection(store, stream, options.read_timeout) => {
                if let Err(e) = handled {
                    tracing::warn!(error = %e, "connection ended before the response was sent");
                }
            }
        }
    }
}
