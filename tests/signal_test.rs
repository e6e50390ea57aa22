//! Real SIGTERM delivery. Kept in its own test binary: the signal goes to the
//! whole process.

mod helpers;

use std::time::Duration;

use helpers::{test_config, test_paths};
use memoryd::daemon::lifecycle::{Lifecycle, StopOutcome};
use memoryd::daemon::{self, ServeOptions, Shutdown};
use memoryd::memory::MemoryStore;
use tempfile::TempDir;
use tokio::net::UnixStream;

#[tokio::test]
async fn sigterm_stops_the_daemon_and_cleans_up() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let lifecycle = Lifecycle::from_config(&config);

    let shutdown = Shutdown::on_signals().unwrap();
    let paths = test_paths(dir.path());
    let task = tokio::spawn(async move {
        daemon::run(
            &paths,
            move || MemoryStore::open(&config),
            ServeOptions::default(),
            shutdown,
        )
        .await
    });

    let socket = lifecycle.paths().socket.clone();
    for _ in 0..200 {
        if UnixStream::connect(&socket).await.is_ok() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(lifecycle.is_running());

    let pid = std::process::id();
    assert_eq!(lifecycle.stop().unwrap(), StopOutcome::Signalled { pid });
    // a second signal during shutdown changes nothing
    assert_eq!(unsafe { libc::kill(pid as i32, libc::SIGTERM) }, 0);

    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("daemon did not stop on SIGTERM")
        .unwrap()
        .unwrap();

    assert!(!lifecycle.paths().pid_file.exists());
    assert!(!lifecycle.paths().socket.exists());
    assert_eq!(lifecycle.stop().unwrap(), StopOutcome::NotRunning);
}
