//! One-shot shutdown flag shared by the accept loop and startup.

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;

/// Observer side. Cheap to clone; every clone sees the same flag.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

/// Trigger side. Dropping it without calling [`trigger`](Self::trigger) also
/// counts as a shutdown request.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl ShutdownTrigger {
    /// Request shutdown. Repeated calls are no-ops.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

impl Shutdown {
    /// Shutdown flag driven by SIGTERM and SIGINT.
    ///
    /// Handlers are registered before this returns, so a signal arriving
    /// during a slow startup is observed instead of killing the process.
    pub fn on_signals() -> std::io::Result<Self> {
        let (trigger, shutdown) = channel();
        let mut term = signal(SignalKind::terminate())?;
        let mut int = signal(SignalKind::interrupt())?;

        tokio::spawn(async move {
            tokio::select! {
                _ = term.recv() => tracing::info!("received SIGTERM"),
                _ = int.recv() => tracing::info!("received SIGINT"),
            }
            trigger.trigger();
        });

        Ok(shutdown)
    }

    #[cfg(test)]
    fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown has been requested.
    pub async fn recv(&mut self) {
        // Err means the trigger is gone, which is treated as a request too.
        let _ = self.rx.wait_for(|triggered| *triggered).await;
    }
}
