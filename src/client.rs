//! Client side of the daemon socket, with an in-process fallback.

use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use tokio::io::BufReader;
use tokio::net::UnixStream;

use crate::config::MemorydConfig;
use crate::daemon::handler::dispatch;
use crate::daemon::lifecycle::Lifecycle;
use crate::memory::MemoryStore;
use crate::protocol::codec::{read_message, write_message};
use crate::protocol::{Request, Response, WireRequest};

/// How a request was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Daemon,
    Fallback,
}

/// Send one request over an established connection and read the reply.
pub async fn exchange(stream: UnixStream, request: Request) -> Result<Response> {
    let (read_half, mut write_half) = stream.into_split();
    write_message(&mut write_half, &WireRequest::from(request)).await?;

    let mut reader = BufReader::new(read_half);
    read_message::<Response, _>(&mut reader)
        .await?
        .context("daemon closed the connection without replying")
}

/// Connect to the daemon at `socket` and send one request.
pub async fn send(socket: &Path, request: Request) -> Result<Response> {
    let stream = UnixStream::connect(socket)
        .await
        .with_context(|| format!("failed to connect to {}", socket.display()))?;
    exchange(stream, request).await
}

/// Answer `request` in this process with a one-shot store.
///
/// Pays the full index and embedding-model load for a single call.
pub async fn fallback(config: &MemorydConfig, request: Request) -> Result<Response> {
    let config = config.clone();
    tokio::task::spawn_blocking(move || {
        let store = MemoryStore::open(&config)?;
        Ok(dispatch(&store, request))
    })
    .await
    .context("fallback task panicked")?
}

/// Send `request` to the daemon at `socket` if one is listening.
///
/// `Ok(None)` means nobody is: the socket file is missing, or it was left
/// behind by a daemon that is gone.
pub async fn send_if_live(socket: &Path, request: Request) -> Result<Option<Response>> {
    match UnixStream::connect(socket).await {
        Ok(stream) => Ok(Some(exchange(stream, request).await?)),
        Err(e) if matches!(e.kind(), ErrorKind::ConnectionRefused | ErrorKind::NotFound) => {
            if socket.exists() {
                tracing::warn!(socket = %socket.display(), "daemon socket is stale");
            }
            Ok(None)
        }
        Err(e) => Err(anyhow::Error::new(e)
            .context(format!("failed to connect to {}", socket.display()))),
    }
}

/// Route `request` to the daemon if its socket is live, otherwise to the
/// in-process fallback when the config allows it.
pub async fn call(config: &MemorydConfig, request: Request) -> Result<(Route, Response)> {
    let lifecycle = Lifecycle::from_config(config);

    if lifecycle.endpoint_exists() {
        if let Some(response) = send_if_live(&lifecycle.paths().socket, request.clone()).await? {
            return Ok((Route::Daemon, response));
        }
    }

    anyhow::ensure!(
        config.daemon.fallback,
        "Daemon not running. Start it with `memoryd start &`."
    );
    tracing::debug!("no daemon listening, running in-process");
    Ok((Route::Fallback, fallback(config, request).await?))
}
