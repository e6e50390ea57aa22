//! Per-request work: route a request to the memory store, and run one
//! connection (read a frame, answer it, close).

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::memory::MemoryStore;
use crate::protocol::codec::{read_message, write_message};
use crate::protocol::{ProtocolError, Request, Response, WireRequest};

pub const STORED_MESSAGE: &str = "Memory saved.";

/// Run `request` against `store`. Never fails: every error becomes an
/// `error` response.
pub fn dispatch(store: &MemoryStore, request: Request) -> Response {
    match request {
        Request::Store { text } => match store.store(&text) {
            Ok(stored) => {
                tracing::info!(id = %stored.id, "memory saved");
                Response::message(STORED_MESSAGE)
            }
            Err(e) if e.is_rejection() => {
                tracing::debug!(reason = %e, "store rejected");
                Response::error(e.to_string())
            }
            Err(e) => {
                tracing::error!(error = %e, "store failed");
                Response::error(format!("{e:#}"))
            }
        },
        Request::Retrieve { text, top_k } => {
            let top_k = top_k.unwrap_or_else(|| store.default_top_k());
            match store.retrieve(&text, top_k) {
                Ok(matches) => Response::matches(&matches),
                Err(e) => {
                    tracing::error!(error = %e, "retrieve failed");
                    Response::error(format!("{e:#}"))
                }
            }
        }
        Request::Ping => Response::message(store.ping()),
    }
}

/// Validate a wire request and dispatch it on the blocking pool.
///
/// The caller awaits the result before accepting anything else, so requests
/// still run one at a time.
pub async fn execute(store: &Arc<MemoryStore>, wire: WireRequest) -> Response {
    let request = match Request::try_from(wire) {
        Ok(request) => request,
        Err(e) => return Response::error(e.to_string()),
    };
    tracing::debug!(?request, "dispatching");

    let store = Arc::clone(store);
    match tokio::task::spawn_blocking(move || dispatch(&store, request)).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "request handler panicked");
            Response::error(format!("internal error: {e}"))
        }
    }
}

/// Serve exactly one request on `stream`, then close it.
///
/// Malformed frames get an `error` response. Only transport failures
/// (the client went away) surface as `Err`.
pub async fn handle_connection<S>(
    store: &Arc<MemoryStore>,
    stream: S,
    read_timeout: Option<Duration>,
) -> Result<(), ProtocolError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, mut write_half) = tokio::io::split(stream);
    let mut reader = BufReader::new(read_half);

    let read = read_message::<WireRequest, _>(&mut reader);
    let frame = match read_timeout {
        Some(limit) => match tokio::time::timeout(limit, read).await {
            Ok(frame) => frame,
            Err(_) => {
                tracing::warn!(timeout_secs = limit.as_secs(), "client sent no request in time");
                write_message(&mut write_half, &Response::error("request timed out")).await?;
                return Ok(());
            }
        },
        None => read.await,
    };

    let response = match frame {
        Ok(Some(wire)) => execute(store, wire).await,
        Ok(None) => {
            tracing::debug!("client closed without a request");
            return Ok(());
        }
        Err(ProtocolError::Io(e)) => return Err(ProtocolError::Io(e)),
        Err(e) => {
            tracing::debug!(error = %e, "bad request frame");
            Response::error(e.to_string())
        }
    };

    write_message(&mut write_half, &response).await?;
    write_half.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::hashed::HashedEmbeddingProvider;
    use crate::memory::index::SqliteVecIndex;
    use crate::protocol::Status;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    fn test_store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::new(
            Box::new(HashedEmbeddingProvider::new()),
            Box::new(SqliteVecIndex::open_in_memory().unwrap()),
            0.8,
        ))
    }

    async fn round_trip(store: &Arc<MemoryStore>, raw: &[u8]) -> String {
        let (server, mut client) = tokio::io::duplex(4096);
        let store = Arc::clone(store);
        let task = tokio::spawn(async move { handle_connection(&store, server, None).await });

        client.write_all(raw).await.unwrap();
        let mut line = String::new();
        BufReader::new(client).read_line(&mut line).await.unwrap();
        task.await.unwrap().unwrap();
        line
    }

    #[test]
    fn dispatch_ping() {
        let resp = dispatch(&test_store(), Request::Ping);
        assert_eq!(resp, Response::message("pong"));
    }

    #[test]
    fn dispatch_store_then_retrieve() {
        let store = test_store();
        let saved = dispatch(&store, Request::Store { text: "the cat sat on the mat".into() });
        assert_eq!(saved, Response::message(STORED_MESSAGE));

        let found = dispatch(
            &store,
            Request::Retrieve { text: "the cat sat on the mat".into(), top_k: None },
        );
        assert_eq!(found.result.as_deref(), Some("the cat sat on the mat"));
    }

    #[test]
    fn dispatch_rejection_is_error_response() {
        let resp = dispatch(&test_store(), Request::Store { text: "is it raining?".into() });
        assert_eq!(resp.status, Status::Error);
        assert_eq!(resp.message.as_deref(), Some("Refusing to store a question."));
    }

    #[tokio::test]
    async fn connection_answers_ping() {
        let line = round_trip(&test_store(), b"{\"mode\":\"ping\"}\n").await;
        assert_eq!(line, "{\"status\":\"ok\",\"message\":\"pong\"}\n");
    }

    #[tokio::test]
    async fn connection_reports_unknown_mode() {
        let line = round_trip(&test_store(), b"{\"mode\":\"frobnicate\"}\n").await;
        assert_eq!(
            line,
            "{\"status\":\"error\",\"message\":\"Unknown mode: frobnicate\"}\n"
        );
    }

    #[tokio::test]
    async fn connection_reports_malformed_json() {
        let line = round_trip(&test_store(), b"{not-json\n").await;
        let resp: Response = serde_json::from_str(&line).unwrap();
        assert_eq!(resp.status, Status::Error);
        assert!(resp.message.unwrap().starts_with("malformed message"));
    }

    #[tokio::test]
    async fn empty_connection_gets_no_response() {
        let (server, client) = tokio::io::duplex(64);
        drop(client);
        handle_connection(&test_store(), server, None).await.unwrap();
    }

    #[tokio::test]
    async fn silent_client_times_out() {
        let (server, client) = tokio::io::duplex(4096);
        let store = test_store();
        let task = tokio::spawn(async move {
            handle_connection(&store, server, Some(Duration::from_millis(20))).await
        });

        let mut line = String::new();
        BufReader::new(client).read_line(&mut line).await.unwrap();
        task.await.unwrap().unwrap();
        assert!(line.contains("request timed out"));
    }
}
