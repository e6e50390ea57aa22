//! Request/response messages exchanged with the daemon.
//!
//! ```text
//! -> {"mode": "store",    "text": "..."}
//! <- {"status": "ok"|"error", "message": "..."}
//! -> {"mode": "retrieve", "text": "...", "top_k": 3}
//! <- {"status": "ok", "result": "match one\nmatch two"}
//! -> {"mode": "ping"}
//! <- {"status": "ok", "message": "pong"}
//! ```
//!
//! Each message is one JSON object on one line; see [`codec`].

pub mod codec;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on one encoded frame, delimiter included.
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("request exceeds {MAX_FRAME_BYTES} bytes")]
    FrameTooLarge,
    #[error("malformed message: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unknown mode: {0}")]
    UnknownMode(String),
    #[error("top_k must be a positive integer")]
    InvalidTopK,
    #[error("Missing text for {0}.")]
    MissingText(&'static str),
}

/// A request as it appears on the wire, before the mode is checked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireRequest {
    #[serde(default)]
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u64>,
}

/// A validated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Store { text: String },
    Retrieve { text: String, top_k: Option<usize> },
    Ping,
}

impl TryFrom<WireRequest> for Request {
    type Error = ProtocolError;

    fn try_from(wire: WireRequest) -> Result<Self, Self::Error> {
        match wire.mode.as_str() {
            // "add" and "query" are the names older clients send
            "store" | "add" => Ok(Request::Store {
                text: wire.text.ok_or(ProtocolError::MissingText("store"))?,
            }),
            "retrieve" | "query" => {
                let top_k = match wire.top_k {
                    Some(0) => return Err(ProtocolError::InvalidTopK),
                    Some(k) => Some(usize::try_from(k).unwrap_or(usize::MAX)),
                    None => None,
                };
                Ok(Request::Retrieve {
                    text: wire.text.ok_or(ProtocolError::MissingText("retrieve"))?,
                    top_k,
                })
            }
            "ping" => Ok(Request::Ping),
            other => Err(ProtocolError::UnknownMode(other.to_string())),
        }
    }
}

impl From<Request> for WireRequest {
    fn from(request: Request) -> Self {
        match request {
            Request::Store { text } => WireRequest {
                mode: "store".into(),
                text: Some(text),
                top_k: None,
            },
            Request::Retrieve { text, top_k } => WireRequest {
                mode: "retrieve".into(),
                text: Some(text),
                top_k: top_k.map(|k| k as u64),
            },
            Request::Ping => WireRequest {
                mode: "ping".into(),
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl Response {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: Status::Ok,
            message: Some(message.into()),
            result: None,
        }
    }

    /// Matches joined with `\n`; an empty list gives an empty string.
    pub fn matches(matches: &[String]) -> Self {
        Self {
            status: Status::Ok,
            message: None,
            result: Some(matches.join("\n")),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: Some(message.into()),
            result: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// What a terminal user should see: the result if there is one, else the message.
    pub fn display_text(&self) -> &str {
        match (&self.result, &self.message) {
            (Some(result), _) if !result.is_empty() => result,
            (_, Some(message)) => message,
            _ => "",
        }
    }
}
