//! Persistent semantic memory behind a local daemon.
//!
//! Short text memories are embedded, stored under a content hash, and
//! retrieved by nearest-neighbour search with a distance cutoff. A daemon
//! keeps the embedding model loaded and answers newline-delimited JSON over a
//! Unix socket; clients fall back to answering in-process when no daemon is
//! listening.
//!
//! # Architecture
//!
//! - **Storage**: SQLite with [sqlite-vec](https://github.com/asg017/sqlite-vec)
//!   for the vector index
//! - **Embeddings**: Local ONNX Runtime with all-MiniLM-L6-v2 (384 dimensions)
//! - **Transport**: one JSON request per connection over a Unix socket
//!
//! # Modules
//!
//! - [`config`]: TOML config file plus `MEMORYD_*` environment overrides
//! - [`db`]: SQLite connection setup and schema
//! - [`embedding`]: text-to-vector providers
//! - [`memory`]: the memory store (store / retrieve / ping) and its vector index
//! - [`protocol`]: wire messages and the line-delimited codec
//! - [`daemon`]: socket server, runtime files, start / stop / status
//! - [`client`]: talk to the daemon, or answer in-process without one

pub mod client;
pub mod config;
pub mod daemon;
pub mod db;
pub mod embedding;
pub mod memory;
pub mod protocol;
