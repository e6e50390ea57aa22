#![allow(dead_code)]

use std::path::Path;

use memoryd::config::MemorydConfig;
use memoryd::daemon::RuntimePaths;
use memoryd::embedding::hashed::HashedEmbeddingProvider;
use memoryd::memory::index::SqliteVecIndex;
use memoryd::memory::{MemoryStore, DEFAULT_SIMILARITY_THRESHOLD};

/// Memory store over a fresh in-memory index with the offline embedder.
pub fn test_store() -> MemoryStore {
    MemoryStore::new(
        Box::new(HashedEmbeddingProvider::new()),
        Box::new(SqliteVecIndex::open_in_memory().unwrap()),
        DEFAULT_SIMILARITY_THRESHOLD,
    )
}

/// Memory store persisted at `db_path`.
pub fn file_store(db_path: &Path) -> MemoryStore {
    MemoryStore::new(
        Box::new(HashedEmbeddingProvider::new()),
        Box::new(SqliteVecIndex::open(db_path).unwrap()),
        DEFAULT_SIMILARITY_THRESHOLD,
    )
}

/// Config with every path under `dir` and the offline embedder.
pub fn test_config(dir: &Path) -> MemorydConfig {
    let mut config = MemorydConfig::default();
    config.embedding.provider = "hashed".into();
    config.storage.db_path = dir.join("memory.db").to_string_lossy().into_owned();
    config.daemon.socket_path = dir.join("memoryd.sock").to_string_lossy().into_owned();
    config.daemon.pid_file = dir.join("memoryd.pid").to_string_lossy().into_owned();
    config
}

pub fn test_paths(dir: &Path) -> RuntimePaths {
    RuntimePaths::from_config(&test_config(dir))
}
