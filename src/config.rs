use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct MemorydConfig {
    pub daemon: DaemonConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DaemonConfig {
    pub socket_path: String,
    pub pid_file: String,
    pub log_level: String,
    /// Seconds to wait for a client's request frame. `0` waits forever.
    pub request_timeout_secs: u64,
    /// Run store/retrieve in-process when no daemon is listening.
    pub fallback: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub cache_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Candidates at or above this distance are dropped. Lower is stricter.
    pub similarity_threshold: f64,
    pub default_top_k: usize,
    pub max_top_k: usize,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        let dir = default_memoryd_dir();
        Self {
            socket_path: dir.join("memoryd.sock").to_string_lossy().into_owned(),
            pid_file: dir.join("memoryd.pid").to_string_lossy().into_owned(),
            log_level: "info".into(),
            request_timeout_secs: 30,
            fallback: true,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_memoryd_dir()
            .join("memory.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_memoryd_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "local".into(),
            model: "all-MiniLM-L6-v2".into(),
            cache_dir,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.8,
            default_top_k: 1,
            max_top_k: 50,
        }
    }
}

/// Returns `~/.memoryd/`
pub fn default_memoryd_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".memoryd")
}

/// Returns the default config file path: `~/.memoryd/config.toml`
pub fn default_config_path() -> PathBuf {
    default_memoryd_dir().join("config.toml")
}

impl MemorydConfig {
    /// Load from the default location, or from `path` when one is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from(p),
            None => Self::load_from(default_config_path()),
        }
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            MemorydConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MEMORYD_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("MEMORYD_SOCKET") {
            self.daemon.socket_path = val;
        }
        if let Ok(val) = std::env::var("MEMORYD_PID_FILE") {
            self.daemon.pid_file = val;
        }
        if let Ok(val) = std::env::var("MEMORYD_LOG_LEVEL") {
            self.daemon.log_level = val;
        }
        if std::env::var("MEMORYD_DEBUG").is_ok_and(|v| v.eq_ignore_ascii_case("true")) {
            self.daemon.log_level = "debug".into();
        }
    }

    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    pub fn resolved_socket_path(&self) -> PathBuf {
        expand_tilde(&self.daemon.socket_path)
    }

    pub fn resolved_pid_path(&self) -> PathBuf {
        expand_tilde(&self.daemon.pid_file)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .expect("home directory must exist")
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}
