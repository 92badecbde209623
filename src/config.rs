//! Application configuration loaded from a TOML file
//!
//! Every field has a default, so an empty or missing file yields a working
//! configuration pointed at a local development server.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "FIELDCAM_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "./fieldcam.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub remote: RemoteConfig,
    pub storage: StorageConfig,
    pub sync: SyncConfig,
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            api_token: None,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: PathBuf,
    pub display_cache_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("./data/fieldcam.db"),
            display_cache_dir: PathBuf::from("./data/display-cache"),
        }
    }
}

/// Tunables of the sync engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// Items attempted concurrently per batch
    pub batch_size: usize,
    pub max_retry_count: u32,
    pub max_queue_size: usize,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Periodic cycle interval of the background driver
    pub interval_secs: u64,
    /// Attempts per chunk of a chunked upload
    pub chunk_max_attempts: u32,
    pub chunk_concurrency: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: 3,
            max_retry_count: 5,
            max_queue_size: 500,
            initial_delay_ms: 1_000,
            max_delay_ms: 300_000,
            interval_secs: 30,
            chunk_max_attempts: 3,
            chunk_concurrency: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    pub probe_interval_secs: u64,
    /// Report a reachable network as cellular (metered) instead of Wi-Fi
    pub metered: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            probe_interval_secs: 15,
            metered: false,
        }
    }
}

impl AppConfig {
    /// Parses a configuration file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            log::info!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolves the config path from the first CLI argument or the environment
    pub fn resolve_path(arg: Option<String>) -> PathBuf {
        arg.or_else(|| std::env::var(CONFIG_ENV).ok())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.sync.batch_size == 0 {
            return Err(AppError::Config("sync.batch_size must be at least 1".into()));
        }
        if self.sync.chunk_concurrency == 0 {
            return Err(AppError::Config(
                "sync.chunk_concurrency must be at least 1".into(),
            ));
        }
        if self.sync.initial_delay_ms > self.sync.max_delay_ms {
            return Err(AppError::Config(
                "sync.initial_delay_ms must not exceed sync.max_delay_ms".into(),
            ));
        }
        if self.remote.base_url.is_empty() {
            return Err(AppError::Config("remote.base_url is required".into()));
        }
        Ok(())
    }
}
