use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::migrate::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_ATTEMPTS, DEFAULT_TEMP_PREFIX, DEFAULT_WORKERS};

/// Persisted defaults for `smig`, stored as `~/.storemigrate/config.json`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub workers: usize,
    pub max_attempts: usize,
    pub chunk_size: usize,
    pub backoff_ms: u64,
    pub request_timeout_secs: u64,
    /// Directory for spill files; system temp dir when unset.
    pub temp_dir: Option<PathBuf>,
    pub temp_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            backoff_ms: 100,
            request_timeout_secs: 30,
            temp_dir: None,
            temp_prefix: DEFAULT_TEMP_PREFIX.to_string(),
        }
    }
}

/// `~/.storemigrate`, created when missing.
pub fn app_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot find user's home dir"))?;
    let dir = home.join(".".to_owned() + env!("CARGO_PKG_NAME"));
    if !dir.exists() {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    Ok(dir)
}

pub fn logs_dir() -> Result<PathBuf> {
    Ok(app_dir()?.join("logs"))
}

impl Config {
    /// Load the user config, writing defaults on first run.
    pub fn init() -> Result<Self> {
        let path = app_dir()?.join("config.json");
        if !path.exists() {
            let config = Config::default();
            config.save_to(&path)?;
            return Ok(config);
        }
        Config::read_from(&path)
    }

    pub fn read_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&s).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(app_dir()?.join("config.json"))
    }
}
