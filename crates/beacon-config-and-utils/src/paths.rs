//! File system paths used by Beacon hosts.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Manages file system paths for Beacon.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for runtime files (~/.beacon)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.beacon`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(".beacon"),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.beacon).
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (~/.beacon/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the identity store file path (~/.beacon/identity.json).
    pub fn identity_file(&self) -> PathBuf {
        self.base_dir.join("identity.json")
    }

    /// Get the logs directory (~/.beacon/logs).
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Get the JSONL log file path (~/.beacon/logs/beacon.jsonl).
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join("beacon.jsonl")
    }

    /// Get the default export download directory (~/.beacon/exports).
    pub fn exports_dir(&self) -> PathBuf {
        self.base_dir.join("exports")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        std::fs::create_dir_all(self.exports_dir())?;
        Ok(())
    }
}
