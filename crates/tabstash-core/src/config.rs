//! Stash configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use tabstash_tabs::NormalizationRule;

use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the database file
    pub database_path: PathBuf,
    /// Days a trashed tab is kept; 0 deletes tabs without trashing them
    pub trash_retention_days: u32,
    /// Backup generations to keep; negative keeps all
    pub backup_keep_count: i64,
    pub backup_interval_hours: u64,
    /// Upper bound on one maintenance pass
    pub maintenance_timeout_secs: u64,
    /// Rules deriving a tab's canonical URL
    pub normalization_rules: Vec<NormalizationRule>,
}

impl Config {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            database_path: data_dir.join("tabstash.db"),
            trash_retention_days: 30,
            backup_keep_count: 10,
            backup_interval_hours: 24,
            maintenance_timeout_secs: 60,
            normalization_rules: Vec::new(),
        }
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join("TabStash"))
            .unwrap_or_else(|| PathBuf::from(".tabstash"))
    }

    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::data_dir())
    }
}

/// Per-user data directory: `%LOCALAPPDATA%`, `~/Library/Application Support`
/// or `$XDG_DATA_HOME` (`~/.local/share`).
mod dirs {
    use std::env;
    use std::path::PathBuf;

    fn home_join(suffix: &str) -> Option<PathBuf> {
        env::var_os("HOME").map(|home| PathBuf::from(home).join(suffix))
    }

    pub fn data_local_dir() -> Option<PathBuf> {
        if cfg!(target_os = "windows") {
            env::var_os("LOCALAPPDATA").map(PathBuf::from)
        } else if cfg!(target_os = "macos") {
            home_join("Library/Application Support")
        } else if cfg!(target_os = "linux") {
            env::var_os("XDG_DATA_HOME")
                .map(PathBuf::from)
                .or_else(|| home_join(".local/share"))
        } else {
            None
        }
    }
}
