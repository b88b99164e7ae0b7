//! Configuration loading
//!
//! Resolution priority: environment variables override values from the TOML
//! config file, which overrides compiled defaults. A missing config file is
//! not an error; the defaults stand in until the embedder supplies one.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Default seconds between steady-state refresh cycles
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Subsystem configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL for per-table CSV exports; the table id and export query are
    /// appended per request
    pub sheet_base_url: String,
    /// Write endpoint accepting fire-and-forget action requests
    pub api_url: String,
    /// Logical table identifiers
    pub accounts_table: String,
    pub assignments_table: String,
    pub audit_table: String,
    /// Seconds between refresh cycles
    pub poll_interval_secs: u64,
    /// Override for the trust cache location; platform data dir when absent
    pub trust_store_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sheet_base_url: "https://docs.google.com/spreadsheets/d".to_string(),
            api_url: String::new(),
            accounts_table: String::new(),
            assignments_table: String::new(),
            audit_table: String::new(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            trust_store_path: None,
        }
    }
}

impl Config {
    /// Load configuration with env → TOML → defaults priority.
    ///
    /// `FIELDOPS_CONFIG` names an explicit config file; otherwise the
    /// platform config dir is consulted. `FIELDOPS_API_URL` and
    /// `FIELDOPS_SHEET_BASE_URL` override individual values.
    pub fn load() -> Config {
        let mut config = match config_file_path() {
            Some(path) if path.exists() => match Self::load_from(&path) {
                Ok(c) => c,
                Err(e) => {
                    warn!("Config file {} unreadable ({}), using defaults", path.display(), e);
                    Config::default()
                }
            },
            _ => Config::default(),
        };

        if let Ok(url) = std::env::var("FIELDOPS_API_URL") {
            config.api_url = url;
        }
        if let Ok(url) = std::env::var("FIELDOPS_SHEET_BASE_URL") {
            config.sheet_base_url = url;
        }

        config
    }

    /// Parse configuration from a specific TOML file.
    pub fn load_from(path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {e}")))
    }

    /// Where the trust cache lives: explicit override, else the platform
    /// data dir, else a directory-local fallback.
    pub fn trust_store_path(&self) -> PathBuf {
        if let Some(path) = &self.trust_store_path {
            return path.clone();
        }
        dirs::data_local_dir()
            .map(|d| d.join("fieldops").join("trust.json"))
            .unwrap_or_else(|| PathBuf::from("./fieldops_data/trust.json"))
    }
}

/// Config file path: `FIELDOPS_CONFIG` env var, else the platform config dir.
fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("FIELDOPS_CONFIG") {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|d| d.join("fieldops").join("config.toml"))
}
