// User settings (settings.json)

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Largest stock or threshold value accepted from operator input.
pub const DEFAULT_MAX_ITEMS: u32 = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Machine table CSV used when `--table` is not given
    #[serde(rename = "store.path")]
    pub store_path: Option<String>,

    /// Reconciliation config TOML used when `--config` is not given
    #[serde(rename = "recon.configPath")]
    pub recon_config_path: Option<String>,

    /// `tracing` filter directive, e.g. "info" or "vendstock_recon=debug"
    #[serde(rename = "log.filter")]
    pub log_filter: Option<String>,

    #[serde(rename = "limits.maxItems")]
    pub max_items: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_path: None,
            recon_config_path: None,
            log_filter: None,
            max_items: DEFAULT_MAX_ITEMS,
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vendstock");
        config_dir.join("settings.json")
    }

    /// Get the config file path for display
    pub fn config_path_display() -> String {
        Self::config_path().to_string_lossy().to_string()
    }

    /// Read settings from `path`. A missing file yields defaults; lines
    /// starting with `//` are treated as comments.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| format!("error reading {}: {e}", path.display()))?;

        // Strip comments (lines starting with //)
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");

        if cleaned.trim().is_empty() {
            return Ok(Self::default());
        }

        let settings: Self = serde_json::from_str(&cleaned)
            .map_err(|e| format!("error parsing {}: {e}", path.display()))?;
        tracing::debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }
}
