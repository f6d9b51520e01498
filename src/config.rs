// Settings file support.
// A flat JSON object at the per-user config path, loaded at startup and
// written in full on save; a missing file silently falls back to defaults.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::github::OwnerKind;

/// Persisted settings: the access token and default UI values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub token: Option<String>,
    pub owner_kind: OwnerKind,
    pub identity: String,
    pub pattern: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            token: None,
            owner_kind: OwnerKind::Organization,
            identity: String::new(),
            pattern: "*".to_string(),
        }
    }
}

/// Default settings path (~/.config/gh-bulk/config.json on Linux).
pub fn settings_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "gh-bulk").map(|dirs| dirs.config_dir().join("config.json"))
}

impl Settings {
    /// Load settings, falling back to defaults when the file does not exist.
    /// A present but malformed file is an error rather than silent data loss.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Write the full settings object, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
