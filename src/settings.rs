//! Settings module.
//! Manages I/O for settings.json (endpoint, model, sampling, window flags).
//! Uses serde for JSON serialization.
//! Falls back to the hardcoded defaults wholesale when the file is missing or malformed.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::AssistError;

const SETTINGS_FILE: &str = "settings.json";
const APP_DIR: &str = "screenask";

/// The full settings record. Every field is required on disk: a file missing any
/// of them counts as malformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub api_key: String,
    pub api_host: String,
    pub model: String,
    pub temperature: f64,
    pub top_p: f64,
    pub presence_penalty: f64,
    pub frequency_penalty: f64,
    pub minimize_on_close: bool,
    pub always_on_top: bool,
    pub start_on_boot: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_host: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            temperature: 0.7,
            top_p: 1.0,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
            minimize_on_close: true,
            always_on_top: true,
            start_on_boot: false,
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/screenask/settings.json`, or `./settings.json` when the
    /// platform has no config directory.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join(APP_DIR).join(SETTINGS_FILE))
            .unwrap_or_else(|| PathBuf::from(SETTINGS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the persisted record, or the defaults on any read/parse failure.
    pub fn load(&self) -> Settings {
        match self.try_load() {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("{e}. Using defaults.");
                Settings::default()
            }
        }
    }

    fn try_load(&self) -> Result<Settings, AssistError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::info!("No settings file at {:?}, using defaults", self.path);
                return Ok(Settings::default());
            }
            Err(e) => {
                return Err(AssistError::SettingsLoad(format!("{}: {e}", self.path.display())));
            }
        };

        serde_json::from_str(&contents)
            .map_err(|e| AssistError::SettingsLoad(format!("{}: {e}", self.path.display())))
    }

    /// Overwrites the file with `settings`. No merge with what is on disk, no range checks.
    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }

        let json = serde_json::to_string(settings).context("Failed to serialize settings")?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))?;

        log::info!("Settings saved to {:?}", self.path);
        Ok(())
    }

    /// Hardcoded defaults. Nothing is written until `save`.
    pub fn restore_defaults(&self) -> Settings {
        Settings::default()
    }
}
