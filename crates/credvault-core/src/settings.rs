//! Application settings management
//!
//! Stores non-sensitive configuration in a plain JSON file.
//! Settings are accessible even when the vault is locked.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Result, VaultError};

/// Current settings file version
const SETTINGS_VERSION: u32 = 1;

/// Auto-lock policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoLockSettings {
    /// Whether auto-lock is enabled at all
    pub enabled: bool,
    /// Minutes of inactivity before locking (0 = never)
    pub timeout_minutes: u32,
}

impl Default for AutoLockSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_minutes: 30,
        }
    }
}

impl AutoLockSettings {
    /// Auto-lock switched off
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            timeout_minutes: 0,
        }
    }

    /// Enabled with the given timeout
    pub fn after_minutes(timeout_minutes: u32) -> Self {
        Self {
            enabled: true,
            timeout_minutes,
        }
    }

    /// Inactivity timeout, or `None` when auto-lock is off
    pub fn timeout(&self) -> Option<Duration> {
        if self.enabled && self.timeout_minutes > 0 {
            Some(Duration::from_secs(u64::from(self.timeout_minutes) * 60))
        } else {
            None
        }
    }
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Settings file version
    pub version: u32,
    /// Auto-lock policy
    #[serde(default)]
    pub auto_lock: AutoLockSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            auto_lock: AutoLockSettings::default(),
        }
    }
}

/// Settings manager
pub struct SettingsManager {
    settings_file: PathBuf,
    settings: Settings,
}

impl SettingsManager {
    /// Create a new settings manager
    pub fn new(storage_dir: &Path) -> Self {
        let settings_file = storage_dir.join("settings.json");
        let settings = Self::load_from_file(&settings_file).unwrap_or_else(|e| {
            warn!("Ignoring unreadable settings file: {}", e);
            Settings::default()
        });

        Self {
            settings_file,
            settings,
        }
    }

    /// Load settings from file
    fn load_from_file(path: &Path) -> Result<Settings> {
        if !path.exists() {
            debug!("No settings file found, using defaults");
            return Ok(Settings::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&contents)?;
        debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Save settings to file
    pub async fn save(&self) -> Result<()> {
        let contents = serde_json::to_string_pretty(&self.settings)?;

        // Write atomically using temp file
        let temp_path = self.settings_file.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents).await?;
        tokio::fs::rename(&temp_path, &self.settings_file).await?;

        debug!("Saved settings to {:?}", self.settings_file);
        Ok(())
    }

    /// Get the auto-lock policy
    pub fn auto_lock(&self) -> AutoLockSettings {
        self.settings.auto_lock
    }

    /// Set the auto-lock policy and save
    pub async fn set_auto_lock(&mut self, auto_lock: AutoLockSettings) -> Result<()> {
        self.settings.auto_lock = auto_lock;
        self.save().await
    }

    /// Reset settings to defaults and delete settings file
    pub async fn reset(&mut self) -> Result<()> {
        self.settings = Settings::default();

        if self.settings_file.exists() {
            tokio::fs::remove_file(&self.settings_file)
                .await
                .map_err(|e| VaultError::Storage(e.to_string()))?;
        }

        Ok(())
    }
}
