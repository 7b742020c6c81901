use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Key-value settings file holding the data-migration marker and
    /// app-level preferences, outside the database.
    #[serde(default = "default_settings_path")]
    pub settings_path: PathBuf,

    /// Directory for short-lived session flags (reset-pending marker).
    #[serde(default = "default_session_dir")]
    pub session_dir: PathBuf,

    #[serde(default)]
    pub backup: BackupConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Refuse to import backup documents with more photos than this.
    #[serde(default = "default_max_photos")]
    pub max_photos: usize,
}

fn default_max_photos() -> usize {
    100
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            max_photos: default_max_photos(),
        }
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("poselog")
        .join("poselog.db")
}

fn default_settings_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("poselog")
        .join("settings.json")
}

fn default_session_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("poselog")
        .join("session")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            settings_path: default_settings_path(),
            session_dir: default_session_dir(),
            backup: BackupConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path())
    }

    pub fn load_from(config_path: PathBuf) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            // Create default config
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("poselog")
            .join("config.toml")
    }
}
