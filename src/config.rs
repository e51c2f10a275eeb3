//! Application settings for shelfparse.
//!
//! Handles loading and saving settings from the platform-specific config
//! directory. Per-source options (domains) live in a separate file managed
//! by [`crate::source_config::FileConfigStore`].

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application name used for config directory.
const APP_NAME: &str = "Shelfparse";

/// Default settings filename.
const CONFIG_FILENAME: &str = "config.toml";

/// Per-source options filename.
const SOURCES_FILENAME: &str = "sources.toml";

/// Main settings structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// HTTP transport settings.
    pub http: HttpSettings,
}

/// HTTP transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// User agent sent with every request.
    pub user_agent: String,

    /// Request timeout in seconds.
    pub timeout_sec: u64,

    /// Delay before each request in seconds.
    pub delay_between_requests_sec: f64,

    /// Netscape cookie file to preload, for sources that need a login.
    pub cookie_file: Option<PathBuf>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            timeout_sec: 30,
            delay_between_requests_sec: 0.0,
            cookie_file: None,
        }
    }
}

impl Settings {
    /// Returns the platform-specific config directory path.
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|p| p.join(APP_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Returns the full path to the settings file.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join(CONFIG_FILENAME))
    }

    /// Returns the full path to the per-source options file.
    pub fn sources_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join(SOURCES_FILENAME))
    }

    /// Loads settings from the default location.
    ///
    /// If the file doesn't exist, creates a default one.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Loads settings from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let settings = Settings::default();
            settings.save_to(path)?;
            return Ok(settings);
        }

        let content = std::fs::read_to_string(path)?;
        let settings: Settings =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        Ok(settings)
    }

    /// Saves settings to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validates the settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.timeout_sec == 0 {
            return Err(ConfigError::ParseError(
                "http.timeout_sec must be greater than 0".to_string(),
            ));
        }

        if !self.http.delay_between_requests_sec.is_finite()
            || self.http.delay_between_requests_sec < 0.0
        {
            return Err(ConfigError::ParseError(
                "http.delay_between_requests_sec must be a non-negative number".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.http.timeout_sec, 30);
        assert_eq!(settings.http.delay_between_requests_sec, 0.0);
        assert!(settings.http.cookie_file.is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut settings = Settings::default();
        settings.http.timeout_sec = 5;
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.http.timeout_sec, 5);
        assert_eq!(loaded.http.user_agent, settings.http.user_agent);
    }

    #[test]
    fn test_missing_file_creates_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let loaded = Settings::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(loaded.http.timeout_sec, 30);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[http]\ndelay_between_requests_sec = 1.5\n").unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.http.delay_between_requests_sec, 1.5);
        assert_eq!(loaded.http.timeout_sec, 30);
    }

    #[test]
    fn test_validation() {
        let mut settings = Settings::default();
        settings.http.timeout_sec = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.http.delay_between_requests_sec = -1.0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[http\n").unwrap();

        let err = Settings::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }
}
