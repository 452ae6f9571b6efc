//! Client configuration.
//!
//! Read from `<config_dir>/sumdays/config.json`, then overridden by the
//! `SUMDAYS_API_URL` and `SUMDAYS_DB_PATH` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

pub const API_URL_ENV: &str = "SUMDAYS_API_URL";
pub const DB_PATH_ENV: &str = "SUMDAYS_DB_PATH";

const DEFAULT_PUSH_INTERVAL_SECS: u64 = 3 * 60 * 60;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const fn default_push_interval_secs() -> u64 {
    DEFAULT_PUSH_INTERVAL_SECS
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Sumdays server, e.g. `https://api.sumdays.app`
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default = "default_push_interval_secs")]
    pub push_interval_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            database_path: None,
            push_interval_secs: DEFAULT_PUSH_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl AppConfig {
    /// `<config_dir>/sumdays/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("sumdays").join("config.json"))
    }

    /// `<data_dir>/sumdays/sumdays.db`
    pub fn default_database_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("sumdays").join("sumdays.db"))
    }

    /// Load the config file (if any) and apply environment overrides
    pub fn load() -> Result<Self> {
        let config = match Self::default_path() {
            Some(path) => Self::load_from(&path)?,
            None => Self::default(),
        };
        let config = config.with_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load from a file; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(error) => return Err(error.into()),
        };

        let config: Self = serde_json::from_str(&raw)
            .map_err(|error| Error::Config(format!("{}: {error}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Apply `SUMDAYS_API_URL` / `SUMDAYS_DB_PATH` from `lookup`
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = normalize_text_option(lookup(API_URL_ENV)) {
            self.api_base_url = Some(url);
        }
        if let Some(path) = normalize_text_option(lookup(DB_PATH_ENV)) {
            self.database_path = Some(PathBuf::from(path));
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(url) = normalize_text_option(self.api_base_url.clone()) {
            if !is_http_url(&url) {
                return Err(Error::Config(
                    "api_base_url must include http:// or https://".to_string(),
                ));
            }
        }
        if self.push_interval_secs == 0 {
            return Err(Error::Config(
                "push_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Config(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Server base URL without trailing slash
    pub fn api_base_url(&self) -> Option<String> {
        normalize_text_option(self.api_base_url.clone())
            .map(|url| url.trim_end_matches('/').to_string())
    }

    /// Configured database path, falling back to the platform data dir
    pub fn database_path(&self) -> Result<PathBuf> {
        self.database_path
            .clone()
            .or_else(Self::default_database_path)
            .ok_or_else(|| Error::Config("could not determine a data directory".to_string()))
    }

    pub const fn push_interval(&self) -> Duration {
        Duration::from_secs(self.push_interval_secs)
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = tempdir().unwrap();
        let config = AppConfig::load_from(&tmp.path().join("config.json")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.push_interval(), Duration::from_secs(10_800));
    }

    #[test]
    fn partial_file_fills_defaults() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{"api_base_url": "https://api.example.com/"}"#).unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.api_base_url().as_deref(), Some("https://api.example.com"));
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{"api_url": "https://api.example.com"}"#).unwrap();

        let error = AppConfig::load_from(&path).unwrap_err();
        assert!(error.to_string().contains("unknown field"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let config = AppConfig {
            api_base_url: Some("api.example.com".to_string()),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());

        let config = AppConfig {
            push_interval_secs: 0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn environment_overrides_file_values() {
        let config = AppConfig {
            api_base_url: Some("https://file.example.com".to_string()),
            ..AppConfig::default()
        }
        .with_overrides(|name| match name {
            API_URL_ENV => Some("https://env.example.com".to_string()),
            DB_PATH_ENV => Some("  ".to_string()),
            _ => None,
        });

        assert_eq!(config.api_base_url().as_deref(), Some("https://env.example.com"));
        assert_eq!(config.database_path, None);
    }

    #[test]
    fn save_then_load() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("config.json");
        let config = AppConfig {
            database_path: Some(tmp.path().join("journal.db")),
            push_interval_secs: 900,
            ..AppConfig::default()
        };

        config.save_to(&path).unwrap();
        assert_eq!(AppConfig::load_from(&path).unwrap(), config);
    }
}
