//! Application configuration management.
//!
//! This module handles loading and saving the application configuration
//! (API location, storage backend, last used username) and resolving the
//! API base URL from the environment.
//!
//! Configuration is stored at `~/.config/havenadmin/config.json`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::DEFAULT_REQUEST_TIMEOUT_SECS;

/// Application name used for config/storage directory paths
const APP_NAME: &str = "havenadmin";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Backend address used in development and as the last resort.
pub const DEFAULT_DEV_API_URL: &str = "http://localhost:8090";

/// Path the API is mounted under when served from the site's own origin.
const RELATIVE_API_PATH: &str = "/api";

const ENV_API_URL: &str = "HAVEN_API_URL";
const ENV_MODE: &str = "HAVEN_ENV";
const ENV_API_HOST: &str = "HAVEN_API_HOST";
const ENV_API_PORT: &str = "HAVEN_API_PORT";
const ENV_API_SCHEME: &str = "HAVEN_API_SCHEME";
const ENV_SITE_ORIGIN: &str = "HAVEN_SITE_ORIGIN";

/// Where the session token is kept between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// JSON files in the data directory
    #[default]
    File,
    /// OS keychain (the cookie copy still goes to a file)
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_url: Option<String>,
    pub site_origin: Option<String>,
    #[serde(default)]
    pub storage: StorageBackend,
    pub request_timeout_secs: Option<u64>,
    pub last_username: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the persisted token copies
    pub fn storage_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    /// API location settings from the environment, with this config's
    /// values filling anything the environment leaves unset.
    pub fn api_settings(&self) -> ApiSettings {
        let mut settings = ApiSettings::from_env();
        if settings.override_url.is_none() {
            settings.override_url = self.api_url.clone();
        }
        if settings.site_origin.is_none() {
            settings.site_origin = self.site_origin.clone();
        }
        settings
    }
}

/// Inputs for resolving the API base URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiSettings {
    /// Used verbatim when present
    pub override_url: Option<String>,
    pub development: bool,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub scheme: Option<String>,
    pub site_origin: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl ApiSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = non_empty(lookup(ENV_API_PORT)).and_then(|p| match p.parse::<u16>() {
            Ok(port) => Some(port),
            Err(_) => {
                warn!(value = %p, "Ignoring invalid {}", ENV_API_PORT);
                None
            }
        });

        Self {
            override_url: non_empty(lookup(ENV_API_URL)),
            development: non_empty(lookup(ENV_MODE))
                .map(|mode| mode.eq_ignore_ascii_case("development"))
                .unwrap_or(false),
            host: non_empty(lookup(ENV_API_HOST)),
            port,
            scheme: non_empty(lookup(ENV_API_SCHEME)),
            site_origin: non_empty(lookup(ENV_SITE_ORIGIN)),
        }
    }

    /// Resolve the base URL, first match wins:
    /// override, development endpoint, host/port, site origin + `/api`,
    /// then the development endpoint with a warning.
    pub fn resolve(&self) -> String {
        if let Some(ref url) = self.override_url {
            return url.trim_end_matches('/').to_string();
        }
        if self.development {
            return DEFAULT_DEV_API_URL.to_string();
        }
        if let Some(ref host) = self.host {
            let scheme = self.scheme.as_deref().unwrap_or("https");
            return match self.port {
                Some(port) => format!("{}://{}:{}", scheme, host, port),
                None => format!("{}://{}", scheme, host),
            };
        }
        if let Some(ref origin) = self.site_origin {
            return format!("{}{}", origin.trim_end_matches('/'), RELATIVE_API_PATH);
        }
        warn!("{} not set, using default {}", ENV_API_URL, DEFAULT_DEV_API_URL);
        DEFAULT_DEV_API_URL.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> ApiSettings {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiSettings::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_override_wins() {
        let s = settings(&[
            ("HAVEN_API_URL", "https://api.example.com/"),
            ("HAVEN_ENV", "development"),
            ("HAVEN_API_HOST", "ignored"),
        ]);
        assert_eq!(s.resolve(), "https://api.example.com");
    }

    #[test]
    fn test_development_mode() {
        let s = settings(&[("HAVEN_ENV", "Development"), ("HAVEN_API_HOST", "ignored")]);
        assert_eq!(s.resolve(), "http://localhost:8090");
    }

    #[test]
    fn test_host_port_composition() {
        let s = settings(&[("HAVEN_API_HOST", "backend"), ("HAVEN_API_PORT", "8090"), ("HAVEN_API_SCHEME", "http")]);
        assert_eq!(s.resolve(), "http://backend:8090");

        let s = settings(&[("HAVEN_API_HOST", "api.example.com"), ("HAVEN_API_PORT", "nope")]);
        assert_eq!(s.port, None);
        assert_eq!(s.resolve(), "https://api.example.com");
    }

    #[test]
    fn test_site_origin_relative_path() {
        let s = settings(&[("HAVEN_SITE_ORIGIN", "https://survey.example.com/")]);
        assert_eq!(s.resolve(), "https://survey.example.com/api");
    }

    #[test]
    fn test_fallback_and_blank_values() {
        let s = settings(&[("HAVEN_API_URL", "   "), ("HAVEN_ENV", "production")]);
        assert_eq!(s.override_url, None);
        assert_eq!(s.resolve(), DEFAULT_DEV_API_URL);
    }

    #[test]
    fn test_config_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let missing = Config::load_from(&path).unwrap();
        assert_eq!(missing.storage, StorageBackend::File);
        assert_eq!(missing.request_timeout(), Duration::from_secs(30));

        let config = Config {
            api_url: Some("https://api.example.com".into()),
            storage: StorageBackend::Keyring,
            request_timeout_secs: Some(5),
            last_username: Some("alice".into()),
            ..Default::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.storage, StorageBackend::Keyring);
        assert_eq!(loaded.last_username.as_deref(), Some("alice"));
        assert_eq!(loaded.request_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_storage_backend_parses_lowercase() {
        let config: Config = serde_json::from_str(r#"{"storage": "keyring"}"#).unwrap();
        assert_eq!(config.storage, StorageBackend::Keyring);
    }
}
