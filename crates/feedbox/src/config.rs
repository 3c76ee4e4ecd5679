//! Configuration management for feedbox.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::remote::RestSettings;
use crate::storage::DEFAULT_QUEUE_KEY;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "feedbox";

/// Default queue database file name.
const DATABASE_FILE_NAME: &str = "queue.db";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `FEEDBOX_`)
/// 2. TOML config file at `~/.config/feedbox/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote store configuration.
    pub remote: RemoteConfig,
    /// Pending queue configuration.
    pub queue: QueueConfig,
    /// Connectivity detection configuration.
    pub connectivity: ConnectivityConfig,
}

/// Remote store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the hosted data store.
    pub url: String,
    /// API key for the store, if it requires one.
    pub api_key: Option<String>,
    /// Table holding feedback rows.
    pub table: String,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

/// Pending queue configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Path to the queue database file.
    /// Defaults to `~/.local/share/feedbox/queue.db`
    pub database_path: Option<PathBuf>,
    /// Namespace key the queue is stored under.
    pub key: String,
}

/// How the initial connectivity state is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityMode {
    /// Probe the remote host; assume online if it cannot be probed.
    #[default]
    Auto,
    /// Always treat the network as reachable.
    Online,
    /// Always treat the network as unreachable.
    Offline,
}

/// Connectivity detection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    /// Detection mode.
    pub mode: ConnectivityMode,
    /// Timeout for a single reachability probe in milliseconds.
    pub probe_timeout_ms: u64,
    /// Interval between probes when watching, in milliseconds.
    pub probe_interval_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:54321".to_string(),
            api_key: None,
            table: "feedback".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            database_path: None, // Will be resolved to default at runtime
            key: DEFAULT_QUEUE_KEY.to_string(),
        }
    }
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            mode: ConnectivityMode::Auto,
            probe_timeout_ms: 2_000,
            probe_interval_ms: 15_000,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("FEEDBOX_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        self.remote_url()?;

        if self.remote.table.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "remote.table must not be empty".to_string(),
            });
        }

        if self.remote.timeout_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "remote.timeout_ms must be greater than 0".to_string(),
            });
        }

        if self.queue.key.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "queue.key must not be empty".to_string(),
            });
        }

        if self.connectivity.probe_timeout_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "connectivity.probe_timeout_ms must be greater than 0".to_string(),
            });
        }

        if self.connectivity.probe_interval_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "connectivity.probe_interval_ms must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Parse the remote base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not valid.
    pub fn remote_url(&self) -> Result<Url> {
        Url::parse(&self.remote.url).map_err(|e| Error::ConfigValidation {
            message: format!("invalid remote.url '{}': {e}", self.remote.url),
        })
    }

    /// Build the settings for the REST remote store.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote URL is not valid.
    pub fn rest_settings(&self) -> Result<RestSettings> {
        Ok(RestSettings {
            base_url: self.remote_url()?,
            api_key: self.remote.api_key.clone(),
            table: self.remote.table.clone(),
            timeout: self.remote_timeout(),
        })
    }

    /// Get the queue database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.queue
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the remote request timeout as a Duration.
    #[must_use]
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote.timeout_ms)
    }

    /// Get the probe timeout as a Duration.
    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.connectivity.probe_timeout_ms)
    }

    /// Get the probe interval as a Duration.
    #[must_use]
    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.connectivity.probe_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.remote.table, "feedback");
        assert!(config.remote.api_key.is_none());
        assert_eq!(config.queue.key, DEFAULT_QUEUE_KEY);
        assert_eq!(config.connectivity.mode, ConnectivityMode::Auto);
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_bad_url() {
        let mut config = Config::default();
        config.remote.url = "not a url".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("remote.url"));
    }

    #[test]
    fn test_validate_empty_table() {
        let mut config = Config::default();
        config.remote.table = "  ".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("remote.table"));
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = Config::default();
        config.remote.timeout_ms = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("timeout_ms"));
    }

    #[test]
    fn test_validate_empty_queue_key() {
        let mut config = Config::default();
        config.queue.key = String::new();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("queue.key"));
    }

    #[test]
    fn test_validate_zero_probe_settings() {
        let mut config = Config::default();
        config.connectivity.probe_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.connectivity.probe_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_database_path_default() {
        let path = Config::default().database_path();
        assert!(path.to_string_lossy().contains("queue.db"));
        assert!(path.to_string_lossy().contains("feedbox"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.queue.database_path = Some(PathBuf::from("/custom/path/queue.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/queue.sqlite")
        );
    }

    #[test]
    fn test_rest_settings() {
        let mut config = Config::default();
        config.remote.url = "https://demo.example.co".to_string();
        config.remote.api_key = Some("anon".to_string());

        let settings = config.rest_settings().unwrap();
        assert_eq!(settings.base_url.host_str(), Some("demo.example.co"));
        assert_eq!(settings.api_key.as_deref(), Some("anon"));
        assert_eq!(settings.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_durations() {
        let config = Config::default();
        assert_eq!(config.probe_timeout(), Duration::from_secs(2));
        assert_eq!(config.probe_interval(), Duration::from_secs(15));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("feedbox"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[remote]
url = "https://demo.example.co"
table = "responses"

[queue]
key = "kiosk-1"

[connectivity]
mode = "offline"
"#,
        )
        .unwrap();

        let config = Config::load_from(Some(path)).unwrap();
        assert_eq!(config.remote.url, "https://demo.example.co");
        assert_eq!(config.remote.table, "responses");
        assert_eq!(config.remote.timeout_ms, 10_000);
        assert_eq!(config.queue.key, "kiosk-1");
        assert_eq!(config.connectivity.mode, ConnectivityMode::Offline);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[remote]\ntimeout_ms = 0\n").unwrap();

        let err = Config::load_from(Some(path)).unwrap_err();
        assert!(matches!(err, Error::ConfigValidation { .. }));
    }

    #[test]
    fn test_connectivity_mode_deserialize() {
        let json = r#"{"mode": "online", "probe_timeout_ms": 100, "probe_interval_ms": 200}"#;
        let connectivity: ConnectivityConfig = serde_json::from_str(json).unwrap();
        assert_eq!(connectivity.mode, ConnectivityMode::Online);
        assert_eq!(connectivity.probe_timeout_ms, 100);
    }

    #[test]
    fn test_config_serialize() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        assert!(json.contains("probe_interval_ms"));
        assert!(json.contains("database_path"));
    }
}
