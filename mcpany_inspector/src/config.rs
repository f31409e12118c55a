//! Inspector configuration management

use crate::pipeline::{StoreOrdering, DEFAULT_CAPACITY};
use crate::transport::Backoff;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Invalid server URL: {0}")]
    InvalidServerUrl(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("Detail path must contain an {{id}} placeholder: {0}")]
    DetailPath(String),
}

/// Get the configuration directory path
pub fn config_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mcpany")
    }

    #[cfg(not(target_os = "windows"))]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".mcpany")
    }
}

/// Get the config file path
pub fn config_file() -> PathBuf {
    config_dir().join("inspector.yml")
}

/// Log file, under [`config_dir`], used while the TUI owns the terminal
pub const LOG_FILE_NAME: &str = "inspector.log";

/// How the live feed is obtained
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    #[default]
    Websocket,
    Poll,
}

/// Main configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend URL (default: http://localhost:50050)
    pub server_url: String,

    /// Sent as X-API-Key when set
    pub api_key: Option<String>,

    pub transport: TransportKind,

    pub ws_path: String,
    pub list_path: String,

    /// Detail endpoint; `{id}` is replaced with the event id
    pub detail_path: String,

    /// Maximum events held in memory
    pub capacity: usize,
    pub ordering: StoreOrdering,

    pub poll_interval_ms: u64,

    /// Request lightweight records from the list endpoint
    pub summary_list: bool,

    pub reconnect_delay_ms: u64,
    pub reconnect_max_delay_ms: u64,

    /// 1 keeps the reconnect delay fixed
    pub reconnect_factor: u32,
    pub reconnect_jitter: bool,

    pub request_timeout_ms: u64,

    /// Only frames whose `source` equals this are ingested
    pub source_filter: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:50050".to_string(),
            api_key: None,
            transport: TransportKind::default(),
            ws_path: "/api/v1/ws/traces".to_string(),
            list_path: "/api/v1/traces".to_string(),
            detail_path: "/api/v1/traces/{id}".to_string(),
            capacity: DEFAULT_CAPACITY,
            ordering: StoreOrdering::default(),
            poll_interval_ms: 2000,
            summary_list: false,
            reconnect_delay_ms: 3000,
            reconnect_max_delay_ms: 30_000,
            reconnect_factor: 1,
            reconnect_jitter: false,
            request_timeout_ms: 10_000,
            source_filter: None,
        }
    }
}

impl Config {
    /// Load config from the default file, then apply environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&config_file())?;
        config.apply_env();
        Ok(config)
    }

    /// Load config from a specific file; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// MCPANY_SERVER_URL and MCPANY_API_KEY take precedence over the file
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("MCPANY_SERVER_URL") {
            if !url.trim().is_empty() {
                self.server_url = url;
            }
        }
        if let Ok(key) = std::env::var("MCPANY_API_KEY") {
            if !key.trim().is_empty() {
                self.api_key = Some(key);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.server_url.starts_with("http://") || self.server_url.starts_with("https://")) {
            return Err(ConfigError::InvalidServerUrl(self.server_url.clone()));
        }
        if self.capacity == 0 {
            return Err(ConfigError::Zero("capacity"));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Zero("poll_interval_ms"));
        }
        if self.reconnect_delay_ms == 0 {
            return Err(ConfigError::Zero("reconnect_delay_ms"));
        }
        if self.reconnect_factor == 0 {
            return Err(ConfigError::Zero("reconnect_factor"));
        }
        if !self.detail_path.contains("{id}") {
            return Err(ConfigError::DetailPath(self.detail_path.clone()));
        }
        Ok(())
    }

    /// Get WebSocket URL of the live feed from the server URL
    pub fn websocket_url(&self) -> String {
        let ws_scheme = if self.server_url.starts_with("https://") {
            "wss"
        } else {
            "ws"
        };
        let host = self
            .server_url
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/');
        format!("{}://{}{}", ws_scheme, host, self.ws_path)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::exponential(
            Duration::from_millis(self.reconnect_delay_ms),
            Duration::from_millis(self.reconnect_max_delay_ms.max(self.reconnect_delay_ms)),
            self.reconnect_factor,
        )
        .with_jitter(self.reconnect_jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.capacity, 500);
        assert_eq!(config.backoff().delay(0), Duration::from_millis(3000));
        assert_eq!(config.backoff().delay(5), Duration::from_millis(3000));
    }

    #[test]
    fn test_websocket_url() {
        let mut config = Config::default();
        assert_eq!(config.websocket_url(), "ws://localhost:50050/api/v1/ws/traces");

        config.server_url = "https://gateway.example.com/".to_string();
        assert_eq!(
            config.websocket_url(),
            "wss://gateway.example.com/api/v1/ws/traces"
        );
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: Config = serde_yaml::from_str(
            "server_url: http://10.0.0.2:8080\ntransport: poll\ncapacity: 50\nordering: oldest_first\n",
        )
        .unwrap();

        assert_eq!(config.server_url, "http://10.0.0.2:8080");
        assert_eq!(config.transport, TransportKind::Poll);
        assert_eq!(config.capacity, 50);
        assert_eq!(config.ordering, StoreOrdering::OldestFirst);
        assert_eq!(config.poll_interval_ms, 2000);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = Config {
            capacity: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Zero("capacity"))));

        let config = Config {
            server_url: "localhost:50050".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidServerUrl(_))
        ));

        let config = Config {
            detail_path: "/api/v1/traces".to_string(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::DetailPath(_))));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("mcpany-inspector-does-not-exist.yml");
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.list_path, "/api/v1/traces");
    }
}
