//! Application configuration

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_with::serde_as;
use tracing::warn;

use crate::errors::AisTrackerError;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub stream: StreamConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub api: Option<ApiConfig>,
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct StreamConfig {
    /// Provider API key; required, checked before any connection attempt
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_stream_url")]
    pub url: String,
    /// Restrict ingestion to tanker-class vessels (ship type 80-89)
    #[serde(default = "default_tanker_only")]
    pub tanker_only: bool,
    /// Optional explicit watch set; empty means "accept all"
    #[serde(default)]
    pub watch_mmsi: Vec<u32>,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: Duration,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_ping_interval")]
    pub ping_interval: Duration,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: Duration,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_backoff_floor")]
    pub backoff_floor: Duration,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_backoff_ceiling")]
    pub backoff_ceiling: Duration,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub listen: SocketAddr,
}

fn default_stream_url() -> String {
    "wss://stream.aisstream.io/v0/stream".to_string()
}

fn default_tanker_only() -> bool {
    true
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_ping_interval() -> Duration {
    Duration::from_secs(25)
}

fn default_ping_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_backoff_floor() -> Duration {
    Duration::from_secs(5)
}

fn default_backoff_ceiling() -> Duration {
    Duration::from_secs(60)
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(
                Environment::with_prefix("AISTRACKER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("stream.watch_mmsi"),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Semantic checks after deserialization
    pub fn validate(&self) -> Result<(), AisTrackerError> {
        if self.stream.api_key.trim().is_empty() {
            return Err(AisTrackerError::MissingApiKey);
        }
        self.database.validate()?;
        Ok(())
    }
}

impl DatabaseConfig {
    pub fn validate(&self) -> Result<(), AisTrackerError> {
        if self.path.to_str().unwrap_or("").is_empty() {
            return Err(AisTrackerError::ConfigError(ConfigError::Message(
                "database path cannot be empty".to_string(),
            )));
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                self.ensure_directory_exists(parent)?;
            }
        }
        Ok(())
    }

    fn ensure_directory_exists(&self, dir: &Path) -> Result<(), AisTrackerError> {
        if !dir.exists() {
            warn!("Database directory does not exist, attempting to create it");
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}
