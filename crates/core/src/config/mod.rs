//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SIGNAGE_*)
//! 2. TOML config file (if SIGNAGE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cache::MemoryLimits;

mod validation;

pub use validation::ConfigError;

/// Which disk tier implementation backs the image cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiskBackend {
    /// One file per key under `cache_dir`.
    Files,
    /// A single SQLite database under `cache_dir`.
    Sqlite,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SIGNAGE_*)
/// 2. TOML config file (if SIGNAGE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the content API serving `/screens` and `/settings`.
    ///
    /// Set via SIGNAGE_API_BASE_URL environment variable.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Base URL of the Open-Meteo compatible weather API.
    ///
    /// Set via SIGNAGE_WEATHER_BASE_URL environment variable.
    #[serde(default = "default_weather_base_url")]
    pub weather_base_url: String,

    /// Latitude used for weather lookups.
    #[serde(default = "default_latitude")]
    pub latitude: f64,

    /// Longitude used for weather lookups.
    #[serde(default = "default_longitude")]
    pub longitude: f64,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via SIGNAGE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via SIGNAGE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes accepted for a single image.
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: u64,

    /// Directory holding the disk tier.
    ///
    /// Set via SIGNAGE_CACHE_DIR environment variable.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Disk tier implementation.
    #[serde(default = "default_disk_backend")]
    pub disk_backend: DiskBackend,

    /// Memory tier entry-count ceiling.
    #[serde(default = "default_memory_max_entries")]
    pub memory_max_entries: usize,

    /// Memory tier byte ceiling.
    #[serde(default = "default_memory_max_bytes")]
    pub memory_max_bytes: u64,

    /// Maximum number of concurrent resolves during a prefetch batch.
    #[serde(default = "default_prefetch_concurrency")]
    pub prefetch_concurrency: usize,

    /// Weather refresh period in seconds.
    #[serde(default = "default_weather_interval_secs")]
    pub weather_interval_secs: u64,

    /// Drop screens outside their active window before they reach the store.
    #[serde(default = "default_true")]
    pub enforce_active_window: bool,
}

fn default_api_base_url() -> String {
    "http://localhost:8080/api".into()
}

fn default_weather_base_url() -> String {
    "https://api.open-meteo.com".into()
}

fn default_latitude() -> f64 {
    40.7128
}

fn default_longitude() -> f64 {
    -74.0060
}

fn default_user_agent() -> String {
    "signage-player/0.1".into()
}

fn default_timeout_ms() -> u64 {
    15_000
}

fn default_max_image_bytes() -> u64 {
    20 * 1024 * 1024
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./signage-cache")
}

fn default_disk_backend() -> DiskBackend {
    DiskBackend::Files
}

fn default_memory_max_entries() -> usize {
    64
}

fn default_memory_max_bytes() -> u64 {
    128 * 1024 * 1024
}

fn default_prefetch_concurrency() -> usize {
    8
}

fn default_weather_interval_secs() -> u64 {
    600
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            weather_base_url: default_weather_base_url(),
            latitude: default_latitude(),
            longitude: default_longitude(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_image_bytes: default_max_image_bytes(),
            cache_dir: default_cache_dir(),
            disk_backend: default_disk_backend(),
            memory_max_entries: default_memory_max_entries(),
            memory_max_bytes: default_memory_max_bytes(),
            prefetch_concurrency: default_prefetch_concurrency(),
            weather_interval_secs: default_weather_interval_secs(),
            enforce_active_window: true,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Weather refresh period as Duration.
    pub fn weather_interval(&self) -> Duration {
        Duration::from_secs(self.weather_interval_secs)
    }

    /// Memory tier ceilings.
    pub fn memory_limits(&self) -> MemoryLimits {
        MemoryLimits { max_entries: self.memory_max_entries, max_bytes: self.memory_max_bytes }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SIGNAGE_`
    /// 2. TOML file from `SIGNAGE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SIGNAGE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SIGNAGE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.api_base_url, "http://localhost:8080/api");
        assert_eq!(config.user_agent, "signage-player/0.1");
        assert_eq!(config.timeout_ms, 15_000);
        assert_eq!(config.cache_dir, PathBuf::from("./signage-cache"));
        assert_eq!(config.disk_backend, DiskBackend::Files);
        assert_eq!(config.memory_max_entries, 64);
        assert_eq!(config.prefetch_concurrency, 8);
        assert_eq!(config.weather_interval_secs, 600);
        assert!(config.enforce_active_window);
    }

    #[test]
    fn test_durations() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(15_000));
        assert_eq!(config.weather_interval(), Duration::from_secs(600));
    }

    #[test]
    fn test_memory_limits() {
        let config = AppConfig { memory_max_entries: 3, memory_max_bytes: 1024, ..Default::default() };
        let limits = config.memory_limits();
        assert_eq!(limits.max_entries, 3);
        assert_eq!(limits.max_bytes, 1024);
    }

    #[test]
    fn test_toml_layer_overrides_defaults() {
        let toml = r#"
            api_base_url = "https://cafe.example.com/api"
            disk_backend = "sqlite"
            memory_max_entries = 10
        "#;
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::string(toml))
            .extract()
            .unwrap();
        assert_eq!(config.api_base_url, "https://cafe.example.com/api");
        assert_eq!(config.disk_backend, DiskBackend::Sqlite);
        assert_eq!(config.memory_max_entries, 10);
        assert_eq!(config.timeout_ms, 15_000);
    }
}
