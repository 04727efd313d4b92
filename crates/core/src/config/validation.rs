//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - a base URL is empty or not http(s)
    /// - coordinates are out of range
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - any cache ceiling or interval is 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_http_url(&self.api_base_url) {
            return Err(invalid("api_base_url", "must be an http(s) URL"));
        }
        if !is_http_url(&self.weather_base_url) {
            return Err(invalid("weather_base_url", "must be an http(s) URL"));
        }

        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(invalid("latitude", "must be within [-90, 90]"));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(invalid("longitude", "must be within [-180, 180]"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.max_image_bytes == 0 {
            return Err(invalid("max_image_bytes", "must be greater than 0"));
        }
        if self.max_image_bytes > 100 * 1024 * 1024 {
            return Err(invalid("max_image_bytes", "must not exceed 100MB"));
        }

        if self.memory_max_entries == 0 {
            return Err(invalid("memory_max_entries", "must be greater than 0"));
        }
        if self.memory_max_bytes == 0 {
            return Err(invalid("memory_max_bytes", "must be greater than 0"));
        }
        if self.memory_max_bytes < self.max_image_bytes {
            tracing::warn!(
                memory_max_bytes = self.memory_max_bytes,
                max_image_bytes = self.max_image_bytes,
                "memory tier is smaller than the largest accepted image; oversized images will be served from disk"
            );
        }

        if self.prefetch_concurrency == 0 || self.prefetch_concurrency > 64 {
            return Err(invalid("prefetch_concurrency", "must be within 1..=64"));
        }

        if self.weather_interval_secs == 0 {
            return Err(invalid("weather_interval_secs", "must be greater than 0"));
        }

        Ok(())
    }
}
