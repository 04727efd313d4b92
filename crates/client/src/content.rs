//! Content API and weather API client.
//!
//! ### Endpoints
//!
//! - `GET {api_base_url}/screens`: JSON array of screens
//! - `GET {api_base_url}/settings`: JSON settings object
//! - `GET {weather_base_url}/v1/forecast`: Open-Meteo current conditions,
//!   queried with `current=temperature_2m,weather_code` in Fahrenheit
//!
//! When `enforce_active_window` is set, screens whose active window excludes
//! the local wall-clock time are dropped before they are returned.

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use reqwest::{Client, Url};
use serde::Deserialize;
use signage_core::{AppConfig, ContentFetcher, FetchError, Screen, Settings, Weather};

use crate::fetch::{self, HttpConfig, join_path, parse_base};

/// Raw Open-Meteo forecast response.
#[derive(Debug, Deserialize)]
pub struct ForecastResponse {
    pub current: CurrentConditions,
}

/// `current` block of an Open-Meteo response.
#[derive(Debug, Deserialize)]
pub struct CurrentConditions {
    pub temperature_2m: f64,
    pub weather_code: i32,
}

impl From<ForecastResponse> for Weather {
    fn from(response: ForecastResponse) -> Self {
        Weather { temperature_fahrenheit: response.current.temperature_2m, weather_code: response.current.weather_code }
    }
}

/// Drop screens whose active window does not contain `now`.
pub fn filter_active_window(screens: Vec<Screen>, now: NaiveDateTime) -> Vec<Screen> {
    screens.into_iter().filter(|s| s.window.contains(now)).collect()
}

/// reqwest-backed [`ContentFetcher`].
#[derive(Debug, Clone)]
pub struct HttpContentFetcher {
    http: Client,
    screens_url: Url,
    settings_url: Url,
    forecast_url: Url,
    enforce_active_window: bool,
}

impl HttpContentFetcher {
    /// Build a fetcher from the loaded configuration.
    pub fn new(config: &AppConfig) -> Result<Self, FetchError> {
        let http = fetch::build_client(&HttpConfig::from(config))?;
        let api = parse_base(&config.api_base_url)?;
        let weather = parse_base(&config.weather_base_url)?;

        let mut forecast_url = join_path(&weather, &["v1", "forecast"])?;
        forecast_url
            .query_pairs_mut()
            .append_pair("latitude", &config.latitude.to_string())
            .append_pair("longitude", &config.longitude.to_string())
            .append_pair("current", "temperature_2m,weather_code")
            .append_pair("temperature_unit", "fahrenheit");

        Ok(Self {
            http,
            screens_url: join_path(&api, &["screens"])?,
            settings_url: join_path(&api, &["settings"])?,
            forecast_url,
            enforce_active_window: config.enforce_active_window,
        })
    }
}

#[async_trait]
impl ContentFetcher for HttpContentFetcher {
    async fn fetch_screens(&self) -> Result<Vec<Screen>, FetchError> {
        let screens: Vec<Screen> = fetch::get_json(&self.http, self.screens_url.clone()).await?;
        let total = screens.len();

        let screens =
            if self.enforce_active_window { filter_active_window(screens, Local::now().naive_local()) } else { screens };

        tracing::debug!(total, kept = screens.len(), "screens fetched");
        Ok(screens)
    }

    async fn fetch_settings(&self) -> Result<Settings, FetchError> {
        fetch::get_json(&self.http, self.settings_url.clone()).await
    }

    async fn fetch_weather(&self) -> Result<Weather, FetchError> {
        let response: ForecastResponse = fetch::get_json(&self.http, self.forecast_url.clone()).await?;
        Ok(Weather::from(response))
    }
}
