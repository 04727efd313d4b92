//! Remote collaborators consumed by the scheduler and the cache.

use async_trait::async_trait;
use bytes::Bytes;

use crate::FetchError;
use crate::model::{Screen, Settings, Weather};

/// Remote source of screens, settings and weather.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch_screens(&self) -> Result<Vec<Screen>, FetchError>;

    async fn fetch_settings(&self) -> Result<Settings, FetchError>;

    async fn fetch_weather(&self) -> Result<Weather, FetchError>;
}

/// Network source for image bytes, used by the cache on a double miss.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch(&self, key: &str) -> Result<Bytes, FetchError>;
}
