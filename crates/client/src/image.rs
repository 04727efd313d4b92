//! Network tier of the image cache.

use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Url};
use signage_core::{AppConfig, FetchError, ImageSource};

use crate::fetch::{self, HttpConfig, image_url, parse_base};

/// Fetches image bytes over HTTP(S).
///
/// Absolute keys are canonicalized and fetched as-is; keys starting with `/`
/// are resolved against the content API host.
#[derive(Debug, Clone)]
pub struct HttpImageSource {
    http: Client,
    base: Url,
    max_bytes: u64,
}

impl HttpImageSource {
    pub fn new(api_base_url: &str, config: &HttpConfig) -> Result<Self, FetchError> {
        let base = parse_base(api_base_url)?;
        let http = fetch::build_client(config)?;
        Ok(Self { http, base, max_bytes: config.max_bytes })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, FetchError> {
        Self::new(&config.api_base_url, &HttpConfig::from(config))
    }

    /// The URL a key is fetched from.
    pub fn url_for(&self, key: &str) -> Result<Url, FetchError> {
        Ok(image_url(&self.base, key)?)
    }
}

#[async_trait]
impl ImageSource for HttpImageSource {
    async fn fetch(&self, key: &str) -> Result<Bytes, FetchError> {
        let start = Instant::now();
        let url = self.url_for(key)?;

        let response = fetch::get(&self.http, url.clone()).await?;
        let bytes = fetch::read_limited(response, self.max_bytes).await?;

        tracing::debug!(url = %url, bytes = bytes.len(), elapsed_ms = start.elapsed().as_millis() as u64, "image fetched");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;

    use super::*;

    fn source(server: &MockServer, max_bytes: u64) -> HttpImageSource {
        let config = HttpConfig { max_bytes, ..Default::default() };
        HttpImageSource::new(&server.url("/api"), &config).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_absolute_key() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/cdn/mochi.jpg").header("user-agent", "signage-player/0.1");
                then.status(200).header("content-type", "image/jpeg").body(b"jpeg-bytes");
            })
            .await;

        let images = source(&server, 1024);
        let bytes = images.fetch(&server.url("/cdn/mochi.jpg#hero")).await.unwrap();

        assert_eq!(bytes, Bytes::from_static(b"jpeg-bytes"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_relative_key_uses_api_host() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/uploads/logo.png");
                then.status(200).body(b"png");
            })
            .await;

        let images = source(&server, 1024);
        assert_eq!(images.fetch("/uploads/logo.png").await.unwrap(), Bytes::from_static(b"png"));
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/gone.png");
                then.status(410);
            })
            .await;

        let images = source(&server, 1024);
        assert_eq!(images.fetch("/gone.png").await, Err(FetchError::Http { status: 410 }));
    }

    #[tokio::test]
    async fn test_oversized_image_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/huge.png");
                then.status(200).body(vec![0u8; 4096]);
            })
            .await;

        let images = source(&server, 1024);
        assert!(matches!(images.fetch("/huge.png").await, Err(FetchError::TooLarge { limit: 1024, .. })));
    }

    #[tokio::test]
    async fn test_invalid_key_never_hits_network() {
        let server = MockServer::start_async().await;
        let images = source(&server, 1024);
        assert!(matches!(images.fetch("ftp://example.com/a.png").await, Err(FetchError::InvalidUrl(_))));
    }
}
