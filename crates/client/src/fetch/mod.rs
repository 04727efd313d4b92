//! Shared HTTP plumbing for the remote collaborators.
//!
//! ### Client
//! - One `reqwest::Client` per collaborator, rustls, gzip/brotli/deflate
//! - Configured User-Agent and per-request timeout
//! - Max redirects: 5
//!
//! ### Responses
//! - Non-2xx is `FetchError::Http { status }`
//! - Bodies are read chunk by chunk and rejected once they pass `max_bytes`

pub mod url;

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use signage_core::{AppConfig, FetchError};

pub use self::url::{UrlError, canonicalize, image_url, join_path, parse_base};

/// Max redirects followed for any request.
pub const MAX_REDIRECTS: usize = 5;

/// Body limit for JSON API responses.
pub const MAX_JSON_BYTES: u64 = 2 * 1024 * 1024;

/// Configuration for an HTTP collaborator.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// User agent string (default: "signage-player/0.1")
    pub user_agent: String,

    /// Request timeout (default: 15s)
    pub timeout: Duration,

    /// Maximum response body size in bytes (default: 20MB)
    pub max_bytes: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { user_agent: "signage-player/0.1".to_string(), timeout: Duration::from_secs(15), max_bytes: 20 * 1024 * 1024 }
    }
}

impl From<&AppConfig> for HttpConfig {
    fn from(config: &AppConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), timeout: config.timeout(), max_bytes: config.max_image_bytes }
    }
}

/// Build a `reqwest::Client` for `config`.
pub fn build_client(config: &HttpConfig) -> Result<Client, FetchError> {
    Client::builder()
        .user_agent(&config.user_agent)
        .timeout(config.timeout)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .use_rustls_tls()
        .gzip(true)
        .brotli(true)
        .deflate(true)
        .build()
        .map_err(|e| FetchError::Network(format!("failed to build HTTP client: {e}")))
}

/// Map a transport error onto the collaborator taxonomy.
pub fn map_reqwest_error(err: &reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else if err.is_decode() {
        FetchError::Parse(err.to_string())
    } else if let Some(status) = err.status() {
        FetchError::Http { status: status.as_u16() }
    } else {
        FetchError::Network(err.to_string())
    }
}

/// GET `url`, returning the response if the status is 2xx.
pub async fn get(client: &Client, url: Url) -> Result<Response, FetchError> {
    let response = client.get(url).send().await.map_err(|e| map_reqwest_error(&e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Http { status: status.as_u16() });
    }

    Ok(response)
}

/// Read the whole body, failing as soon as it exceeds `limit` bytes.
pub async fn read_limited(mut response: Response, limit: u64) -> Result<Bytes, FetchError> {
    if let Some(len) = response.content_length()
        && len > limit
    {
        return Err(FetchError::TooLarge { size: len, limit });
    }

    let mut body = BytesMut::new();
    while let Some(chunk) = response.chunk().await.map_err(|e| map_reqwest_error(&e))? {
        let size = (body.len() + chunk.len()) as u64;
        if size > limit {
            return Err(FetchError::TooLarge { size, limit });
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body.freeze())
}

/// GET `url` and decode a JSON body.
pub async fn get_json<T: DeserializeOwned>(client: &Client, url: Url) -> Result<T, FetchError> {
    let response = get(client, url).await?;
    let bytes = read_limited(response, MAX_JSON_BYTES).await?;
    serde_json::from_slice(&bytes).map_err(|e| FetchError::Parse(e.to_string()))
}
