//! URL handling for image keys and API endpoints.

use url::Url;

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<UrlError> for signage_core::FetchError {
    fn from(err: UrlError) -> Self {
        signage_core::FetchError::InvalidUrl(err.to_string())
    }
}

/// Canonicalize an absolute image URL.
///
/// Trims whitespace, defaults the scheme to `https`, lowercases the host and
/// drops the fragment. The query string is kept as-is.
pub fn canonicalize(input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let mut parsed = Url::parse(&url_str).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    ensure_http(&parsed)?;

    if let Some(host) = parsed.host_str() {
        let host = host.to_lowercase();
        parsed
            .set_host(Some(&host))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Parse a configured base URL such as `http://localhost:8080/api`.
pub fn parse_base(input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }
    let parsed = Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    ensure_http(&parsed)?;
    Ok(parsed)
}

/// Append path segments to `base`, keeping whatever path it already has.
///
/// `join_path("http://h/api", &["screens"])` is `http://h/api/screens`, which
/// `Url::join` would turn into `http://h/screens`.
pub fn join_path(base: &Url, segments: &[&str]) -> Result<Url, UrlError> {
    let mut url = base.clone();
    url.set_fragment(None);
    url.path_segments_mut()
        .map_err(|_| UrlError::InvalidUrl(format!("{base} cannot be a base")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Turn an image key into a request URL.
///
/// Keys starting with `/` are served by the content API host; anything else
/// is treated as an absolute URL.
pub fn image_url(base: &Url, key: &str) -> Result<Url, UrlError> {
    let trimmed = key.trim();
    if trimmed.starts_with('/') && !trimmed.starts_with("//") {
        let mut url = base.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
        url.set_fragment(None);
        return Ok(url);
    }
    canonicalize(trimmed)
}

fn ensure_http(url: &Url) -> Result<(), UrlError> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }
}
