//! Cache key validation and storage-name encoding.
//!
//! Raw keys are usually URLs and may hold `/`, `?`, `:` and other characters
//! that are unsafe in file names. The disk tier stores them under the URL-safe
//! unpadded base64 of the key, which is reversible.

use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

use crate::Error;

/// Longest encoded run in a single path component produced by [`storage_path`].
pub const MAX_SEGMENT_LEN: usize = 200;

/// Extension of the final component. `.` is outside the base64 URL alphabet, so
/// an entry file never shares a name with another key's directory.
pub const ENTRY_EXTENSION: &str = "blob";

/// Reject keys that can never resolve.
///
/// # Errors
///
/// Returns `Error::InvalidKey` for empty or whitespace-only keys and keys
/// containing control characters.
pub fn validate_key(key: &str) -> Result<(), Error> {
    if key.trim().is_empty() {
        return Err(Error::InvalidKey("key is empty".into()));
    }
    if key.chars().any(char::is_control) {
        return Err(Error::InvalidKey(format!("key contains control characters: {key:?}")));
    }
    Ok(())
}

/// Reversible storage name for a key.
pub fn encode_key(key: &str) -> String {
    URL_SAFE_NO_PAD.encode(key.as_bytes())
}

/// Inverse of [`encode_key`].
///
/// # Errors
///
/// Returns `Error::InvalidKey` if `encoded` is not a valid encoding.
pub fn decode_key(encoded: &str) -> Result<String, Error> {
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| Error::InvalidKey(format!("bad storage name {encoded}: {e}")))?;
    String::from_utf8(bytes).map_err(|e| Error::InvalidKey(format!("bad storage name {encoded}: {e}")))
}

/// Relative path for a key, split into components of at most
/// [`MAX_SEGMENT_LEN`] characters so long URLs stay under file-name limits.
pub fn storage_path(key: &str) -> PathBuf {
    let encoded = encode_key(key);
    let mut path = PathBuf::new();
    // base64 output is ASCII, so byte chunks are char boundaries.
    for chunk in encoded.as_bytes().chunks(MAX_SEGMENT_LEN) {
        path.push(String::from_utf8_lossy(chunk).as_ref());
    }
    path.set_extension(ENTRY_EXTENSION);
    path
}

/// Recover the key from a path produced by [`storage_path`].
///
/// # Errors
///
/// Returns `Error::InvalidKey` if the joined components are not a valid encoding.
pub fn key_from_storage_path(relative: &Path) -> Result<String, Error> {
    if relative.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
        return Err(Error::InvalidKey(format!("not a cache entry: {}", relative.display())));
    }
    let joined: String = relative
        .with_extension("")
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    decode_key(&joined)
}

/// SHA-256 hex digest of a payload, stored alongside SQLite blobs.
pub fn content_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("https://cdn.example.com/cat.jpg").is_ok());
        assert!(matches!(validate_key(""), Err(Error::InvalidKey(_))));
        assert!(matches!(validate_key("   "), Err(Error::InvalidKey(_))));
        assert!(matches!(validate_key("a\nb"), Err(Error::InvalidKey(_))));
    }

    #[test]
    fn test_encoding_is_filesystem_safe_and_reversible() {
        let key = "https://cdn.example.com/images/cat.jpg?w=800&h=600#top";
        let encoded = encode_key(key);
        assert!(encoded.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(decode_key(&encoded).unwrap(), key);
    }

    #[test]
    fn test_long_keys_split_into_segments() {
        let key = format!("https://cdn.example.com/{}", "a".repeat(600));
        let path = storage_path(&key);
        assert!(path.components().count() > 1);
        assert!(path.components().all(|c| c.as_os_str().len() <= MAX_SEGMENT_LEN + ENTRY_EXTENSION.len() + 1));
        assert_eq!(key_from_storage_path(&path).unwrap(), key);
    }

    #[test]
    fn test_entry_never_collides_with_longer_key_directory() {
        let long = "k".repeat(400);
        let prefix = "k".repeat(150);
        let long_path = storage_path(&long);
        let prefix_path = storage_path(&prefix);
        let first_dir = long_path.components().next().unwrap().as_os_str().to_owned();
        assert_ne!(prefix_path.as_os_str(), first_dir.as_os_str());
        assert_eq!(key_from_storage_path(&prefix_path).unwrap(), prefix);
    }

    #[test]
    fn test_non_entry_paths_rejected() {
        assert!(key_from_storage_path(Path::new("abc.tmp")).is_err());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode_key("not*base64"), Err(Error::InvalidKey(_))));
    }

    #[test]
    fn test_digest_format() {
        let digest = content_digest(b"meow");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(digest, content_digest(b"meow"));
        assert_ne!(digest, content_digest(b"purr"));
    }
}
