//! HTTP collaborators for the signage player.
//!
//! This crate provides the reqwest-backed content/weather fetcher and image
//! source consumed by `signage-core`, plus URL handling for image keys.

pub mod content;
pub mod fetch;
pub mod image;

pub use content::{HttpContentFetcher, filter_active_window};
pub use fetch::{HttpConfig, UrlError, canonicalize};
pub use image::HttpImageSource;
