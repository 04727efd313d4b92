//! Core types and shared functionality for the signage player.
//!
//! This crate provides:
//! - Screen, settings and weather models
//! - The content store and rotation scheduler
//! - The two-tier image cache (memory LRU over a file or SQLite disk tier)
//! - Unified error types
//! - Configuration loading

pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod scheduler;
pub mod source;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use cache::{DiskTier, FileDiskTier, PrefetchReport, SqliteDiskTier, TieredCache};
pub use config::{AppConfig, DiskBackend};
pub use error::{Error, FetchError};
pub use model::{Screen, Settings, Weather};
pub use scheduler::{Phase, PlaybackStatus, Scheduler};
pub use source::{ContentFetcher, ImageSource};
pub use store::{ContentSnapshot, ContentStore};
