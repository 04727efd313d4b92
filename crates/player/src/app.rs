//! Wiring of configuration, collaborators, cache and scheduler.

use std::sync::Arc;

use anyhow::{Context, Result};
use signage_client::{HttpContentFetcher, HttpImageSource};
use signage_core::{
    AppConfig, ContentStore, DiskBackend, DiskTier, FileDiskTier, PlaybackStatus, Scheduler, SqliteDiskTier,
    TieredCache,
};
use tokio::sync::watch;

/// Subdirectory of `cache_dir` used by the file backend.
pub const FILES_DIR: &str = "images";

/// Database file inside `cache_dir` used by the SQLite backend.
pub const SQLITE_FILE: &str = "cache.sqlite";

/// Open the disk tier selected by `config.disk_backend`.
pub async fn open_disk_tier(config: &AppConfig) -> Result<Arc<dyn DiskTier>> {
    let disk: Arc<dyn DiskTier> = match config.disk_backend {
        DiskBackend::Files => {
            let root = config.cache_dir.join(FILES_DIR);
            Arc::new(FileDiskTier::open(&root).await.with_context(|| format!("opening {}", root.display()))?)
        }
        DiskBackend::Sqlite => {
            let path = config.cache_dir.join(SQLITE_FILE);
            Arc::new(SqliteDiskTier::open(&path).await.with_context(|| format!("opening {}", path.display()))?)
        }
    };
    Ok(disk)
}

/// A fully wired player.
pub struct Player {
    scheduler: Scheduler,
}

impl Player {
    pub async fn build(config: &AppConfig) -> Result<Self> {
        let disk = open_disk_tier(config).await?;
        let images = Arc::new(HttpImageSource::from_config(config).context("building image source")?);
        let fetcher = Arc::new(HttpContentFetcher::new(config).context("building content fetcher")?);

        let cache = TieredCache::new(images, disk, config.memory_limits(), config.prefetch_concurrency);
        let scheduler = Scheduler::new(fetcher, Arc::new(ContentStore::new()), cache)
            .with_weather_interval(config.weather_interval());

        tracing::info!(
            api = %config.api_base_url,
            backend = ?config.disk_backend,
            cache_dir = %config.cache_dir.display(),
            "player built"
        );
        Ok(Self { scheduler })
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Start the scheduler and follow its status until `shutdown` resolves.
    ///
    /// Shutdown is honored during the initial load as well.
    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) -> Result<()> {
        tokio::pin!(shutdown);

        let started = tokio::select! {
            biased;
            _ = &mut shutdown => None,
            started = self.scheduler.start() => Some(started),
        };

        match started {
            None => tracing::info!("shutdown requested during initial load"),
            Some(started) => {
                started?;
                let follow = follow_status(&self.scheduler, self.scheduler.subscribe());
                tokio::select! {
                    _ = &mut shutdown => tracing::info!("shutdown requested"),
                    _ = follow => {}
                }
            }
        }

        self.scheduler.stop().await;
        let stats = self.scheduler.cache().stats();
        tracing::info!(
            memory_hits = stats.memory_hits,
            disk_hits = stats.disk_hits,
            network_fetches = stats.network_fetches,
            disk_faults = stats.disk_faults,
            "player stopped"
        );
        Ok(())
    }
}

/// Log every screen change and resolve its image through the cache, standing
/// in for a renderer.
async fn follow_status(scheduler: &Scheduler, mut rx: watch::Receiver<PlaybackStatus>) {
    let mut shown: Option<i64> = None;
    while rx.changed().await.is_ok() {
        let status = rx.borrow_and_update().clone();
        if status.current_screen_id == shown {
            continue;
        }
        shown = status.current_screen_id;

        let Some(screen) = scheduler.current_screen() else {
            tracing::info!(phase = ?status.phase, offline = status.offline, "no screen to show");
            continue;
        };

        let image_bytes = match screen.image_key.as_deref() {
            Some(key) => match scheduler.cache().resolve(key).await {
                Ok(bytes) => Some(bytes.len()),
                Err(e) => {
                    tracing::warn!(key, error = %e, "image unavailable");
                    None
                }
            },
            None => None,
        };

        tracing::info!(
            screen_id = screen.id,
            index = status.current_index,
            title = %screen.title,
            screen_type = ?screen.screen_type,
            image_bytes,
            paused = status.paused,
            offline = status.offline,
            temperature = status.weather.map(|w| w.rounded_temperature()),
            "showing screen"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signage_core::Phase;

    fn config(dir: &std::path::Path, backend: DiskBackend) -> AppConfig {
        AppConfig { cache_dir: dir.to_path_buf(), disk_backend: backend, ..Default::default() }
    }

    #[tokio::test]
    async fn test_file_backend_layout() {
        let dir = tempfile::tempdir().unwrap();
        let disk = open_disk_tier(&config(dir.path(), DiskBackend::Files)).await.unwrap();

        disk.write("https://cdn.example.com/a.png", b"png").await.unwrap();
        assert!(dir.path().join(FILES_DIR).is_dir());
        assert_eq!(disk.keys().await.unwrap(), vec!["https://cdn.example.com/a.png".to_string()]);
    }

    #[tokio::test]
    async fn test_sqlite_backend_layout() {
        let dir = tempfile::tempdir().unwrap();
        let disk = open_disk_tier(&config(dir.path(), DiskBackend::Sqlite)).await.unwrap();

        disk.write("k", b"v").await.unwrap();
        assert!(dir.path().join(SQLITE_FILE).is_file());
    }

    #[tokio::test]
    async fn test_shutdown_before_initial_load_completes() {
        let dir = tempfile::tempdir().unwrap();
        let player = Player::build(&config(dir.path(), DiskBackend::Files)).await.unwrap();

        player.run_until(std::future::ready(())).await.unwrap();

        assert_eq!(player.scheduler().status().phase, Phase::Uninitialized);
        assert_eq!(player.scheduler().cache().stats().network_fetches, 0);
    }

    #[tokio::test]
    async fn test_build_does_not_start() {
        let dir = tempfile::tempdir().unwrap();
        let player = Player::build(&config(dir.path(), DiskBackend::Files)).await.unwrap();
        assert_eq!(player.scheduler().status().phase, Phase::Uninitialized);
    }
}
