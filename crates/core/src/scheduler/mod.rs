//! Rotation scheduler.
//!
//! Owns three background loops that share one cancellation token:
//!
//! - advance: sleeps for the current screen's duration, then moves to the next screen
//! - content refresh: polls screens + settings, swaps the store, hands image keys to a background prefetch
//! - weather refresh: polls current conditions
//!
//! Manual navigation and pause toggles bump a generation counter and signal the
//! advance loop to restart its timer. An auto advance only applies if the
//! generation it slept under is still current, so a manual advance racing a
//! timer wake never moves the index twice.
//!
//! Prefetch never runs inline with a loop: a slow image host delays neither
//! the rotation nor the next content poll. A newer snapshot supersedes any
//! prefetch still running for the previous one.

mod status;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, Notify, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::Error;
use crate::cache::TieredCache;
use crate::model::{Screen, Settings, default_display_duration};
use crate::source::ContentFetcher;
use crate::store::{ContentSnapshot, ContentStore};

pub use status::{Phase, PlaybackStatus};

/// Content poll period when no settings are loaded or the backend sent 0.
pub const FALLBACK_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Default weather poll period.
pub const DEFAULT_WEATHER_INTERVAL: Duration = Duration::from_secs(600);

struct Shared {
    store: Arc<ContentStore>,
    cache: TieredCache,
    fetcher: Arc<dyn ContentFetcher>,
    status: watch::Sender<PlaybackStatus>,
    generation: AtomicU64,
    restart: Notify,
    cancel: CancellationToken,
    prefetch: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

/// Drives the screen rotation and keeps content, images and weather fresh.
pub struct Scheduler {
    shared: Arc<Shared>,
    weather_interval: Duration,
    started: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("status", &*self.shared.status.borrow())
            .field("weather_interval", &self.weather_interval)
            .field("started", &self.started.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    pub fn new(fetcher: Arc<dyn ContentFetcher>, store: Arc<ContentStore>, cache: TieredCache) -> Self {
        let (status, _) = watch::channel(PlaybackStatus::default());
        Self {
            shared: Arc::new(Shared {
                store,
                cache,
                fetcher,
                status,
                generation: AtomicU64::new(0),
                restart: Notify::new(),
                cancel: CancellationToken::new(),
                prefetch: parking_lot::Mutex::new(None),
            }),
            weather_interval: DEFAULT_WEATHER_INTERVAL,
            started: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn with_weather_interval(mut self, interval: Duration) -> Self {
        self.weather_interval = interval;
        self
    }

    /// Load content and weather once, then start the background loops.
    ///
    /// A failed initial content load leaves the scheduler in [`Phase::Loading`]
    /// with `offline` set; the refresh loop keeps retrying.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidState` if the scheduler was already started
    pub async fn start(&self) -> Result<(), Error> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(Error::InvalidState("scheduler already started".into()));
        }
        if self.shared.cancel.is_cancelled() {
            return Err(Error::InvalidState("scheduler stopped".into()));
        }

        self.shared.status.send_modify(|s| s.phase = Phase::Loading);
        tracing::info!("scheduler starting");

        let (content, _) = tokio::join!(self.shared.refresh_content(), self.shared.refresh_weather());
        if let Err(e) = content {
            tracing::warn!(error = %e, "initial content load failed, will retry");
        }

        let mut tasks = self.tasks.lock().await;
        tasks.push(tokio::spawn(Arc::clone(&self.shared).advance_loop()));
        tasks.push(tokio::spawn(Arc::clone(&self.shared).content_loop()));
        tasks.push(tokio::spawn(Arc::clone(&self.shared).weather_loop(self.weather_interval)));

        tracing::info!(screens = self.shared.store.current_screens().len(), "scheduler started");
        Ok(())
    }

    /// Cancel every loop and wait for them to exit. Safe to call more than once.
    ///
    /// In-flight fetches and prefetches are abandoned; their results are never applied.
    pub async fn stop(&self) {
        self.shared.cancel.cancel();

        let handles = std::mem::take(&mut *self.tasks.lock().await);
        let had_loops = !handles.is_empty();
        for handle in handles {
            join_task(handle).await;
        }

        // Loops are gone, so nothing can spawn another prefetch past this point.
        let prefetch = self.shared.prefetch.lock().take();
        if let Some(handle) = prefetch {
            join_task(handle).await;
        } else if !had_loops {
            return;
        }
        tracing::info!("scheduler stopped");
    }

    /// Move to the next screen, wrapping at the end, and restart the timer.
    pub fn advance_next(&self) {
        self.shared.navigate(true);
    }

    /// Move to the previous screen, wrapping at the start, and restart the timer.
    pub fn advance_previous(&self) {
        self.shared.navigate(false);
    }

    /// Flip the paused flag and return the new value.
    ///
    /// Resuming starts a full duration for the current screen.
    pub fn toggle_pause(&self) -> bool {
        let shared = &self.shared;
        let mut paused = false;
        shared.status.send_modify(|s| {
            s.paused = !s.paused;
            paused = s.paused;
            shared.generation.fetch_add(1, Ordering::SeqCst);
        });
        shared.restart.notify_one();
        tracing::info!(paused, "playback toggled");
        paused
    }

    /// Swap in a new screen list and settings outside the refresh loop.
    ///
    /// Keeps the current screen selected when it survives the swap.
    pub fn replace_content(&self, screens: Vec<Screen>, settings: Settings) -> Arc<ContentSnapshot> {
        self.shared.apply_content(screens, settings)
    }

    /// The screen currently on display.
    pub fn current_screen(&self) -> Option<Screen> {
        let index = self.shared.status.borrow().current_index;
        self.shared.store.current_screens().get(index).cloned()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.shared.status.borrow().clone()
    }

    /// Receiver notified on every status change.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackStatus> {
        self.shared.status.subscribe()
    }

    pub fn store(&self) -> &Arc<ContentStore> {
        &self.shared.store
    }

    pub fn cache(&self) -> &TieredCache {
        &self.shared.cache
    }
}

async fn join_task(handle: JoinHandle<()>) {
    if let Err(e) = handle.await
        && !e.is_cancelled()
    {
        tracing::warn!(error = %e, "scheduler task panicked");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}

impl Shared {
    fn current_duration(&self) -> Duration {
        let index = self.status.borrow().current_index;
        let snapshot = self.store.snapshot();
        let settings = snapshot.settings.as_deref();
        snapshot
            .screens
            .get(index)
            .map(|s| s.display_duration(settings))
            .unwrap_or_else(|| default_display_duration(settings))
    }

    fn navigate(&self, forward: bool) {
        let screens = self.store.current_screens();
        let len = screens.len();
        if len == 0 {
            return;
        }

        self.status.send_modify(|s| {
            let current = s.current_index % len;
            s.current_index = if forward { (current + 1) % len } else { (current + len - 1) % len };
            s.current_screen_id = Some(screens[s.current_index].id);
            self.generation.fetch_add(1, Ordering::SeqCst);
        });
        self.restart.notify_one();
    }

    /// Timer-driven advance. Skipped if anything touched navigation since `generation`.
    fn auto_advance(&self, generation: u64) {
        let screens = self.store.current_screens();
        let len = screens.len();
        let advanced = self.status.send_if_modified(|s| {
            if len == 0 || s.paused || self.cancel.is_cancelled() || self.generation.load(Ordering::SeqCst) != generation
            {
                return false;
            }
            s.current_index = (s.current_index + 1) % len;
            s.current_screen_id = Some(screens[s.current_index].id);
            true
        });
        if advanced {
            tracing::debug!(index = self.status.borrow().current_index, "advanced");
        }
    }

    fn apply_content(&self, screens: Vec<Screen>, settings: Settings) -> Arc<ContentSnapshot> {
        let snapshot = self.store.replace(screens, settings);
        let mut selection_changed = false;
        let mut recovered = false;

        self.status.send_modify(|s| {
            let previous = s.current_screen_id;
            let len = snapshot.screens.len();
            let index = previous
                .and_then(|id| snapshot.screens.iter().position(|screen| screen.id == id))
                .unwrap_or(if s.current_index < len { s.current_index } else { 0 });

            s.current_index = index;
            s.current_screen_id = snapshot.screens.get(index).map(|screen| screen.id);
            s.phase = Phase::Ready;
            recovered = s.offline;
            s.offline = false;
            s.last_refresh = snapshot.loaded_at;

            if s.current_screen_id != previous {
                selection_changed = true;
                self.generation.fetch_add(1, Ordering::SeqCst);
            }
        });

        if selection_changed {
            self.restart.notify_one();
        }
        if recovered {
            tracing::info!("content source reachable again");
        }
        snapshot
    }

    async fn refresh_content(&self) -> Result<(), Error> {
        let fetched = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Ok(()),
            fetched = async { tokio::try_join!(self.fetcher.fetch_screens(), self.fetcher.fetch_settings()) } => fetched,
        };

        let (screens, settings) = match fetched {
            Ok(pair) => pair,
            Err(e) => {
                let mut went_offline = false;
                self.status.send_if_modified(|s| {
                    went_offline = !s.offline;
                    s.offline = true;
                    went_offline
                });
                if went_offline {
                    tracing::warn!(error = %e, "content refresh failed, serving last snapshot");
                } else {
                    tracing::debug!(error = %e, "content refresh failed again");
                }
                return Err(e.into());
            }
        };

        if self.cancel.is_cancelled() {
            return Ok(());
        }

        let snapshot = self.apply_content(screens, settings);
        tracing::debug!(screens = snapshot.screens.len(), "content refreshed");

        self.spawn_prefetch(snapshot.image_keys());
        Ok(())
    }

    fn spawn_prefetch(&self, keys: Vec<String>) {
        if keys.is_empty() {
            return;
        }

        let cache = self.cache.clone();
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {}
                report = cache.prefetch_all(keys) => {
                    if report.failed > 0 {
                        tracing::warn!(failed = report.failed, requested = report.requested, "some images failed to prefetch");
                    }
                }
            }
        });

        if let Some(previous) = self.prefetch.lock().replace(handle)
            && !previous.is_finished()
        {
            tracing::debug!("superseding unfinished prefetch");
            previous.abort();
        }
    }

    async fn refresh_weather(&self) {
        let fetched = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return,
            fetched = self.fetcher.fetch_weather() => fetched,
        };

        match fetched {
            Ok(weather) if !self.cancel.is_cancelled() => {
                self.status.send_modify(|s| s.weather = Some(weather));
                tracing::debug!(temperature = weather.rounded_temperature(), code = weather.weather_code, "weather refreshed");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "weather refresh failed, keeping previous conditions"),
        }
    }

    async fn advance_loop(self: Arc<Self>) {
        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let paused = self.status.borrow().paused;
            if paused {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break,
                    _ = self.restart.notified() => continue,
                }
            }

            let generation = self.generation.load(Ordering::SeqCst);
            let duration = self.current_duration();
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = self.restart.notified() => continue,
                _ = tokio::time::sleep(duration) => self.auto_advance(generation),
            }
        }
        tracing::debug!("advance loop exited");
    }

    async fn content_loop(self: Arc<Self>) {
        loop {
            let interval = self
                .store
                .current_settings()
                .and_then(|s| s.refresh_interval())
                .unwrap_or(FALLBACK_REFRESH_INTERVAL);

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            // Failures are already logged and reflected in `offline`.
            let _ = self.refresh_content().await;
        }
        tracing::debug!("content refresh loop exited");
    }

    async fn weather_loop(self: Arc<Self>, interval: Duration) {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
            self.refresh_weather().await;
        }
        tracing::debug!("weather refresh loop exited");
    }
}
