//! In-memory collaborators with call counters.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::cache::DiskTier;
use crate::model::{Screen, Settings, Weather};
use crate::source::{ContentFetcher, ImageSource};
use crate::{Error, FetchError};

#[derive(Debug, Default)]
struct ImageState {
    fetches: HashMap<String, usize>,
    failing: HashSet<String>,
    payloads: HashMap<String, Bytes>,
}

/// Serves `bytes for {key}` for every key unless told otherwise.
#[derive(Debug, Default)]
pub(crate) struct FakeImageSource {
    delay: Option<Duration>,
    state: Mutex<ImageState>,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl FakeImageSource {
    pub(crate) fn with_delay(delay: Duration) -> Self {
        Self { delay: Some(delay), ..Default::default() }
    }

    pub(crate) fn fail_key(&self, key: &str) {
        self.state.lock().failing.insert(key.to_string());
    }

    pub(crate) fn heal_key(&self, key: &str) {
        self.state.lock().failing.remove(key);
    }

    pub(crate) fn set_payload(&self, key: &str, bytes: Bytes) {
        self.state.lock().payloads.insert(key.to_string(), bytes);
    }

    pub(crate) fn fetches(&self, key: &str) -> usize {
        self.state.lock().fetches.get(key).copied().unwrap_or(0)
    }

    pub(crate) fn total_fetches(&self) -> usize {
        self.state.lock().fetches.values().sum()
    }

    pub(crate) fn max_concurrent(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageSource for FakeImageSource {
    async fn fetch(&self, key: &str) -> Result<Bytes, FetchError> {
        *self.state.lock().fetches.entry(key.to_string()).or_default() += 1;

        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.running.fetch_sub(1, Ordering::SeqCst);

        let state = self.state.lock();
        if state.failing.contains(key) {
            return Err(FetchError::Http { status: 404 });
        }
        Ok(state
            .payloads
            .get(key)
            .cloned()
            .unwrap_or_else(|| Bytes::from(format!("bytes for {key}"))))
    }
}

/// Disk tier kept in a map.
#[derive(Debug, Default)]
pub(crate) struct InMemoryDisk {
    entries: Mutex<HashMap<String, Bytes>>,
}

#[async_trait]
impl DiskTier for InMemoryDisk {
    async fn read(&self, key: &str) -> Result<Option<Bytes>, Error> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<(), Error> {
        self.entries.lock().insert(key.to_string(), Bytes::copy_from_slice(bytes));
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, Error> {
        Ok(self.entries.lock().remove(key).is_some())
    }

    async fn purge(&self) -> Result<u64, Error> {
        let mut entries = self.entries.lock();
        let count = entries.len() as u64;
        entries.clear();
        Ok(count)
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        let mut keys: Vec<String> = self.entries.lock().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

/// Disk tier whose every operation faults.
#[derive(Debug, Default)]
pub(crate) struct FlakyDisk;

fn disk_fault() -> Error {
    Error::from(std::io::Error::other("disk unavailable"))
}

#[async_trait]
impl DiskTier for FlakyDisk {
    async fn read(&self, _key: &str) -> Result<Option<Bytes>, Error> {
        Err(disk_fault())
    }

    async fn write(&self, _key: &str, _bytes: &[u8]) -> Result<(), Error> {
        Err(disk_fault())
    }

    async fn remove(&self, _key: &str) -> Result<bool, Error> {
        Err(disk_fault())
    }

    async fn purge(&self) -> Result<u64, Error> {
        Err(disk_fault())
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        Err(disk_fault())
    }
}

/// Map-backed disk tier whose reads and writes can be made to fault.
#[derive(Debug, Default)]
pub(crate) struct ScriptedDisk {
    inner: InMemoryDisk,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl ScriptedDisk {
    pub(crate) fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DiskTier for ScriptedDisk {
    async fn read(&self, key: &str) -> Result<Option<Bytes>, Error> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(disk_fault());
        }
        self.inner.read(key).await
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<(), Error> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(disk_fault());
        }
        self.inner.write(key, bytes).await
    }

    async fn remove(&self, key: &str) -> Result<bool, Error> {
        self.inner.remove(key).await
    }

    async fn purge(&self) -> Result<u64, Error> {
        self.inner.purge().await
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.inner.keys().await
    }
}

#[derive(Debug)]
struct ContentState {
    screens: Vec<Screen>,
    settings: Settings,
    weather: Weather,
    fail_content: bool,
    fail_weather: bool,
    content_delay: Option<Duration>,
}

/// Content backend held in memory.
#[derive(Debug)]
pub(crate) struct FakeContentFetcher {
    state: Mutex<ContentState>,
    screens_calls: AtomicUsize,
    settings_calls: AtomicUsize,
    weather_calls: AtomicUsize,
}

impl FakeContentFetcher {
    pub(crate) fn new(screens: Vec<Screen>, settings: Settings) -> Self {
        Self {
            state: Mutex::new(ContentState {
                screens,
                settings,
                weather: Weather { temperature_fahrenheit: 68.0, weather_code: 1 },
                fail_content: false,
                fail_weather: false,
                content_delay: None,
            }),
            screens_calls: AtomicUsize::new(0),
            settings_calls: AtomicUsize::new(0),
            weather_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn set_screens(&self, screens: Vec<Screen>) {
        self.state.lock().screens = screens;
    }

    pub(crate) fn set_settings(&self, settings: Settings) {
        self.state.lock().settings = settings;
    }

    pub(crate) fn set_weather(&self, weather: Weather) {
        self.state.lock().weather = weather;
    }

    pub(crate) fn fail_content(&self, fail: bool) {
        self.state.lock().fail_content = fail;
    }

    pub(crate) fn fail_weather(&self, fail: bool) {
        self.state.lock().fail_weather = fail;
    }

    pub(crate) fn set_content_delay(&self, delay: Option<Duration>) {
        self.state.lock().content_delay = delay;
    }

    pub(crate) fn screens_calls(&self) -> usize {
        self.screens_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn weather_calls(&self) -> usize {
        self.weather_calls.load(Ordering::SeqCst)
    }

    async fn maybe_delay(&self) {
        let delay = self.state.lock().content_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ContentFetcher for FakeContentFetcher {
    async fn fetch_screens(&self) -> Result<Vec<Screen>, FetchError> {
        self.screens_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_delay().await;
        let state = self.state.lock();
        if state.fail_content {
            return Err(FetchError::Network("backend unreachable".into()));
        }
        Ok(state.screens.clone())
    }

    async fn fetch_settings(&self) -> Result<Settings, FetchError> {
        self.settings_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_delay().await;
        let state = self.state.lock();
        if state.fail_content {
            return Err(FetchError::Network("backend unreachable".into()));
        }
        Ok(state.settings.clone())
    }

    async fn fetch_weather(&self) -> Result<Weather, FetchError> {
        self.weather_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock();
        if state.fail_weather {
            return Err(FetchError::Timeout);
        }
        Ok(state.weather)
    }
}
