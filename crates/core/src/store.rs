//! Snapshot holder for the current rotation and settings.
//!
//! A replace builds a new immutable [`ContentSnapshot`] and swaps the pointer
//! under a write lock, so readers observe either the old pair or the new pair.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::model::{Screen, Settings};

/// Immutable screens + settings pair.
#[derive(Debug, Clone, Default)]
pub struct ContentSnapshot {
    /// Active screens sorted by `(sort_order, id)`.
    pub screens: Arc<[Screen]>,
    /// `None` until the first successful load.
    pub settings: Option<Arc<Settings>>,
    pub loaded_at: Option<DateTime<Utc>>,
}

impl ContentSnapshot {
    /// Whether a replace has happened yet.
    pub fn is_loaded(&self) -> bool {
        self.settings.is_some()
    }

    /// Image keys referenced by the rotation, in rotation order, without duplicates.
    pub fn image_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for key in self.screens.iter().filter_map(|s| s.image_key.as_deref()) {
            if !key.is_empty() && !keys.iter().any(|k| k == key) {
                keys.push(key.to_string());
            }
        }
        if let Some(logo) = self.settings.as_ref().and_then(|s| s.logo_key.as_deref())
            && !logo.is_empty()
            && !keys.iter().any(|k| k == logo)
        {
            keys.push(logo.to_string());
        }
        keys
    }
}

/// Shared holder of the current [`ContentSnapshot`].
#[derive(Debug, Default)]
pub struct ContentStore {
    current: RwLock<Arc<ContentSnapshot>>,
}

impl ContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically swap in a new screen list and settings snapshot.
    ///
    /// Inactive screens are dropped and the rest sorted into rotation order
    /// before the swap. Returns the snapshot now being served.
    pub fn replace(&self, screens: Vec<Screen>, settings: Settings) -> Arc<ContentSnapshot> {
        let mut screens: Vec<Screen> = screens.into_iter().filter(|s| s.is_active).collect();
        screens.sort_by_key(Screen::rotation_key);

        let snapshot = Arc::new(ContentSnapshot {
            screens: screens.into(),
            settings: Some(Arc::new(settings)),
            loaded_at: Some(Utc::now()),
        });

        *self.current.write() = Arc::clone(&snapshot);
        snapshot
    }

    /// The whole current snapshot.
    pub fn snapshot(&self) -> Arc<ContentSnapshot> {
        Arc::clone(&self.current.read())
    }

    /// Active screens in rotation order as of the last replace.
    pub fn current_screens(&self) -> Arc<[Screen]> {
        Arc::clone(&self.current.read().screens)
    }

    /// Last settings snapshot, `None` before the first load.
    pub fn current_settings(&self) -> Option<Arc<Settings>> {
        self.current.read().settings.clone()
    }
}
