use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::Weather;

/// Scheduler lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Uninitialized,
    /// `start()` was called, no content has loaded yet.
    Loading,
    /// At least one content load succeeded.
    Ready,
}

/// What the presentation layer needs to render the current frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlaybackStatus {
    pub phase: Phase,
    /// Index into the active screen list; 0 when the list is empty.
    pub current_index: usize,
    pub current_screen_id: Option<i64>,
    pub paused: bool,
    /// Set by a failed content refresh, cleared by the next successful one.
    pub offline: bool,
    /// Last successfully fetched weather. Failures keep the previous value.
    pub weather: Option<Weather>,
    pub last_refresh: Option<DateTime<Utc>>,
}

impl PlaybackStatus {
    /// `Ready` and not paused.
    pub fn is_playing(&self) -> bool {
        self.phase == Phase::Ready && !self.paused
    }
}
