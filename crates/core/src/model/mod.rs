//! Content model shared by the store, the scheduler and the HTTP collaborators.
//!
//! Instances are immutable values: a refresh replaces the whole list and the
//! whole settings snapshot, never individual fields.

mod reorder;
mod weather;
mod window;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use reorder::reorder_screens;
pub use weather::{Weather, WeatherCondition};
pub use window::ActiveWindow;

/// Display duration used when neither the screen nor the settings provide one.
pub const FALLBACK_DISPLAY_DURATION: Duration = Duration::from_secs(10);

/// Category of a screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenType {
    SnapAndPurr,
    Event,
    TodayAtCafe,
    Membership,
    Reminder,
    Adoption,
    ThankYou,
    /// Category this client does not know about yet.
    #[serde(other)]
    Other,
}

/// A single slide in the rotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Screen {
    pub id: i64,
    #[serde(rename = "type")]
    pub screen_type: ScreenType,
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    /// Image reference resolved through the tiered cache.
    #[serde(default, alias = "image_url")]
    pub image_key: Option<String>,
    #[serde(default)]
    pub qr_url: Option<String>,
    #[serde(flatten)]
    pub window: ActiveWindow,
    /// Informational only; rotation order comes from `sort_order`.
    #[serde(default)]
    pub priority: i32,
    /// Display duration in seconds, 0 means "use the settings default".
    #[serde(default)]
    pub duration_seconds: u32,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

impl Screen {
    /// How long this screen stays up.
    ///
    /// Falls back to `settings.default_duration_seconds`, then to
    /// [`FALLBACK_DISPLAY_DURATION`].
    pub fn display_duration(&self, settings: Option<&Settings>) -> Duration {
        if self.duration_seconds > 0 {
            return Duration::from_secs(u64::from(self.duration_seconds));
        }
        default_display_duration(settings)
    }

    /// Rotation ordering key.
    pub fn rotation_key(&self) -> (i32, i64) {
        (self.sort_order, self.id)
    }
}

/// Display duration for an empty rotation or a screen without its own duration.
pub fn default_display_duration(settings: Option<&Settings>) -> Duration {
    match settings {
        Some(s) if s.default_duration_seconds > 0 => Duration::from_secs(u64::from(s.default_duration_seconds)),
        _ => FALLBACK_DISPLAY_DURATION,
    }
}

/// Display and polling settings snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Used when a screen's own duration is 0.
    #[serde(default)]
    pub default_duration_seconds: u32,
    /// Content poll period.
    #[serde(default)]
    pub refresh_interval_seconds: u32,
    #[serde(default)]
    pub cafe_name: Option<String>,
    #[serde(default)]
    pub logo_key: Option<String>,
    #[serde(default)]
    pub accent_color: Option<String>,
    #[serde(default = "default_active")]
    pub show_weather: bool,
    #[serde(default = "default_active")]
    pub show_clock: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_duration_seconds: 10,
            refresh_interval_seconds: 60,
            cafe_name: None,
            logo_key: None,
            accent_color: None,
            show_weather: true,
            show_clock: true,
        }
    }
}

impl Settings {
    /// Content poll period, `None` when the backend sent 0.
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_seconds > 0).then(|| Duration::from_secs(u64::from(self.refresh_interval_seconds)))
    }
}

#[cfg(test)]
pub(crate) fn screen(id: i64, sort_order: i32, duration_seconds: u32, is_active: bool) -> Screen {
    Screen {
        id,
        screen_type: ScreenType::TodayAtCafe,
        title: format!("Screen {id}"),
        subtitle: None,
        body: None,
        image_key: None,
        qr_url: None,
        window: ActiveWindow::default(),
        priority: 0,
        duration_seconds,
        is_active,
        sort_order,
        created_at: None,
        updated_at: None,
    }
}
