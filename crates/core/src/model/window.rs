//! Active window evaluation for screens.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Optional date/day/time range restricting when a screen is eligible.
///
/// Every bound is optional; an empty window always matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveWindow {
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    /// 0 = Sunday .. 6 = Saturday.
    #[serde(default)]
    pub days_of_week: Option<Vec<u8>>,
    /// `HH:MM` or `HH:MM:SS`.
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

impl ActiveWindow {
    /// Whether `now` (local wall-clock time) falls inside the window.
    ///
    /// Dates are inclusive on both ends. The time range includes its start and
    /// excludes its end; an end before the start wraps past midnight. An
    /// unparseable time bound is ignored.
    pub fn contains(&self, now: NaiveDateTime) -> bool {
        let date = now.date();
        if self.start_date.is_some_and(|start| date < start) {
            return false;
        }
        if self.end_date.is_some_and(|end| date > end) {
            return false;
        }

        if let Some(days) = &self.days_of_week
            && !days.is_empty()
        {
            let weekday = now.weekday().num_days_from_sunday() as u8;
            if !days.contains(&weekday) {
                return false;
            }
        }

        let start = self.start_time.as_deref().and_then(parse_time);
        let end = self.end_time.as_deref().and_then(parse_time);
        let time = now.time();

        match (start, end) {
            (Some(s), Some(e)) if s < e => s <= time && time < e,
            (Some(s), Some(e)) if s > e => time >= s || time < e,
            (Some(_), Some(_)) => true,
            (Some(s), None) => time >= s,
            (None, Some(e)) => time < e,
            (None, None) => true,
        }
    }
}
