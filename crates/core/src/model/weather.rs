use serde::{Deserialize, Serialize};

/// Current conditions as reported by the weather collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    pub temperature_fahrenheit: f64,
    /// WMO weather interpretation code.
    pub weather_code: i32,
}

/// Coarse condition derived from a WMO code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    Clear,
    PartlyCloudy,
    Cloudy,
    Fog,
    Drizzle,
    Rain,
    Snow,
    Showers,
    Thunderstorm,
    Unknown,
}

impl Weather {
    pub fn condition(&self) -> WeatherCondition {
        match self.weather_code {
            0 => WeatherCondition::Clear,
            1 | 2 => WeatherCondition::PartlyCloudy,
            3 => WeatherCondition::Cloudy,
            45 | 48 => WeatherCondition::Fog,
            51..=57 => WeatherCondition::Drizzle,
            61..=67 => WeatherCondition::Rain,
            71..=77 | 85 | 86 => WeatherCondition::Snow,
            80..=82 => WeatherCondition::Showers,
            95..=99 => WeatherCondition::Thunderstorm,
            _ => WeatherCondition::Unknown,
        }
    }

    /// Temperature rounded to whole degrees for display.
    pub fn rounded_temperature(&self) -> i64 {
        self.temperature_fahrenheit.round() as i64
    }
}
