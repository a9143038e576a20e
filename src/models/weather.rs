use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Current conditions as reported by the weather provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub observed_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: f64,
    pub precipitation: f64,
    pub wind_speed: f64,
    pub wind_direction: f64,
    pub cloud_cover: f64,
    pub pressure: f64,
    pub et0: f64,
    /// Precipitation forecast for today plus tomorrow (mm).
    pub rain_next_24h: f64,
    pub temp_min_24h: f64,
    pub temp_max_24h: f64,
}

impl Observation {
    pub fn date(&self) -> NaiveDate {
        self.observed_at.date_naive()
    }

    pub fn month(&self) -> u32 {
        self.observed_at.month()
    }
}

/// One day of the 7-day forecast, keyed by days-ahead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub days_ahead: u32,
    pub temp_min: f64,
    pub temp_max: f64,
    pub temp_avg: f64,
    pub precipitation_sum: f64,
    /// 0-100
    pub precipitation_probability: f64,
    pub humidity_min: f64,
    pub humidity_max: f64,
    pub humidity_avg: f64,
    pub wind_speed_max: f64,
    pub wind_gust_max: f64,
    pub et0: f64,
    pub sunshine_hours: f64,
    pub uv_index_max: f64,
    pub fetched_at: DateTime<Utc>,
}

impl DailyForecast {
    pub fn month(&self) -> u32 {
        self.date.month()
    }
}

/// Provider response: current conditions plus the daily outlook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub current: Observation,
    pub daily: Vec<DailyForecast>,
}

impl WeatherReport {
    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.current.fetched_at
    }
}

/// Stored weather for a parcel, with freshness information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherState {
    pub current: Option<Observation>,
    pub daily: Vec<DailyForecast>,
    pub stale: bool,
}
