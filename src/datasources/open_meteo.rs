use crate::config::WeatherConfig;
use crate::error::{OliveOpsError, Result};
use crate::models::{ArchiveDay, DailyForecast, HistoricalClimate, Observation, WeatherReport};
use crate::ports::{HistoricalClimateProvider, WeatherProvider};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;

const CURRENT_FIELDS: &str = "temperature_2m,relative_humidity_2m,precipitation,wind_speed_10m,\
wind_direction_10m,cloud_cover,surface_pressure,et0_fao_evapotranspiration";

const DAILY_FIELDS: &str = "temperature_2m_min,temperature_2m_max,precipitation_sum,\
precipitation_probability_max,et0_fao_evapotranspiration,relative_humidity_2m_max,\
relative_humidity_2m_min,wind_speed_10m_max,wind_gusts_10m_max,sunshine_duration,uv_index_max";

const ARCHIVE_FIELDS: &str = "temperature_2m_mean,temperature_2m_min,temperature_2m_max,\
precipitation_sum,et0_fao_evapotranspiration";

const FORECAST_DAYS: u32 = 7;

/// Open-Meteo forecast and archive client. No API key is required.
pub struct OpenMeteoClient {
    forecast: reqwest::Client,
    archive: reqwest::Client,
    config: WeatherConfig,
}

// Open-Meteo API response structures
#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    utc_offset_seconds: i64,
    current: CurrentBlock,
    daily: DailyBlock,
}

#[derive(Debug, Deserialize)]
struct CurrentBlock {
    time: String,
    temperature_2m: Option<f64>,
    relative_humidity_2m: Option<f64>,
    precipitation: Option<f64>,
    wind_speed_10m: Option<f64>,
    wind_direction_10m: Option<f64>,
    cloud_cover: Option<f64>,
    surface_pressure: Option<f64>,
    et0_fao_evapotranspiration: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DailyBlock {
    time: Vec<String>,
    temperature_2m_min: Vec<Option<f64>>,
    temperature_2m_max: Vec<Option<f64>>,
    precipitation_sum: Vec<Option<f64>>,
    precipitation_probability_max: Vec<Option<f64>>,
    et0_fao_evapotranspiration: Vec<Option<f64>>,
    relative_humidity_2m_max: Vec<Option<f64>>,
    relative_humidity_2m_min: Vec<Option<f64>>,
    wind_speed_10m_max: Vec<Option<f64>>,
    wind_gusts_10m_max: Vec<Option<f64>>,
    /// seconds
    sunshine_duration: Vec<Option<f64>>,
    uv_index_max: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct ArchiveResponse {
    daily: ArchiveBlock,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ArchiveBlock {
    time: Vec<String>,
    temperature_2m_mean: Vec<Option<f64>>,
    temperature_2m_min: Vec<Option<f64>>,
    temperature_2m_max: Vec<Option<f64>>,
    precipitation_sum: Vec<Option<f64>>,
    et0_fao_evapotranspiration: Vec<Option<f64>>,
}

fn at(values: &[Option<f64>], i: usize) -> Option<f64> {
    values.get(i).copied().flatten()
}

impl OpenMeteoClient {
    pub fn new(config: WeatherConfig) -> Result<Self> {
        let forecast = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()?;
        let archive = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.archive_timeout_secs))
            .build()?;
        Ok(Self {
            forecast,
            archive,
            config,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        client: &reqwest::Client,
        source: &str,
        url: &str,
    ) -> Result<T> {
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| request_error(source, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OliveOpsError::ProviderUnavailable(format!(
                "{} returned {}: {}",
                source, status, body
            )));
        }

        response.json().await.map_err(|e| {
            if e.is_timeout() {
                request_error(source, e)
            } else {
                OliveOpsError::ProviderUnavailable(format!(
                    "Failed to parse {} response: {}",
                    source, e
                ))
            }
        })
    }

    fn forecast_url(&self, latitude: f64, longitude: f64) -> String {
        format!(
            "{}?latitude={:.4}&longitude={:.4}&current={}&daily={}&timezone=auto&forecast_days={}",
            self.config.forecast_url,
            latitude,
            longitude,
            CURRENT_FIELDS,
            DAILY_FIELDS,
            FORECAST_DAYS
        )
    }

    fn archive_url(&self, latitude: f64, longitude: f64, start: NaiveDate, end: NaiveDate) -> String {
        format!(
            "{}?latitude={:.4}&longitude={:.4}&start_date={}&end_date={}&daily={}&timezone=auto",
            self.config.archive_url,
            latitude,
            longitude,
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d"),
            ARCHIVE_FIELDS
        )
    }
}

fn request_error(source: &str, e: reqwest::Error) -> OliveOpsError {
    if e.is_timeout() {
        OliveOpsError::ProviderTimeout(format!("{}: {}", source, e))
    } else {
        OliveOpsError::ProviderUnavailable(format!("{}: {}", source, e))
    }
}

/// Open-Meteo reports local wall-clock times plus the zone offset.
fn parse_local_time(time: &str, utc_offset_seconds: i64) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(time, "%Y-%m-%dT%H:%M")
        .ok()
        .map(|local| (local - Duration::seconds(utc_offset_seconds)).and_utc())
}

fn to_report(resp: ForecastResponse, fetched_at: DateTime<Utc>) -> Result<WeatherReport> {
    let daily = to_daily(&resp.daily, fetched_at)?;
    let current = &resp.current;
    let temperature = current
        .temperature_2m
        .ok_or_else(|| OliveOpsError::ProviderUnavailable("Open-Meteo: no current temperature".into()))?;

    let observed_at = parse_local_time(&current.time, resp.utc_offset_seconds).unwrap_or_else(|| {
        tracing::warn!(time = %current.time, "Unparseable Open-Meteo time, using fetch time");
        fetched_at
    });
    let today = daily.first();
    let rain_next_24h = daily
        .iter()
        .take(2)
        .map(|d| d.precipitation_sum)
        .sum::<f64>();

    let current = Observation {
        observed_at,
        fetched_at,
        temperature,
        humidity: current.relative_humidity_2m.unwrap_or(0.0),
        precipitation: current.precipitation.unwrap_or(0.0),
        wind_speed: current.wind_speed_10m.unwrap_or(0.0),
        wind_direction: current.wind_direction_10m.unwrap_or(0.0),
        cloud_cover: current.cloud_cover.unwrap_or(0.0),
        pressure: current.surface_pressure.unwrap_or(0.0),
        // the water balance wants mm/day, the current value is hourly
        et0: today
            .map(|d| d.et0)
            .or(current.et0_fao_evapotranspiration)
            .unwrap_or(0.0),
        rain_next_24h,
        temp_min_24h: today.map(|d| d.temp_min).unwrap_or(temperature),
        temp_max_24h: today.map(|d| d.temp_max).unwrap_or(temperature),
    };

    Ok(WeatherReport { current, daily })
}

fn to_daily(block: &DailyBlock, fetched_at: DateTime<Utc>) -> Result<Vec<DailyForecast>> {
    let mut days = Vec::with_capacity(block.time.len());
    for (i, time) in block.time.iter().enumerate() {
        let date = NaiveDate::parse_from_str(time, "%Y-%m-%d").map_err(|e| {
            OliveOpsError::ProviderUnavailable(format!("Open-Meteo: bad date {}: {}", time, e))
        })?;
        let (Some(temp_min), Some(temp_max)) = (
            at(&block.temperature_2m_min, i),
            at(&block.temperature_2m_max, i),
        ) else {
            tracing::debug!(%date, "Skipping forecast day without temperatures");
            continue;
        };
        let humidity_min = at(&block.relative_humidity_2m_min, i).unwrap_or(0.0);
        let humidity_max = at(&block.relative_humidity_2m_max, i).unwrap_or(0.0);

        days.push(DailyForecast {
            date,
            days_ahead: i as u32,
            temp_min,
            temp_max,
            temp_avg: (temp_min + temp_max) / 2.0,
            precipitation_sum: at(&block.precipitation_sum, i).unwrap_or(0.0),
            precipitation_probability: at(&block.precipitation_probability_max, i).unwrap_or(0.0),
            humidity_min,
            humidity_max,
            humidity_avg: (humidity_min + humidity_max) / 2.0,
            wind_speed_max: at(&block.wind_speed_10m_max, i).unwrap_or(0.0),
            wind_gust_max: at(&block.wind_gusts_10m_max, i).unwrap_or(0.0),
            et0: at(&block.et0_fao_evapotranspiration, i).unwrap_or(0.0),
            sunshine_hours: at(&block.sunshine_duration, i).unwrap_or(0.0) / 3600.0,
            uv_index_max: at(&block.uv_index_max, i).unwrap_or(0.0),
            fetched_at,
        });
    }
    Ok(days)
}

fn to_archive_days(block: &ArchiveBlock) -> Vec<ArchiveDay> {
    block
        .time
        .iter()
        .enumerate()
        .filter_map(|(i, time)| {
            let date = NaiveDate::parse_from_str(time, "%Y-%m-%d").ok()?;
            Some(ArchiveDay {
                date,
                temp_mean: at(&block.temperature_2m_mean, i)?,
                temp_min: at(&block.temperature_2m_min, i)?,
                temp_max: at(&block.temperature_2m_max, i)?,
                precipitation: at(&block.precipitation_sum, i).unwrap_or(0.0),
                et0: at(&block.et0_fao_evapotranspiration, i).unwrap_or(0.0),
            })
        })
        .collect()
}

#[async_trait]
impl WeatherProvider for OpenMeteoClient {
    async fn current_and_forecast(&self, latitude: f64, longitude: f64) -> Result<WeatherReport> {
        let url = self.forecast_url(latitude, longitude);
        let resp: ForecastResponse = Self::get_json(&self.forecast, "Open-Meteo", &url).await?;
        to_report(resp, Utc::now())
    }
}

#[async_trait]
impl HistoricalClimateProvider for OpenMeteoClient {
    async fn archive(&self, latitude: f64, longitude: f64, years: u32) -> Result<HistoricalClimate> {
        let end = Utc::now().date_naive() - Duration::days(1);
        let start = end - Duration::days(365 * years as i64);
        let url = self.archive_url(latitude, longitude, start, end);
        let resp: ArchiveResponse =
            Self::get_json(&self.archive, "Open-Meteo archive", &url).await?;

        let days = to_archive_days(&resp.daily);
        tracing::debug!(days = days.len(), years, "Fetched climate archive");
        HistoricalClimate::aggregate(&days, years).ok_or_else(|| {
            OliveOpsError::ProviderUnavailable("Open-Meteo archive returned no usable days".into())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const FORECAST_JSON: &str = r#"{
        "latitude": 37.0,
        "longitude": -4.0,
        "utc_offset_seconds": 7200,
        "current": {
            "time": "2025-06-01T14:00",
            "temperature_2m": 27.5,
            "relative_humidity_2m": 38,
            "precipitation": 0.0,
            "wind_speed_10m": 11.2,
            "wind_direction_10m": 250,
            "cloud_cover": 5,
            "surface_pressure": 982.1,
            "et0_fao_evapotranspiration": 0.62
        },
        "daily": {
            "time": ["2025-06-01", "2025-06-02", "2025-06-03"],
            "temperature_2m_min": [16.0, 17.0, null],
            "temperature_2m_max": [31.0, 29.0, 28.0],
            "precipitation_sum": [0.4, 3.1, 0.0],
            "precipitation_probability_max": [10, 55, 5],
            "et0_fao_evapotranspiration": [6.1, 4.8, 5.5],
            "relative_humidity_2m_max": [70, 85, 60],
            "relative_humidity_2m_min": [25, 45, 20],
            "wind_speed_10m_max": [18.0, 24.5, 12.0],
            "wind_gusts_10m_max": [35.0, 41.0, 22.0],
            "sunshine_duration": [43200, 21600, 46800],
            "uv_index_max": [9.1, 6.0, 9.5]
        }
    }"#;

    #[test]
    fn forecast_response_maps_to_report() {
        let fetched = Utc.with_ymd_and_hms(2025, 6, 1, 12, 5, 0).unwrap();
        let resp: ForecastResponse = serde_json::from_str(FORECAST_JSON).unwrap();
        let report = to_report(resp, fetched).unwrap();

        // local 14:00 at +02:00
        assert_eq!(
            report.current.observed_at,
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
        );
        assert_eq!(report.current.et0, 6.1);
        assert!((report.current.rain_next_24h - 3.5).abs() < 1e-9);
        assert_eq!(report.current.temp_min_24h, 16.0);
        assert_eq!(report.current.temp_max_24h, 31.0);

        // third day has no minimum and is dropped
        assert_eq!(report.daily.len(), 2);
        let tomorrow = &report.daily[1];
        assert_eq!(tomorrow.days_ahead, 1);
        assert_eq!(tomorrow.temp_avg, 23.0);
        assert_eq!(tomorrow.humidity_avg, 65.0);
        assert_eq!(tomorrow.sunshine_hours, 6.0);
        assert_eq!(tomorrow.fetched_at, fetched);
    }

    #[test]
    fn missing_current_temperature_is_an_error() {
        let json = FORECAST_JSON.replace("\"temperature_2m\": 27.5", "\"temperature_2m\": null");
        let resp: ForecastResponse = serde_json::from_str(&json).unwrap();
        let err = to_report(resp, Utc::now()).unwrap_err();
        assert!(err.is_provider_failure());
    }

    #[test]
    fn archive_days_skip_gaps() {
        let block: ArchiveBlock = serde_json::from_str(
            r#"{
                "time": ["2024-01-01", "2024-01-02", "2024-01-03"],
                "temperature_2m_mean": [8.5, null, 10.2],
                "temperature_2m_min": [2.0, 1.0, 4.0],
                "temperature_2m_max": [14.0, 12.0, 16.5],
                "precipitation_sum": [0.0, 5.0, null],
                "et0_fao_evapotranspiration": [1.1, 0.8, 1.3]
            }"#,
        )
        .unwrap();
        let days = to_archive_days(&block);
        assert_eq!(days.len(), 2);
        assert_eq!(days[1].precipitation, 0.0);
        assert_eq!(days[1].temp_mean, 10.2);
    }

    #[test]
    fn urls_carry_coordinates_and_fields() {
        let client = OpenMeteoClient::new(WeatherConfig::default()).unwrap();
        let url = client.forecast_url(37.25, -4.5);
        assert!(url.starts_with("https://api.open-meteo.com/v1/forecast?"));
        assert!(url.contains("latitude=37.2500&longitude=-4.5000"));
        assert!(url.contains("forecast_days=7"));
        assert!(url.contains("sunshine_duration"));

        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let url = client.archive_url(37.0, -4.0, start, end);
        assert!(url.starts_with("https://archive-api.open-meteo.com/v1/archive?"));
        assert!(url.contains("start_date=2020-01-01&end_date=2024-12-31"));
    }

    #[test]
    fn local_time_parsing() {
        assert_eq!(
            parse_local_time("2025-01-15T09:30", -10800),
            Some(Utc.with_ymd_and_hms(2025, 1, 15, 12, 30, 0).unwrap())
        );
        assert_eq!(parse_local_time("yesterday", 0), None);
    }
}
