use super::thresholds::*;
use crate::models::{ClimateProfile, DailyForecast, Observation, SeasonPhase};
use chrono::NaiveDate;
use serde::Serialize;

/// Derived field conditions for one day. Computed on demand, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayConditions {
    pub date: NaiveDate,
    pub days_ahead: u32,
    pub season: SeasonPhase,
    pub is_dormant: bool,

    pub is_dry: bool,
    pub is_calm: bool,
    pub has_frost_risk: bool,
    pub has_heat_risk: bool,
    pub is_sprayable: bool,
    pub is_treat_window: bool,
    pub is_irrigatable: bool,
    pub disease_risk: bool,
    pub pest_risk: bool,

    pub temp_min: f64,
    pub temp_max: f64,
    pub temp_avg: f64,
    pub humidity_avg: f64,
    pub humidity_max: f64,
    pub precipitation: f64,
    pub precipitation_probability: f64,
    pub wind_speed_max: f64,
    pub wind_gust_max: f64,
    pub et0: f64,
    /// ET0 scaled by the profile's ET multiplier.
    pub et0_adjusted: f64,
}

pub fn season_for(profile: &ClimateProfile, month: u32) -> SeasonPhase {
    SeasonPhase::from_season_month(profile.hemisphere().season_month(month))
}

pub fn classify(day: &DailyForecast, profile: &ClimateProfile) -> DayConditions {
    let month = day.month();
    let season = season_for(profile, month);
    let is_dormant = profile.is_dormant_month(month);

    let is_dry = day.precipitation_sum < PRECIP_LIGHT;
    let is_calm = day.wind_speed_max < WIND_STRONG;
    let has_frost_risk = day.temp_min <= TEMP_FROST;
    let has_heat_risk = day.temp_max >= TEMP_EXTREME;

    let is_sprayable = !is_dormant
        && is_dry
        && is_calm
        && day.temp_avg >= TEMP_SPRAY_MIN
        && day.temp_avg <= TEMP_SPRAY_MAX
        && day.humidity_max < HUMIDITY_VERY_HIGH;

    let is_treat_window =
        is_sprayable && day.sunshine_hours > TREAT_WINDOW_SUNSHINE_HOURS && !has_frost_risk;

    let is_irrigatable = !is_dormant
        && day.precipitation_sum < PRECIP_MODERATE * profile.irrigation_factor
        && day.precipitation_probability < IRRIGATION_MAX_RAIN_PROBABILITY;

    let is_wet = day.precipitation_sum >= PRECIP_LIGHT || day.humidity_max >= HUMIDITY_HIGH;
    let disease_risk = matches!(season, SeasonPhase::Late | SeasonPhase::Dormant)
        && is_wet
        && day.temp_avg >= TEMP_COLD
        && day.temp_avg <= TEMP_DISEASE_MAX;

    let pest_risk = matches!(season, SeasonPhase::Mid | SeasonPhase::Late)
        && day.temp_avg >= TEMP_PEST_MIN
        && day.temp_avg <= TEMP_PEST_MAX
        && day.humidity_avg >= HUMIDITY_OPT_MIN
        && day.precipitation_sum < PRECIP_HEAVY;

    DayConditions {
        date: day.date,
        days_ahead: day.days_ahead,
        season,
        is_dormant,
        is_dry,
        is_calm,
        has_frost_risk,
        has_heat_risk,
        is_sprayable,
        is_treat_window,
        is_irrigatable,
        disease_risk,
        pest_risk,
        temp_min: day.temp_min,
        temp_max: day.temp_max,
        temp_avg: day.temp_avg,
        humidity_avg: day.humidity_avg,
        humidity_max: day.humidity_max,
        precipitation: day.precipitation_sum,
        precipitation_probability: day.precipitation_probability,
        wind_speed_max: day.wind_speed_max,
        wind_gust_max: day.wind_gust_max,
        et0: day.et0,
        et0_adjusted: day.et0 * profile.et_multiplier,
    }
}

/// Classifies current conditions as a day-0 pseudo forecast. Sunshine is
/// unknown, so an observation never opens a treatment window.
pub fn classify_observation(obs: &Observation, profile: &ClimateProfile) -> DayConditions {
    let day = DailyForecast {
        date: obs.date(),
        days_ahead: 0,
        temp_min: obs.temp_min_24h,
        temp_max: obs.temp_max_24h,
        temp_avg: obs.temperature,
        precipitation_sum: obs.precipitation,
        precipitation_probability: 0.0,
        humidity_min: obs.humidity,
        humidity_max: obs.humidity,
        humidity_avg: obs.humidity,
        wind_speed_max: obs.wind_speed,
        wind_gust_max: obs.wind_speed,
        et0: obs.et0,
        sunshine_hours: 0.0,
        uv_index_max: 0.0,
        fetched_at: obs.fetched_at,
    };
    classify(&day, profile)
}

/// Classified view of a parcel's current observation and stored forecast.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldConditions {
    pub current: Option<DayConditions>,
    pub forecast: Vec<DayConditions>,
}

pub fn classify_all(days: &[DailyForecast], profile: &ClimateProfile) -> Vec<DayConditions> {
    let mut conditions: Vec<DayConditions> = days.iter().map(|d| classify(d, profile)).collect();
    conditions.sort_by_key(|c| c.days_ahead);
    conditions
}
