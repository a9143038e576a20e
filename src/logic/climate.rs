//! Climate context resolution: location-based estimates, suitability scoring,
//! and the two upgrade paths (historical archive, observed weather history).

use crate::models::{
    ClimateProfile, ClimateStats, ClimateZone, DataTier, DormancyWindow, Hemisphere,
    HistoricalClimate, Observation, ParcelGeometry, ParcelId, ParcelLocation,
    SuitabilityAdjustment, SuitabilityFactor,
};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use std::collections::BTreeMap;

/// Confidence of a profile built from coordinates with measured altitude.
pub const LOCATION_CONFIDENCE: f64 = 0.4;
/// Confidence when altitude also had to be estimated.
pub const LOCATION_CONFIDENCE_ESTIMATED_ALTITUDE: f64 = 0.3;
pub const HISTORICAL_CONFIDENCE: f64 = 0.85;
pub const MIN_HISTORY_DAYS: usize = 30;
pub const PROFILE_MAX_AGE_DAYS: i64 = 30;

const DEFAULT_LATITUDE: f64 = 40.0;
const DEFAULT_LONGITUDE: f64 = 15.0;
const DEFAULT_ALTITUDE: f64 = 100.0;

/// Per-zone constants for location-only estimates (northern dormancy).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneDefaults {
    pub dormancy: DormancyWindow,
    pub irrigation_factor: f64,
    pub et_multiplier: f64,
    pub pest_pressure_factor: f64,
    pub frost_risk_factor: f64,
}

pub fn zone_defaults(zone: ClimateZone) -> ZoneDefaults {
    match zone {
        ClimateZone::Subtropical => ZoneDefaults {
            dormancy: DormancyWindow::new(12, 1),
            irrigation_factor: 0.80,
            et_multiplier: 1.20,
            pest_pressure_factor: 1.30,
            frost_risk_factor: 0.3,
        },
        ClimateZone::WarmMediterranean => ZoneDefaults {
            dormancy: DormancyWindow::new(11, 2),
            irrigation_factor: 0.85,
            et_multiplier: 1.10,
            pest_pressure_factor: 1.20,
            frost_risk_factor: 0.6,
        },
        ClimateZone::CentralMediterranean => ZoneDefaults {
            dormancy: DormancyWindow::new(11, 3),
            irrigation_factor: 1.00,
            et_multiplier: 1.00,
            pest_pressure_factor: 1.00,
            frost_risk_factor: 1.0,
        },
        ClimateZone::CoolMediterranean => ZoneDefaults {
            dormancy: DormancyWindow::new(11, 4),
            irrigation_factor: 1.10,
            et_multiplier: 0.90,
            pest_pressure_factor: 0.80,
            frost_risk_factor: 1.5,
        },
    }
}

/// Rough distance to the nearest Mediterranean/Atlantic coast (km).
pub fn estimate_distance_to_sea(latitude: f64, longitude: f64) -> f64 {
    let abs_lat = latitude.abs();
    if !(30.0..=45.0).contains(&abs_lat) {
        return 100.0;
    }
    if (7.0..=19.0).contains(&longitude) {
        // Italian peninsula: Tyrrhenian or Adriatic side
        let west = (longitude - 10.5).abs() * 80.0;
        let east = (longitude - 16.0).abs() * 80.0;
        west.min(east)
    } else if longitude > 19.0 && longitude <= 30.0 {
        (longitude - 24.0).abs() * 50.0
    } else if (-10.0..3.0).contains(&longitude) {
        let lon_dist = (longitude + 5.0).abs() * 80.0;
        let lat_dist = (latitude - 40.0).abs() * 100.0;
        lon_dist.min(lat_dist)
    } else {
        100.0
    }
}

/// Altitude guess from distance inland plus known upland blocks (m).
pub fn estimate_altitude(latitude: f64, longitude: f64, distance_to_sea_km: f64) -> f64 {
    let mut altitude = 50.0 + distance_to_sea_km * 2.0;
    // Apennines
    if (11.0..=15.0).contains(&longitude) && (41.0..=44.0).contains(&latitude) {
        altitude += 200.0;
    }
    // Alpine foothills
    if (45.0..=47.0).contains(&latitude) && (6.0..=14.0).contains(&longitude) {
        altitude += 500.0;
    }
    // Greek mainland
    if (20.0..=26.0).contains(&longitude) && (38.0..=41.0).contains(&latitude) {
        altitude += 150.0;
    }
    altitude.min(1200.0)
}

pub fn derive_location(geometry: &ParcelGeometry) -> ParcelLocation {
    let distance = geometry
        .distance_to_sea_km
        .unwrap_or_else(|| estimate_distance_to_sea(geometry.latitude, geometry.longitude));
    let (altitude, measured) = match geometry.altitude_m {
        Some(alt) => (alt, true),
        None => (
            estimate_altitude(geometry.latitude, geometry.longitude, distance),
            false,
        ),
    };
    ParcelLocation {
        latitude: geometry.latitude,
        longitude: geometry.longitude,
        altitude_m: altitude,
        distance_to_sea_km: distance,
        hemisphere: Hemisphere::from_latitude(geometry.latitude),
        altitude_measured: measured,
    }
}

/// Temperature, rainfall, chill and heat-sum estimates from location alone.
pub fn estimate_stats(location: &ParcelLocation) -> ClimateStats {
    let abs_lat = location.abs_latitude();
    // lapse rate of 6.5 °C per km
    let base = 27.0 - abs_lat * 0.55 - location.altitude_m * 0.0065;

    // local winter and summer, so no hemisphere swap is needed
    let (winter, summer) = if location.is_coastal() {
        (base - 8.0, base + 8.0)
    } else {
        let continental = (location.distance_to_sea_km / 100.0).min(1.5);
        (base - 10.0 * continental, base + 10.0 * continental)
    };

    let frost_days = if winter < 5.0 {
        (30.0 * (5.0 - winter) / 5.0).floor()
    } else {
        0.0
    };
    let hot_days = if summer > 30.0 {
        (30.0 * (summer - 30.0) / 5.0).floor()
    } else {
        0.0
    };

    let mut chilling_hours = 0.0;
    if winter < 7.0 {
        let winter_avg = (winter + 5.0) / 2.0;
        if winter_avg < 7.0 {
            chilling_hours = ((7.0 - winter_avg) * 150.0).floor();
        }
    }

    let annual_rainfall = if (30.0..=45.0).contains(&abs_lat) {
        let mut rain = 600.0;
        if location.longitude < 10.0 {
            rain += 100.0;
        }
        rain += location.altitude_m * 0.3;
        if location.distance_to_sea_km < 20.0 {
            rain += 100.0;
        }
        rain
    } else if abs_lat < 30.0 {
        300.0
    } else {
        800.0
    };

    let gdd = if base > 10.0 {
        ((base - 10.0) * 365.0 * 0.7).floor()
    } else {
        0.0
    };

    ClimateStats {
        avg_annual_temp: base,
        winter_temp: winter,
        summer_temp: summer,
        annual_rainfall_mm: annual_rainfall,
        frost_days,
        hot_days,
        gdd,
        chilling_hours,
        annual_et0_mm: None,
    }
}

fn clamp_score(score: f64) -> f64 {
    score.clamp(0.0, 100.0)
}

/// Suitability from estimated stats plus site bonuses. Returns (score, adjustments).
pub fn location_suitability(
    location: &ParcelLocation,
    stats: &ClimateStats,
) -> (f64, Vec<SuitabilityAdjustment>) {
    let mut adjustments = Vec::new();
    let mut push = |factor, points: f64| {
        adjustments.push(SuitabilityAdjustment { factor, points });
    };

    if stats.winter_temp < -10.0 {
        push(SuitabilityFactor::HardFrost, -50.0);
    } else if stats.winter_temp < 0.0 {
        push(SuitabilityFactor::SoftFrost, stats.winter_temp * 5.0);
    }

    if stats.summer_temp > 45.0 {
        push(SuitabilityFactor::ExtremeHeat, -30.0);
    } else if stats.summer_temp > 35.0 {
        push(SuitabilityFactor::HeatStress, -(stats.summer_temp - 35.0) * 3.0);
    }

    if stats.annual_rainfall_mm < 200.0 {
        push(SuitabilityFactor::AridRainfall, -40.0);
    } else if stats.annual_rainfall_mm < 400.0 {
        push(SuitabilityFactor::LowRainfall, -15.0);
    } else if stats.annual_rainfall_mm > 1000.0 {
        push(SuitabilityFactor::ExcessRainfall, -10.0);
    }

    if stats.chilling_hours < 200.0 {
        push(SuitabilityFactor::InsufficientChilling, -20.0);
    }
    if stats.gdd < 1500.0 {
        push(SuitabilityFactor::InsufficientGdd, -25.0);
    }

    if location.altitude_m > 800.0 {
        push(SuitabilityFactor::HighAltitude, -15.0);
    } else if (200.0..=600.0).contains(&location.altitude_m) {
        push(SuitabilityFactor::ModerateElevation, 5.0);
    }
    if location.distance_to_sea_km < 30.0 {
        push(SuitabilityFactor::CoastalInfluence, 5.0);
    }

    let score = clamp_score(100.0 + adjustments.iter().map(|a| a.points).sum::<f64>());
    (score, adjustments)
}

/// Suitability from a multi-year archive.
pub fn historical_suitability(h: &HistoricalClimate) -> (f64, Vec<SuitabilityAdjustment>) {
    let mut adjustments = Vec::new();
    let mut push = |factor, points: f64| {
        adjustments.push(SuitabilityAdjustment { factor, points });
    };

    if h.min_temp < -10.0 {
        push(SuitabilityFactor::HardFrost, -40.0);
    } else if h.min_temp < -5.0 {
        push(SuitabilityFactor::SoftFrost, -20.0);
    } else if h.min_temp < 0.0 {
        push(SuitabilityFactor::SoftFrost, -10.0);
    }

    if h.max_temp > 45.0 {
        push(SuitabilityFactor::ExtremeHeat, -25.0);
    } else if h.max_temp > 40.0 {
        push(SuitabilityFactor::HeatStress, -15.0);
    }

    if h.annual_precipitation < 200.0 {
        push(SuitabilityFactor::AridRainfall, -30.0);
    } else if h.annual_precipitation < 400.0 {
        push(SuitabilityFactor::LowRainfall, -15.0);
    } else if h.annual_precipitation > 1200.0 {
        push(SuitabilityFactor::ExcessRainfall, -10.0);
    }

    if h.gdd < 1500.0 {
        push(SuitabilityFactor::InsufficientGdd, -20.0);
    }
    if h.chilling_hours < 200.0 {
        push(SuitabilityFactor::InsufficientChilling, -15.0);
    }
    if h.frost_days > 60.0 {
        push(SuitabilityFactor::FrequentFrost, -15.0);
    }

    let score = clamp_score(100.0 + adjustments.iter().map(|a| a.points).sum::<f64>());
    (score, adjustments)
}

/// First profile for a parcel, built from coordinates only.
pub fn profile_from_location(
    parcel_id: ParcelId,
    location: ParcelLocation,
    now: DateTime<Utc>,
) -> ClimateProfile {
    let zone = ClimateZone::from_abs_latitude(location.abs_latitude());
    let defaults = zone_defaults(zone);
    let stats = estimate_stats(&location);
    let (score, adjustments) = location_suitability(&location, &stats);
    let confidence = if location.altitude_measured {
        LOCATION_CONFIDENCE
    } else {
        LOCATION_CONFIDENCE_ESTIMATED_ALTITUDE
    };

    ClimateProfile {
        parcel_id,
        zone,
        dormancy: defaults.dormancy.for_hemisphere(location.hemisphere),
        location,
        irrigation_factor: defaults.irrigation_factor,
        et_multiplier: defaults.et_multiplier,
        pest_pressure_factor: defaults.pest_pressure_factor,
        frost_risk_factor: defaults.frost_risk_factor,
        suitability_score: score,
        suitability: adjustments,
        confidence,
        tier: DataTier::LocationEstimate,
        stats,
        last_calculated: now,
    }
}

/// Mid-latitude Mediterranean context used when a parcel has no geometry.
/// Never persisted.
pub fn fallback_profile(parcel_id: ParcelId, now: DateTime<Utc>) -> ClimateProfile {
    let location = ParcelLocation {
        latitude: DEFAULT_LATITUDE,
        longitude: DEFAULT_LONGITUDE,
        altitude_m: DEFAULT_ALTITUDE,
        distance_to_sea_km: estimate_distance_to_sea(DEFAULT_LATITUDE, DEFAULT_LONGITUDE),
        hemisphere: Hemisphere::Northern,
        altitude_measured: false,
    };
    let mut profile = profile_from_location(parcel_id, location, now);
    profile.confidence = 0.0;
    profile
}

/// Recomputes factors and suitability from a multi-year archive.
pub fn apply_historical(
    profile: &ClimateProfile,
    h: &HistoricalClimate,
    now: DateTime<Utc>,
) -> ClimateProfile {
    let mut upgraded = profile.clone();

    if h.avg_temp > 18.0 {
        upgraded.irrigation_factor = 0.85;
        upgraded.et_multiplier = 1.15;
    } else if h.avg_temp < 14.0 {
        upgraded.irrigation_factor = 1.1;
        upgraded.et_multiplier = 0.9;
    }

    upgraded.frost_risk_factor = if h.frost_days > 60.0 {
        1.8
    } else if h.frost_days > 30.0 {
        1.3
    } else {
        0.8
    };

    let (score, adjustments) = historical_suitability(h);
    upgraded.suitability_score = score;
    upgraded.suitability = adjustments;
    upgraded.stats = ClimateStats {
        avg_annual_temp: h.avg_temp,
        winter_temp: h.min_temp,
        summer_temp: h.max_temp,
        annual_rainfall_mm: h.annual_precipitation,
        frost_days: h.frost_days,
        hot_days: h.hot_days,
        gdd: h.gdd,
        chilling_hours: h.chilling_hours,
        annual_et0_mm: Some(h.annual_et0),
    };
    upgraded.tier = DataTier::HistoricalApi;
    upgraded.confidence = HISTORICAL_CONFIDENCE;
    upgraded.last_calculated = now;
    upgraded
}

pub fn history_confidence(days: usize) -> f64 {
    match days {
        d if d >= 365 => 1.0,
        d if d >= 180 => 0.9,
        d if d >= 90 => 0.7,
        d if d >= 30 => 0.5,
        _ => 0.3,
    }
}

#[derive(Debug, Clone, Copy)]
struct DayMeans {
    temperature: f64,
    et0: f64,
}

fn daily_means(observations: &[Observation]) -> BTreeMap<NaiveDate, DayMeans> {
    let mut sums: BTreeMap<NaiveDate, (f64, f64, usize)> = BTreeMap::new();
    for obs in observations {
        let entry = sums.entry(obs.date()).or_insert((0.0, 0.0, 0));
        entry.0 += obs.temperature;
        entry.1 += obs.et0;
        entry.2 += 1;
    }
    sums.into_iter()
        .map(|(date, (t, e, n))| {
            let n = n as f64;
            (
                date,
                DayMeans {
                    temperature: t / n,
                    et0: e / n,
                },
            )
        })
        .collect()
}

fn is_summer(month: u32, hemisphere: Hemisphere) -> bool {
    matches!(hemisphere.season_month(month), 6..=8)
}

/// Refines a profile from stored observations. `None` below 30 observed days.
pub fn apply_weather_history(
    profile: &ClimateProfile,
    observations: &[Observation],
    now: DateTime<Utc>,
) -> Option<ClimateProfile> {
    let days = daily_means(observations);
    if days.len() < MIN_HISTORY_DAYS {
        return None;
    }
    let hemisphere = profile.hemisphere();

    let summer_et: Vec<f64> = days
        .iter()
        .filter(|(date, _)| is_summer(date.month(), hemisphere))
        .map(|(_, d)| d.et0)
        .collect();
    let summer_et_avg = if summer_et.is_empty() {
        5.0
    } else {
        summer_et.iter().sum::<f64>() / summer_et.len() as f64
    };

    let mut upgraded = profile.clone();
    if summer_et_avg > 6.0 {
        upgraded.irrigation_factor = 0.85;
        upgraded.et_multiplier = 1.15;
    } else if summer_et_avg < 4.0 {
        upgraded.irrigation_factor = 1.10;
        upgraded.et_multiplier = 0.90;
    }

    let cold_days = days.values().filter(|d| d.temperature < 10.0).count() as f64;
    let cold_per_year = cold_days * 365.0 / days.len() as f64;
    let dormancy = if cold_per_year < 60.0 {
        DormancyWindow::new(12, 2)
    } else if cold_per_year > 120.0 {
        DormancyWindow::new(11, 4)
    } else {
        DormancyWindow::new(11, 3)
    };
    upgraded.dormancy = dormancy.for_hemisphere(hemisphere);

    upgraded.stats.avg_annual_temp =
        days.values().map(|d| d.temperature).sum::<f64>() / days.len() as f64;
    upgraded.tier = DataTier::WeatherHistory;
    upgraded.confidence = history_confidence(days.len());
    upgraded.last_calculated = now;
    Some(upgraded)
}
