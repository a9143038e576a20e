use super::{Hemisphere, ParcelId, ParcelLocation};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Latitude bucket used for location-only estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClimateZone {
    Subtropical,
    WarmMediterranean,
    CentralMediterranean,
    CoolMediterranean,
}

impl ClimateZone {
    pub fn from_abs_latitude(abs_lat: f64) -> Self {
        if abs_lat < 30.0 {
            ClimateZone::Subtropical
        } else if abs_lat < 38.0 {
            ClimateZone::WarmMediterranean
        } else if abs_lat < 42.0 {
            ClimateZone::CentralMediterranean
        } else {
            ClimateZone::CoolMediterranean
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ClimateZone::Subtropical => "subtropical",
            ClimateZone::WarmMediterranean => "warm_mediterranean",
            ClimateZone::CentralMediterranean => "central_mediterranean",
            ClimateZone::CoolMediterranean => "cool_mediterranean",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClimateZone::Subtropical => "Subtropical",
            ClimateZone::WarmMediterranean => "Warm Mediterranean",
            ClimateZone::CentralMediterranean => "Central Mediterranean",
            ClimateZone::CoolMediterranean => "Cool Mediterranean",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace([' ', '-'], "_").as_str() {
            "subtropical" => Some(ClimateZone::Subtropical),
            "warm_mediterranean" => Some(ClimateZone::WarmMediterranean),
            "central_mediterranean" => Some(ClimateZone::CentralMediterranean),
            "cool_mediterranean" => Some(ClimateZone::CoolMediterranean),
            _ => None,
        }
    }
}

impl std::fmt::Display for ClimateZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Evidence level behind a climate profile, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataTier {
    LocationEstimate,
    WeatherHistory,
    HistoricalApi,
}

impl DataTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataTier::LocationEstimate => "location_estimate",
            DataTier::WeatherHistory => "weather_history",
            DataTier::HistoricalApi => "historical_api",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "location_estimate" => Some(DataTier::LocationEstimate),
            "weather_history" => Some(DataTier::WeatherHistory),
            "historical_api" => Some(DataTier::HistoricalApi),
            _ => None,
        }
    }
}

impl std::fmt::Display for DataTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Inclusive month range; wraps over the new year when start > end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DormancyWindow {
    pub start_month: u32,
    pub end_month: u32,
}

impl DormancyWindow {
    pub fn new(start_month: u32, end_month: u32) -> Self {
        Self {
            start_month,
            end_month,
        }
    }

    pub fn contains(&self, month: u32) -> bool {
        if self.start_month <= self.end_month {
            month >= self.start_month && month <= self.end_month
        } else {
            month >= self.start_month || month <= self.end_month
        }
    }

    /// The same window six months later, for the southern hemisphere.
    pub fn mirrored(&self) -> Self {
        let shift = |m: u32| ((m + 5) % 12) + 1;
        Self::new(shift(self.start_month), shift(self.end_month))
    }

    pub fn for_hemisphere(self, hemisphere: Hemisphere) -> Self {
        if hemisphere.is_northern() {
            self
        } else {
            self.mirrored()
        }
    }
}

/// Annualized climate figures behind a profile (estimated or measured).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClimateStats {
    pub avg_annual_temp: f64,
    /// Coldest-month mean (estimate) or absolute minimum (archive).
    pub winter_temp: f64,
    /// Warmest-month mean (estimate) or absolute maximum (archive).
    pub summer_temp: f64,
    pub annual_rainfall_mm: f64,
    pub frost_days: f64,
    pub hot_days: f64,
    pub gdd: f64,
    pub chilling_hours: f64,
    pub annual_et0_mm: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuitabilityFactor {
    HardFrost,
    SoftFrost,
    ExtremeHeat,
    HeatStress,
    AridRainfall,
    LowRainfall,
    ExcessRainfall,
    InsufficientChilling,
    InsufficientGdd,
    HighAltitude,
    FrequentFrost,
    ModerateElevation,
    CoastalInfluence,
}

impl SuitabilityFactor {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuitabilityFactor::HardFrost => "Winter minimum below hard frost limit",
            SuitabilityFactor::SoftFrost => "Winter frost damage risk",
            SuitabilityFactor::ExtremeHeat => "Summer maximum above heat tolerance",
            SuitabilityFactor::HeatStress => "Summer heat stress",
            SuitabilityFactor::AridRainfall => "Annual rainfall far below requirement",
            SuitabilityFactor::LowRainfall => "Low annual rainfall",
            SuitabilityFactor::ExcessRainfall => "Excessive rainfall (disease pressure)",
            SuitabilityFactor::InsufficientChilling => "Insufficient chilling hours for flowering",
            SuitabilityFactor::InsufficientGdd => "Insufficient growing degree days",
            SuitabilityFactor::HighAltitude => "High altitude",
            SuitabilityFactor::FrequentFrost => "Frequent frost days",
            SuitabilityFactor::ModerateElevation => "Moderate elevation",
            SuitabilityFactor::CoastalInfluence => "Maritime climate moderation",
        }
    }

    pub fn is_bonus(&self) -> bool {
        matches!(
            self,
            SuitabilityFactor::ModerateElevation | SuitabilityFactor::CoastalInfluence
        )
    }
}

impl std::fmt::Display for SuitabilityFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One scored adjustment; negative points are penalties.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SuitabilityAdjustment {
    pub factor: SuitabilityFactor,
    pub points: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuitabilityBand {
    Excellent,
    Good,
    Marginal,
    Challenging,
}

impl SuitabilityBand {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            SuitabilityBand::Excellent
        } else if score >= 60.0 {
            SuitabilityBand::Good
        } else if score >= 40.0 {
            SuitabilityBand::Marginal
        } else {
            SuitabilityBand::Challenging
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SuitabilityBand::Excellent => "Excellent conditions for olive cultivation",
            SuitabilityBand::Good => "Good conditions with some limitations",
            SuitabilityBand::Marginal => "Marginal conditions - careful management needed",
            SuitabilityBand::Challenging => "Challenging conditions for olives",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateProfile {
    pub parcel_id: ParcelId,
    pub zone: ClimateZone,
    pub location: ParcelLocation,
    pub dormancy: DormancyWindow,
    pub irrigation_factor: f64,
    pub et_multiplier: f64,
    pub pest_pressure_factor: f64,
    pub frost_risk_factor: f64,
    /// 0-100
    pub suitability_score: f64,
    pub suitability: Vec<SuitabilityAdjustment>,
    /// 0-1
    pub confidence: f64,
    pub tier: DataTier,
    pub stats: ClimateStats,
    pub last_calculated: DateTime<Utc>,
}

impl ClimateProfile {
    pub fn hemisphere(&self) -> Hemisphere {
        self.location.hemisphere
    }

    pub fn is_dormant_month(&self, month: u32) -> bool {
        self.dormancy.contains(month)
    }

    pub fn suitability_band(&self) -> SuitabilityBand {
        SuitabilityBand::from_score(self.suitability_score)
    }

    pub fn suitability_summary(&self) -> String {
        let notes: Vec<&str> = self
            .suitability
            .iter()
            .map(|adj| adj.factor.as_str())
            .collect();
        if notes.is_empty() {
            self.suitability_band().as_str().to_string()
        } else {
            format!("{}. {}", self.suitability_band().as_str(), notes.join("; "))
        }
    }

    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_calculated).num_days()
    }

    /// Low-confidence or older than 30 days.
    pub fn needs_upgrade(&self, now: DateTime<Utc>) -> bool {
        self.confidence < 0.5 || self.age_days(now) > 30
    }
}

/// One day of the historical archive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArchiveDay {
    pub date: NaiveDate,
    pub temp_mean: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub precipitation: f64,
    pub et0: f64,
}

/// Multi-year archive aggregated to annual means.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoricalClimate {
    pub years: u32,
    pub days: usize,
    pub avg_temp: f64,
    pub min_temp: f64,
    pub max_temp: f64,
    pub annual_precipitation: f64,
    pub annual_et0: f64,
    pub frost_days: f64,
    pub hot_days: f64,
    pub gdd: f64,
    pub chilling_hours: f64,
}

impl HistoricalClimate {
    pub fn aggregate(days: &[ArchiveDay], years: u32) -> Option<Self> {
        if days.is_empty() || years == 0 {
            return None;
        }
        let years_f = years as f64;
        let mut agg = HistoricalClimate {
            years,
            days: days.len(),
            min_temp: f64::MAX,
            max_temp: f64::MIN,
            ..Default::default()
        };
        let mut temp_sum = 0.0;
        let mut precip_sum = 0.0;
        let mut et0_sum = 0.0;

        for day in days {
            temp_sum += day.temp_mean;
            agg.min_temp = agg.min_temp.min(day.temp_min);
            agg.max_temp = agg.max_temp.max(day.temp_max);
            if day.temp_min < 0.0 {
                agg.frost_days += 1.0;
            }
            if day.temp_max > 35.0 {
                agg.hot_days += 1.0;
            }
            if day.temp_mean > 10.0 {
                agg.gdd += (day.temp_mean - 10.0).floor();
            }
            if day.temp_mean < 7.0 {
                agg.chilling_hours += ((7.0 - day.temp_mean) * 2.0).floor();
            }
            precip_sum += day.precipitation;
            et0_sum += day.et0;
        }

        agg.avg_temp = temp_sum / days.len() as f64;
        agg.annual_precipitation = precip_sum / years_f;
        agg.annual_et0 = et0_sum / years_f;
        agg.frost_days /= years_f;
        agg.hot_days /= years_f;
        agg.gdd /= years_f;
        agg.chilling_hours /= years_f;
        Some(agg)
    }
}
