use super::ParcelId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthStage {
    Dormant,
    Flowering,
    FruitSet,
    FruitDevelopment,
    Harvest,
    PostHarvest,
}

impl GrowthStage {
    pub const ALL: [GrowthStage; 6] = [
        GrowthStage::Dormant,
        GrowthStage::Flowering,
        GrowthStage::FruitSet,
        GrowthStage::FruitDevelopment,
        GrowthStage::Harvest,
        GrowthStage::PostHarvest,
    ];

    /// Calendar lookup; not hemisphere-adjusted.
    pub fn from_month(month: u32) -> Self {
        match month {
            12 | 1 | 2 => GrowthStage::Dormant,
            3 | 4 => GrowthStage::Flowering,
            5 => GrowthStage::FruitSet,
            6..=9 => GrowthStage::FruitDevelopment,
            10 => GrowthStage::Harvest,
            _ => GrowthStage::PostHarvest,
        }
    }

    /// FAO-56 crop coefficient for olive at this stage.
    pub fn kc(&self) -> f64 {
        match self {
            GrowthStage::Dormant => 0.50,
            GrowthStage::Flowering => 0.65,
            GrowthStage::FruitSet => 0.70,
            GrowthStage::FruitDevelopment => 0.75,
            GrowthStage::Harvest => 0.65,
            GrowthStage::PostHarvest => 0.55,
        }
    }

    /// Depletion ratio at which irrigation is triggered.
    pub fn trigger_threshold(&self) -> f64 {
        if self.is_critical() {
            0.40
        } else {
            0.50
        }
    }

    /// Stages where water stress hurts yield most.
    pub fn is_critical(&self) -> bool {
        matches!(self, GrowthStage::Flowering | GrowthStage::FruitSet)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GrowthStage::Dormant => "dormant",
            GrowthStage::Flowering => "flowering",
            GrowthStage::FruitSet => "fruit_set",
            GrowthStage::FruitDevelopment => "fruit_development",
            GrowthStage::Harvest => "harvest",
            GrowthStage::PostHarvest => "post_harvest",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "dormant" => Some(GrowthStage::Dormant),
            "flowering" => Some(GrowthStage::Flowering),
            "fruit_set" => Some(GrowthStage::FruitSet),
            "fruit_development" => Some(GrowthStage::FruitDevelopment),
            "harvest" => Some(GrowthStage::Harvest),
            "post_harvest" => Some(GrowthStage::PostHarvest),
            _ => None,
        }
    }
}

impl std::fmt::Display for GrowthStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StressLevel {
    None,
    Mild,
    Moderate,
    Severe,
}

impl StressLevel {
    pub fn from_depletion(ratio: f64) -> Self {
        if ratio < 0.30 {
            StressLevel::None
        } else if ratio < 0.50 {
            StressLevel::Mild
        } else if ratio < 0.70 {
            StressLevel::Moderate
        } else {
            StressLevel::Severe
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StressLevel::None => "none",
            StressLevel::Mild => "mild",
            StressLevel::Moderate => "moderate",
            StressLevel::Severe => "severe",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" => Some(StressLevel::None),
            "mild" => Some(StressLevel::Mild),
            "moderate" => Some(StressLevel::Moderate),
            "severe" => Some(StressLevel::Severe),
            _ => None,
        }
    }
}

impl std::fmt::Display for StressLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl Urgency {
    pub fn from_depletion(ratio: f64) -> Self {
        if ratio >= 1.0 {
            Urgency::Critical
        } else if ratio >= 0.70 {
            Urgency::High
        } else if ratio >= 0.50 {
            Urgency::Medium
        } else {
            Urgency::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::None => "none",
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
            Urgency::Critical => "critical",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" => Some(Urgency::None),
            "low" => Some(Urgency::Low),
            "medium" => Some(Urgency::Medium),
            "high" => Some(Urgency::High),
            "critical" => Some(Urgency::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeficitStrategy {
    #[default]
    None,
    /// Cut back during pit hardening and fruit growth only.
    Regulated,
    /// Uniform cut outside flowering and fruit set.
    Sustained,
}

impl DeficitStrategy {
    /// Percent reduction applied to the recommended amount at a stage.
    pub fn reduction_percent(&self, stage: GrowthStage) -> f64 {
        match self {
            DeficitStrategy::None => 0.0,
            DeficitStrategy::Regulated => {
                if stage == GrowthStage::FruitDevelopment {
                    30.0
                } else {
                    0.0
                }
            }
            DeficitStrategy::Sustained => {
                if stage.is_critical() {
                    0.0
                } else {
                    20.0
                }
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeficitStrategy::None => "none",
            DeficitStrategy::Regulated => "regulated",
            DeficitStrategy::Sustained => "sustained",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" | "" => Some(DeficitStrategy::None),
            "regulated" | "rdi" => Some(DeficitStrategy::Regulated),
            "sustained" | "sdi" => Some(DeficitStrategy::Sustained),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeficitStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoilTexture {
    Sand,
    SandyLoam,
    Loam,
    SiltLoam,
    ClayLoam,
    Clay,
}

impl SoilTexture {
    pub fn as_str(&self) -> &'static str {
        match self {
            SoilTexture::Sand => "sand",
            SoilTexture::SandyLoam => "sandy_loam",
            SoilTexture::Loam => "loam",
            SoilTexture::SiltLoam => "silt_loam",
            SoilTexture::ClayLoam => "clay_loam",
            SoilTexture::Clay => "clay",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace([' ', '-'], "_").as_str() {
            "sand" | "sandy" => Some(SoilTexture::Sand),
            "sandy_loam" => Some(SoilTexture::SandyLoam),
            "loam" => Some(SoilTexture::Loam),
            "silt_loam" => Some(SoilTexture::SiltLoam),
            "clay_loam" => Some(SoilTexture::ClayLoam),
            "clay" => Some(SoilTexture::Clay),
            _ => None,
        }
    }
}

impl std::fmt::Display for SoilTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemType {
    Drip,
    MicroSprinkler,
    Sprinkler,
    Subsurface,
}

impl SystemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemType::Drip => "drip",
            SystemType::MicroSprinkler => "micro_sprinkler",
            SystemType::Sprinkler => "sprinkler",
            SystemType::Subsurface => "subsurface",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace([' ', '-'], "_").as_str() {
            "drip" => Some(SystemType::Drip),
            "micro_sprinkler" | "microsprinkler" => Some(SystemType::MicroSprinkler),
            "sprinkler" => Some(SystemType::Sprinkler),
            "subsurface" => Some(SystemType::Subsurface),
            _ => None,
        }
    }
}

impl std::fmt::Display for SystemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilProfile {
    pub parcel_id: ParcelId,
    pub texture: SoilTexture,
    /// volumetric %
    pub field_capacity: f64,
    /// volumetric %
    pub wilting_point: f64,
    /// mm of plant-available water in the root zone
    pub available_water_capacity: f64,
    pub root_depth_cm: f64,
    /// mm/h
    pub infiltration_rate: f64,
    pub slope_percent: f64,
    pub organic_matter: f64,
}

impl SoilProfile {
    /// Mediterranean clay-loam preset.
    pub fn mediterranean_default(parcel_id: ParcelId) -> Self {
        Self {
            parcel_id,
            texture: SoilTexture::ClayLoam,
            field_capacity: 25.0,
            wilting_point: 12.0,
            available_water_capacity: 150.0,
            root_depth_cm: 120.0,
            infiltration_rate: 10.0,
            slope_percent: 5.0,
            organic_matter: 2.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrrigationSystemSpec {
    pub parcel_id: ParcelId,
    pub system_type: SystemType,
    /// 0-100
    pub efficiency: f64,
    /// L/h per emitter
    pub flow_rate: f64,
    pub emitter_spacing_cm: f64,
    pub tree_spacing_m: f64,
}

impl IrrigationSystemSpec {
    /// Drip preset at 6 m tree spacing.
    pub fn drip_default(parcel_id: ParcelId) -> Self {
        Self {
            parcel_id,
            system_type: SystemType::Drip,
            efficiency: 90.0,
            flow_rate: 4.0,
            emitter_spacing_cm: 50.0,
            tree_spacing_m: 6.0,
        }
    }

    pub fn effective_tree_spacing(&self) -> f64 {
        if self.tree_spacing_m > 0.0 {
            self.tree_spacing_m
        } else {
            6.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrrigationRecommendation {
    pub parcel_id: ParcelId,
    pub calculation_date: NaiveDate,
    pub et0: f64,
    pub kc: f64,
    pub etc: f64,
    pub rainfall: f64,
    pub effective_rainfall: f64,
    pub irrigation_applied: f64,
    pub water_balance: f64,
    pub cumulative_deficit: f64,
    pub soil_moisture: f64,
    pub should_irrigate: bool,
    pub recommended_amount_mm: f64,
    pub recommended_liters_per_tree: f64,
    pub urgency: Urgency,
    pub growth_stage: GrowthStage,
    pub stress_level: StressLevel,
    pub next_irrigation_date: Option<NaiveDate>,
    pub weather_forecast: String,
    pub deficit_strategy: DeficitStrategy,
    pub deficit_reduction_percent: f64,
}

impl IrrigationRecommendation {
    pub fn depletion_ratio(&self, awc: f64) -> f64 {
        if awc <= 0.0 {
            return 1.0;
        }
        (self.cumulative_deficit / awc).min(1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrrigationEvent {
    pub id: Option<i64>,
    pub parcel_id: ParcelId,
    pub date: NaiveDate,
    /// mm (L/m²)
    pub water_amount_mm: f64,
    pub duration_minutes: Option<f64>,
    pub method: Option<SystemType>,
    pub water_source: Option<String>,
    /// L/h
    pub flow_rate: Option<f64>,
    pub cost: Option<f64>,
    pub energy_kwh: Option<f64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl IrrigationEvent {
    pub fn new(parcel_id: ParcelId, date: NaiveDate, water_amount_mm: f64) -> Self {
        Self {
            id: None,
            parcel_id,
            date,
            water_amount_mm,
            duration_minutes: None,
            method: None,
            water_source: None,
            flow_rate: None,
            cost: None,
            energy_kwh: None,
            notes: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_method(mut self, method: SystemType) -> Self {
        self.method = Some(method);
        self
    }

    pub fn with_duration(mut self, minutes: f64) -> Self {
        self.duration_minutes = Some(minutes);
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterUsageStats {
    pub parcel_id: ParcelId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_water_applied_mm: f64,
    pub total_liters_per_tree: f64,
    pub irrigation_events: usize,
    pub average_water_per_event_mm: f64,
    pub total_cost: f64,
    pub total_energy_kwh: f64,
    pub total_etc_mm: f64,
    pub total_effective_rainfall_mm: f64,
    /// Crop demand covered per mm supplied, as a percentage capped at 100.
    pub water_use_efficiency: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growth_stage_calendar() {
        assert_eq!(GrowthStage::from_month(1), GrowthStage::Dormant);
        assert_eq!(GrowthStage::from_month(12), GrowthStage::Dormant);
        assert_eq!(GrowthStage::from_month(4), GrowthStage::Flowering);
        assert_eq!(GrowthStage::from_month(5), GrowthStage::FruitSet);
        assert_eq!(GrowthStage::from_month(7), GrowthStage::FruitDevelopment);
        assert_eq!(GrowthStage::from_month(10), GrowthStage::Harvest);
        assert_eq!(GrowthStage::from_month(11), GrowthStage::PostHarvest);
    }

    #[test]
    fn critical_stages_trigger_earlier() {
        assert_eq!(GrowthStage::Flowering.trigger_threshold(), 0.40);
        assert_eq!(GrowthStage::FruitSet.trigger_threshold(), 0.40);
        assert_eq!(GrowthStage::FruitDevelopment.trigger_threshold(), 0.50);
        assert_eq!(GrowthStage::Dormant.trigger_threshold(), 0.50);
    }

    #[test]
    fn growth_stage_round_trip() {
        for stage in GrowthStage::ALL {
            assert_eq!(GrowthStage::from_str(stage.as_str()), Some(stage));
        }
    }

    #[test]
    fn stress_cut_points() {
        assert_eq!(StressLevel::from_depletion(0.0), StressLevel::None);
        assert_eq!(StressLevel::from_depletion(0.29), StressLevel::None);
        assert_eq!(StressLevel::from_depletion(0.30), StressLevel::Mild);
        assert_eq!(StressLevel::from_depletion(0.55), StressLevel::Moderate);
        assert_eq!(StressLevel::from_depletion(0.70), StressLevel::Severe);
    }

    #[test]
    fn urgency_cut_points() {
        assert_eq!(Urgency::from_depletion(0.45), Urgency::Low);
        assert_eq!(Urgency::from_depletion(0.5), Urgency::Medium);
        assert_eq!(Urgency::from_depletion(0.8), Urgency::High);
        assert_eq!(Urgency::from_depletion(1.0), Urgency::Critical);
    }

    #[test]
    fn deficit_strategies_spare_critical_stages() {
        assert_eq!(
            DeficitStrategy::Regulated.reduction_percent(GrowthStage::FruitDevelopment),
            30.0
        );
        assert_eq!(
            DeficitStrategy::Regulated.reduction_percent(GrowthStage::Flowering),
            0.0
        );
        assert_eq!(
            DeficitStrategy::Sustained.reduction_percent(GrowthStage::FruitSet),
            0.0
        );
        assert_eq!(
            DeficitStrategy::Sustained.reduction_percent(GrowthStage::Harvest),
            20.0
        );
        assert_eq!(
            DeficitStrategy::None.reduction_percent(GrowthStage::FruitDevelopment),
            0.0
        );
    }

    #[test]
    fn texture_from_str_variants() {
        assert_eq!(SoilTexture::from_str("clay-loam"), Some(SoilTexture::ClayLoam));
        assert_eq!(SoilTexture::from_str("Sandy Loam"), Some(SoilTexture::SandyLoam));
        assert_eq!(SoilTexture::from_str("peat"), None);
    }

    #[test]
    fn tree_spacing_defaults_when_unset() {
        let mut system = IrrigationSystemSpec::drip_default(ParcelId(1));
        system.tree_spacing_m = 0.0;
        assert_eq!(system.effective_tree_spacing(), 6.0);
    }
}
