use super::ParcelId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PestType {
    /// Bactrocera oleae
    OliveFly,
    /// Spilocaea oleagina (olive leaf spot)
    PeacockSpot,
}

impl PestType {
    pub const ALL: [PestType; 2] = [PestType::OliveFly, PestType::PeacockSpot];

    pub fn as_str(&self) -> &'static str {
        match self {
            PestType::OliveFly => "olive_fly",
            PestType::PeacockSpot => "peacock_spot",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PestType::OliveFly => "Olive Fly",
            PestType::PeacockSpot => "Peacock Spot",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace([' ', '-'], "_").as_str() {
            "olive_fly" | "bactrocera_oleae" => Some(PestType::OliveFly),
            "peacock_spot" | "olive_leaf_spot" | "spilocaea_oleagina" => {
                Some(PestType::PeacockSpot)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for PestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    None,
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::None => "none",
            RiskLevel::Low => "low",
            RiskLevel::Moderate => "moderate",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" => Some(RiskLevel::None),
            "low" => Some(RiskLevel::Low),
            "moderate" => Some(RiskLevel::Moderate),
            "high" => Some(RiskLevel::High),
            "critical" => Some(RiskLevel::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lower score bounds for low, moderate, high and critical.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskCutPoints {
    pub low: f64,
    pub moderate: f64,
    pub high: f64,
    pub critical: f64,
}

impl RiskCutPoints {
    pub fn level(&self, score: f64) -> RiskLevel {
        if score >= self.critical {
            RiskLevel::Critical
        } else if score >= self.high {
            RiskLevel::High
        } else if score >= self.moderate {
            RiskLevel::Moderate
        } else if score >= self.low {
            RiskLevel::Low
        } else {
            RiskLevel::None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Increasing,
    Stable,
    Decreasing,
}

impl Trend {
    pub fn between(previous: f64, current: f64) -> Self {
        let delta = current - previous;
        if delta > 10.0 {
            Trend::Increasing
        } else if delta < -10.0 {
            Trend::Decreasing
        } else {
            Trend::Stable
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Increasing => "increasing",
            Trend::Stable => "stable",
            Trend::Decreasing => "decreasing",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "increasing" => Some(Trend::Increasing),
            "stable" => Some(Trend::Stable),
            "decreasing" => Some(Trend::Decreasing),
            _ => None,
        }
    }
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Recommended actions for one pest at one risk level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreatmentPlan {
    pub level: RiskLevel,
    pub monitoring: Vec<String>,
    pub chemical: Vec<String>,
    pub biological: Vec<String>,
    pub cultural: Vec<String>,
}

impl TreatmentPlan {
    pub fn empty(level: RiskLevel) -> Self {
        Self {
            level,
            monitoring: Vec::new(),
            chemical: Vec::new(),
            biological: Vec::new(),
            cultural: Vec::new(),
        }
    }

    pub fn with_monitoring(mut self, items: &[&str]) -> Self {
        self.monitoring.extend(items.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_chemical(mut self, items: &[&str]) -> Self {
        self.chemical.extend(items.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_biological(mut self, items: &[&str]) -> Self {
        self.biological.extend(items.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_cultural(mut self, items: &[&str]) -> Self {
        self.cultural.extend(items.iter().map(|s| s.to_string()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.monitoring.is_empty()
            && self.chemical.is_empty()
            && self.biological.is_empty()
            && self.cultural.is_empty()
    }
}

/// Weather figures one score was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskInputs {
    pub temperature: f64,
    pub humidity: f64,
    pub precipitation: f64,
    pub rain_next_24h: f64,
    /// Calendar month of the scored day
    pub month: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PestRiskAssessment {
    pub parcel_id: ParcelId,
    pub pest_type: PestType,
    pub date: NaiveDate,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub alert_message: String,
    pub plan: TreatmentPlan,
    pub inputs: RiskInputs,
    pub calculated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRiskPrediction {
    pub parcel_id: ParcelId,
    pub pest_type: PestType,
    pub days_ahead: u32,
    pub forecast_date: NaiveDate,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub trend: Trend,
    /// 40-100
    pub confidence: f64,
    pub alert_message: String,
    pub plan: TreatmentPlan,
    pub generated_at: DateTime<Utc>,
}

pub fn forecast_confidence(days_ahead: u32) -> f64 {
    (100.0 - 10.0 * days_ahead as f64).max(40.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trend_thresholds() {
        assert_eq!(Trend::between(30.0, 41.0), Trend::Increasing);
        assert_eq!(Trend::between(30.0, 40.0), Trend::Stable);
        assert_eq!(Trend::between(30.0, 20.0), Trend::Stable);
        assert_eq!(Trend::between(30.0, 19.0), Trend::Decreasing);
    }

    #[test]
    fn confidence_decays_to_floor() {
        assert_eq!(forecast_confidence(0), 100.0);
        assert_eq!(forecast_confidence(3), 70.0);
        assert_eq!(forecast_confidence(6), 40.0);
        assert_eq!(forecast_confidence(9), 40.0);
    }

    #[test]
    fn cut_points_map_scores() {
        let cuts = RiskCutPoints {
            low: 20.0,
            moderate: 40.0,
            high: 60.0,
            critical: 80.0,
        };
        assert_eq!(cuts.level(0.0), RiskLevel::None);
        assert_eq!(cuts.level(20.0), RiskLevel::Low);
        assert_eq!(cuts.level(59.9), RiskLevel::Moderate);
        assert_eq!(cuts.level(60.0), RiskLevel::High);
        assert_eq!(cuts.level(100.0), RiskLevel::Critical);
    }

    #[test]
    fn pest_type_from_str() {
        assert_eq!(PestType::from_str("olive-fly"), Some(PestType::OliveFly));
        assert_eq!(PestType::from_str("Peacock Spot"), Some(PestType::PeacockSpot));
        assert_eq!(PestType::from_str("aphid"), None);
    }

    #[test]
    fn plan_builder_collects_actions() {
        let plan = TreatmentPlan::empty(RiskLevel::High)
            .with_monitoring(&["Check traps"])
            .with_chemical(&["Spinosad bait"]);
        assert_eq!(plan.monitoring, vec!["Check traps".to_string()]);
        assert!(plan.biological.is_empty());
        assert!(!plan.is_empty());
        assert!(TreatmentPlan::empty(RiskLevel::None).is_empty());
    }
}
