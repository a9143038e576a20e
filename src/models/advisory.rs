use super::{ClimateZone, DataTier, Hemisphere, ParcelId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonPhase {
    Dormant,
    Early,
    Mid,
    Late,
}

impl SeasonPhase {
    /// Phase for a northern-calendar month (see `Hemisphere::season_month`).
    pub fn from_season_month(month: u32) -> Self {
        match month {
            12 | 1 | 2 => SeasonPhase::Dormant,
            3 | 4 => SeasonPhase::Early,
            5..=7 => SeasonPhase::Mid,
            _ => SeasonPhase::Late,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SeasonPhase::Dormant => "dormant",
            SeasonPhase::Early => "early",
            SeasonPhase::Mid => "mid",
            SeasonPhase::Late => "late",
        }
    }
}

impl std::fmt::Display for SeasonPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisoryType {
    Weather,
    Treatment,
    Irrigation,
    Disease,
    Pest,
    Info,
}

impl AdvisoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdvisoryType::Weather => "weather",
            AdvisoryType::Treatment => "treatment",
            AdvisoryType::Irrigation => "irrigation",
            AdvisoryType::Disease => "disease",
            AdvisoryType::Pest => "pest",
            AdvisoryType::Info => "info",
        }
    }
}

impl std::fmt::Display for AdvisoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Info => "info",
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advisory {
    pub kind: AdvisoryType,
    pub priority: Priority,
    pub days_ahead: u32,
    pub message: String,
    pub reason: String,
    pub action: Option<String>,
}

impl Advisory {
    pub fn new(
        kind: AdvisoryType,
        priority: Priority,
        days_ahead: u32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            priority,
            days_ahead,
            message: message.into(),
            reason: String::new(),
            action: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }
}

/// Climate and season context the advisory was generated under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateSnapshot {
    pub zone: ClimateZone,
    pub hemisphere: Hemisphere,
    pub season: SeasonPhase,
    pub is_dormant: bool,
    pub confidence: f64,
    pub tier: DataTier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherAdvisory {
    pub parcel_id: ParcelId,
    pub generated_at: DateTime<Utc>,
    pub advisories: Vec<Advisory>,
    /// -1 when no day in the window qualifies
    pub best_spray_day: i32,
    /// -1 when no day in the window qualifies
    pub best_irrigate_day: i32,
    pub rain_expected_days: Vec<u32>,
    pub coordination_warnings: Vec<String>,
    pub climate: ClimateSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrrigateDecision {
    pub should_irrigate: bool,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SprayDecision {
    pub should_spray: bool,
    pub reason: String,
    /// Day to spray (0 = today), -1 when none
    pub best_day: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentWindow {
    /// -1 when none within the horizon
    pub day: i32,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn season_phases_by_month() {
        assert_eq!(SeasonPhase::from_season_month(1), SeasonPhase::Dormant);
        assert_eq!(SeasonPhase::from_season_month(12), SeasonPhase::Dormant);
        assert_eq!(SeasonPhase::from_season_month(4), SeasonPhase::Early);
        assert_eq!(SeasonPhase::from_season_month(6), SeasonPhase::Mid);
        assert_eq!(SeasonPhase::from_season_month(8), SeasonPhase::Late);
        assert_eq!(SeasonPhase::from_season_month(11), SeasonPhase::Late);
    }

    #[test]
    fn priority_ordering() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::Medium > Priority::Low);
        assert!(Priority::Low > Priority::Info);
    }
}
