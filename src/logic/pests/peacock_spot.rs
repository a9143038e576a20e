use super::PestModel;
use crate::models::{PestType, RiskCutPoints, RiskInputs, RiskLevel, TreatmentPlan};

/// Peacock spot, olive leaf spot (Spilocaea oleagina).
///
/// A fungal infection driven by leaf wetness at mild temperatures. Active
/// all year, peaking in autumn and spring.
pub struct PeacockSpotModel;

impl PestModel for PeacockSpotModel {
    fn pest_type(&self) -> PestType {
        PestType::PeacockSpot
    }

    fn cut_points(&self) -> RiskCutPoints {
        RiskCutPoints {
            low: 15.0,
            moderate: 35.0,
            high: 55.0,
            critical: 75.0,
        }
    }

    fn score(&self, inputs: &RiskInputs, season_month: u32) -> f64 {
        let t = inputs.temperature;
        let temperature = if (10.0..=20.0).contains(&t) {
            35.0
        } else if t > 20.0 && t <= 25.0 {
            25.0
        } else if t > 5.0 && t < 10.0 {
            15.0
        } else {
            5.0
        };

        let wetness = if inputs.precipitation > 5.0 || inputs.humidity > 90.0 {
            40.0
        } else if inputs.precipitation > 1.0 || inputs.humidity > 80.0 {
            30.0
        } else if inputs.humidity > 70.0 {
            20.0
        } else {
            5.0
        };

        let season = match season_month {
            9..=11 => 15.0,
            3..=5 => 12.0,
            12 | 1 | 2 => 8.0,
            _ => 3.0,
        };

        let forecast = if inputs.rain_next_24h > 5.0 {
            10.0
        } else if inputs.rain_next_24h > 0.0 {
            5.0
        } else {
            0.0
        };

        temperature + wetness + season + forecast
    }

    fn alert(&self, level: RiskLevel) -> &'static str {
        match level {
            RiskLevel::Critical => "Critical infection risk: Apply preventive treatment immediately.",
            RiskLevel::High => "High infection risk: Plan preventive treatment within 24-48 hours.",
            RiskLevel::Moderate => "Moderate risk: Monitor weather closely and prepare for treatment.",
            RiskLevel::Low => "Low risk: Continue routine monitoring.",
            RiskLevel::None => "Minimal risk: Weather conditions unfavorable for infection.",
        }
    }

    fn plan(&self, level: RiskLevel) -> TreatmentPlan {
        let plan = TreatmentPlan::empty(level);
        match level {
            RiskLevel::Critical | RiskLevel::High => plan
                .with_chemical(&[
                    "Copper-based fungicides (Bordeaux mixture, copper hydroxide)",
                    "Apply before expected rain if possible",
                    "Ensure good coverage of leaves and branches",
                    "Pre-infection treatment is most effective",
                    "Do not apply if rain is imminent (within 2-4 hours)",
                    "Repeat after heavy rain (>20mm)",
                ])
                .with_monitoring(&[
                    "Inspect leaves for circular spots",
                    "Check underside of leaves for spores",
                    "Focus on shaded, humid areas of orchard",
                ]),
            RiskLevel::Moderate => plan
                .with_monitoring(&[
                    "Prepare fungicide if infection period expected",
                    "Monitor weather forecast closely",
                    "Inspect susceptible trees weekly",
                ])
                .with_cultural(&[
                    "Improve air circulation (pruning)",
                    "Avoid overhead irrigation",
                    "Remove heavily infected branches",
                ]),
            RiskLevel::Low => plan
                .with_monitoring(&["Continue routine scouting"])
                .with_cultural(&[
                    "Maintain good orchard hygiene",
                    "Plan autumn/spring treatments",
                ]),
            RiskLevel::None => plan,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wet_october_day_is_critical() {
        let model = PeacockSpotModel;
        let inputs = RiskInputs {
            temperature: 15.0,
            humidity: 95.0,
            precipitation: 10.0,
            rain_next_24h: 8.0,
            month: 10,
        };
        let score = model.score(&inputs, 10);
        // 35 + 40 + 15 + 10
        assert_eq!(score, 100.0);
        assert_eq!(model.cut_points().level(score), RiskLevel::Critical);
    }

    #[test]
    fn dry_summer_is_minimal() {
        let model = PeacockSpotModel;
        let inputs = RiskInputs {
            temperature: 32.0,
            humidity: 40.0,
            precipitation: 0.0,
            rain_next_24h: 0.0,
            month: 7,
        };
        // 5 + 5 + 3 + 0
        let score = model.score(&inputs, 7);
        assert_eq!(score, 13.0);
        assert_eq!(model.cut_points().level(score), RiskLevel::None);
    }

    #[test]
    fn humid_spring_is_high() {
        let model = PeacockSpotModel;
        let inputs = RiskInputs {
            temperature: 12.0,
            humidity: 85.0,
            precipitation: 0.0,
            rain_next_24h: 2.0,
            month: 4,
        };
        // 35 + 30 + 12 + 5
        assert_eq!(model.score(&inputs, 4), 82.0);
    }

    #[test]
    fn active_all_year() {
        assert!((1..=12).all(|m| PeacockSpotModel.active(m)));
    }

    #[test]
    fn moderate_plan_is_preventive() {
        let plan = PeacockSpotModel.plan(RiskLevel::Moderate);
        assert!(plan.chemical.is_empty());
        assert_eq!(plan.cultural.len(), 3);
    }
}
