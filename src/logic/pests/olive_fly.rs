use super::PestModel;
use crate::models::{PestType, RiskCutPoints, RiskInputs, RiskLevel, TreatmentPlan};

/// Olive fruit fly (Bactrocera oleae).
///
/// Only scored while fruit is on the tree (May-October). Warm, humid, dry
/// weather favors adult activity; heavy rain knocks populations back.
pub struct OliveFlyModel;

impl PestModel for OliveFlyModel {
    fn pest_type(&self) -> PestType {
        PestType::OliveFly
    }

    fn cut_points(&self) -> RiskCutPoints {
        RiskCutPoints {
            low: 20.0,
            moderate: 40.0,
            high: 60.0,
            critical: 80.0,
        }
    }

    fn active(&self, season_month: u32) -> bool {
        (5..=10).contains(&season_month)
    }

    fn score(&self, inputs: &RiskInputs, season_month: u32) -> f64 {
        let t = inputs.temperature;
        let temperature = if (20.0..=30.0).contains(&t) {
            40.0
        } else if (15.0..20.0).contains(&t) {
            25.0
        } else if t > 30.0 && t <= 35.0 {
            15.0
        } else {
            5.0
        };

        let humidity = if inputs.humidity > 70.0 {
            30.0
        } else if inputs.humidity > 60.0 {
            20.0
        } else if inputs.humidity > 50.0 {
            10.0
        } else {
            5.0
        };

        let precipitation = if inputs.precipitation > 20.0 {
            5.0
        } else if inputs.precipitation > 5.0 {
            10.0
        } else {
            20.0
        };

        // peak fruiting
        let stage = if (7..=9).contains(&season_month) {
            10.0
        } else {
            5.0
        };

        temperature + humidity + precipitation + stage
    }

    fn alert(&self, level: RiskLevel) -> &'static str {
        match level {
            RiskLevel::Critical => {
                "Critical risk: Immediate intervention required. Monitor traps daily."
            }
            RiskLevel::High => "High risk: Plan treatment within 2-3 days. Increase trap monitoring.",
            RiskLevel::Moderate => "Moderate risk: Monitor closely. Check traps weekly.",
            RiskLevel::Low => "Low risk: Continue routine monitoring.",
            RiskLevel::None => "Minimal risk: Weather conditions unfavorable for fly activity.",
        }
    }

    fn inactive_alert(&self) -> &'static str {
        "Not applicable - no fruit present (dormant/post-harvest period)."
    }

    fn plan(&self, level: RiskLevel) -> TreatmentPlan {
        let plan = TreatmentPlan::empty(level);
        match level {
            RiskLevel::Critical | RiskLevel::High => plan
                .with_monitoring(&[
                    "Check McPhail or Olipe traps daily",
                    "Monitor fruit for oviposition punctures",
                    "Record fly counts and trends",
                ])
                .with_chemical(&[
                    "Dimethoate or Spinosad bait spray",
                    "Attract-and-kill formulations",
                    "Follow PHI (pre-harvest interval) strictly",
                ])
                .with_biological(&[
                    "Mass trapping with pheromone traps",
                    "Kaolin clay (Surround WP) as repellent",
                    "Release of parasitoid wasps (if available)",
                ])
                .with_cultural(&[
                    "Early harvest if possible",
                    "Remove fallen and infested fruits",
                    "Maintain ground cover to reduce emergence",
                ]),
            RiskLevel::Moderate => plan
                .with_monitoring(&[
                    "Check traps twice weekly",
                    "Scout for early signs of infestation",
                ])
                .with_cultural(&[
                    "Prepare spray equipment",
                    "Source approved insecticides",
                    "Install additional traps if needed",
                ]),
            RiskLevel::Low => plan.with_monitoring(&[
                "Weekly trap checks",
                "Maintain trap placement",
                "Record weather patterns",
            ]),
            RiskLevel::None => plan,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(temperature: f64, humidity: f64, precipitation: f64) -> RiskInputs {
        RiskInputs {
            temperature,
            humidity,
            precipitation,
            rain_next_24h: 0.0,
            month: 8,
        }
    }

    #[test]
    fn peak_summer_is_critical() {
        let model = OliveFlyModel;
        let score = model.score(&inputs(26.0, 75.0, 0.0), 8);
        assert_eq!(score, 100.0);
        assert_eq!(model.cut_points().level(score), RiskLevel::Critical);
    }

    #[test]
    fn hot_dry_day_scores_lower() {
        let model = OliveFlyModel;
        // 15 + 5 + 20 + 5
        assert_eq!(model.score(&inputs(33.0, 40.0, 0.0), 6), 45.0);
    }

    #[test]
    fn heavy_rain_suppresses_activity() {
        let model = OliveFlyModel;
        // 40 + 30 + 5 + 10
        assert_eq!(model.score(&inputs(22.0, 80.0, 25.0), 7), 85.0);
        // 25 + 20 + 10 + 5
        assert_eq!(model.score(&inputs(15.0, 65.0, 6.0), 5), 60.0);
    }

    #[test]
    fn active_only_while_fruiting() {
        let model = OliveFlyModel;
        assert!(!model.active(4));
        assert!(model.active(5));
        assert!(model.active(10));
        assert!(!model.active(11));
    }

    #[test]
    fn plans_follow_level() {
        let model = OliveFlyModel;
        assert!(model.plan(RiskLevel::None).is_empty());
        assert!(model.plan(RiskLevel::Low).chemical.is_empty());
        assert_eq!(model.plan(RiskLevel::High).chemical.len(), 3);
        assert_eq!(model.plan(RiskLevel::Critical).level, RiskLevel::Critical);
    }
}
