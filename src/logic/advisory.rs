//! Turns a week of classified days into prioritized, de-conflicted advice.

use super::conditions::{season_for, DayConditions};
use super::pests::{OliveFlyModel, PestModel};
use super::thresholds::*;
use crate::models::{
    Advisory, AdvisoryType, ClimateProfile, ClimateSnapshot, ForecastRiskPrediction,
    IrrigateDecision, IrrigationRecommendation, ParcelId, PestType, Priority, RiskLevel,
    SprayDecision, TreatmentWindow, Urgency, WeatherAdvisory,
};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use std::collections::BTreeSet;

/// Everything the coordinator reads. Nothing here is re-derived.
pub struct AdvisoryInputs<'a> {
    pub parcel_id: ParcelId,
    pub profile: &'a ClimateProfile,
    /// Classified forecast days, ordered by days ahead.
    pub conditions: &'a [DayConditions],
    pub predictions: &'a [ForecastRiskPrediction],
    pub latest_recommendation: Option<&'a IrrigationRecommendation>,
    pub today: NaiveDate,
    pub now: DateTime<Utc>,
}

pub fn generate(inputs: &AdvisoryInputs<'_>) -> WeatherAdvisory {
    let profile = inputs.profile;
    let month = inputs.today.month();
    let is_dormant = profile.is_dormant_month(month);

    let mut advisory = WeatherAdvisory {
        parcel_id: inputs.parcel_id,
        generated_at: inputs.now,
        advisories: Vec::new(),
        best_spray_day: -1,
        best_irrigate_day: -1,
        rain_expected_days: Vec::new(),
        coordination_warnings: Vec::new(),
        climate: ClimateSnapshot {
            zone: profile.zone,
            hemisphere: profile.hemisphere(),
            season: season_for(profile, month),
            is_dormant,
            confidence: profile.confidence,
            tier: profile.tier,
        },
    };

    let conditions = inputs.conditions;
    if conditions.is_empty() {
        advisory.advisories.push(Advisory::new(
            AdvisoryType::Info,
            Priority::Low,
            0,
            "Weather forecast not available",
        ));
        return advisory;
    }

    if is_dormant {
        advisory.advisories.push(
            Advisory::new(
                AdvisoryType::Info,
                Priority::Info,
                0,
                "Trees are in dormancy period - reduced irrigation and pest monitoring needed",
            )
            .with_reason(format!(
                "Current season: {}, Climate zone: {}",
                advisory.climate.season, profile.zone
            ))
            .with_action("Focus on pruning, equipment maintenance, and orchard cleanup"),
        );
    }

    for c in conditions {
        if c.is_treat_window && advisory.best_spray_day < 0 {
            advisory.best_spray_day = c.days_ahead as i32;
        }
        if c.is_irrigatable && advisory.best_irrigate_day < 0 && c.et0_adjusted > ET0_BEST_IRRIGATE
        {
            advisory.best_irrigate_day = c.days_ahead as i32;
        }
        if c.precipitation >= PRECIP_MODERATE {
            advisory.rain_expected_days.push(c.days_ahead);
        }
    }

    if let Some(item) = recommendation_advisory(inputs.latest_recommendation, &conditions[0]) {
        advisory.advisories.push(item);
    }

    for (i, c) in conditions.iter().enumerate() {
        weather_warnings(c, &mut advisory.advisories);

        if c.is_treat_window && c.days_ahead <= ADVISORY_TREATMENT_DAYS {
            let rain_coming = conditions
                .iter()
                .skip(i + 1)
                .take(2)
                .any(|n| n.precipitation >= PRECIP_MODERATE);
            if rain_coming {
                advisory.advisories.push(
                    Advisory::new(
                        AdvisoryType::Treatment,
                        Priority::High,
                        c.days_ahead,
                        format!("Day {}: Last good spray window before rain", c.days_ahead),
                    )
                    .with_reason("Dry conditions now, rain expected soon")
                    .with_action("Apply any planned treatments today, allow 4-6h drying time"),
                );
            } else if c.days_ahead as i32 == advisory.best_spray_day {
                advisory.advisories.push(
                    Advisory::new(
                        AdvisoryType::Treatment,
                        Priority::Medium,
                        c.days_ahead,
                        format!("Day {}: Ideal treatment window", c.days_ahead),
                    )
                    .with_reason(format!(
                        "Dry ({:.1}mm), calm ({:.0} km/h), moderate temp ({:.0}°C)",
                        c.precipitation, c.wind_speed_max, c.temp_avg
                    ))
                    .with_action("Good conditions for spray application"),
                );
            }
        }

        if c.days_ahead <= ADVISORY_IRRIGATION_DAYS {
            if c.precipitation >= PRECIP_MODERATE {
                advisory.advisories.push(
                    Advisory::new(
                        AdvisoryType::Irrigation,
                        Priority::Info,
                        c.days_ahead,
                        format!(
                            "Skip irrigation day {} - rain expected ({:.0}mm)",
                            c.days_ahead, c.precipitation
                        ),
                    )
                    .with_reason("Natural rainfall will provide water")
                    .with_action("No irrigation needed, monitor soil moisture after rain"),
                );
            } else if c.et0_adjusted > ET0_HIGH_DEMAND && c.is_dry && !c.is_dormant {
                advisory.advisories.push(
                    Advisory::new(
                        AdvisoryType::Irrigation,
                        Priority::Medium,
                        c.days_ahead,
                        format!(
                            "High water demand day {} (ET0: {:.1}mm)",
                            c.days_ahead, c.et0_adjusted
                        ),
                    )
                    .with_reason("High evapotranspiration, dry conditions")
                    .with_action("Ensure adequate irrigation, prefer early morning application"),
                );
            }
        }

        if c.disease_risk && c.days_ahead <= ADVISORY_DISEASE_DAYS {
            let spot = prediction_for(inputs.predictions, PestType::PeacockSpot, c.days_ahead);
            let preceding_dry = i > 0 && c.days_ahead > 0 && conditions[i - 1].is_dry;
            let mut item = if preceding_dry {
                // filed on the dry day before the rain
                let treat_day = c.days_ahead - 1;
                Advisory::new(
                    AdvisoryType::Disease,
                    Priority::High,
                    treat_day,
                    format!("Apply fungicide day {} before wet period", treat_day),
                )
                .with_reason(format!(
                    "Infection-favorable conditions expected day {} ({:.0}mm rain, {:.0}% humidity, {:.0}°C)",
                    c.days_ahead, c.precipitation, c.humidity_max, c.temp_avg
                ))
                .with_action("Apply copper fungicide, ensure 4-6h drying time before rain")
            } else {
                Advisory::new(
                    AdvisoryType::Disease,
                    Priority::Medium,
                    c.days_ahead,
                    format!("Disease-favorable conditions day {}", c.days_ahead),
                )
                .with_reason(format!(
                    "Wet ({:.0}mm) + moderate temp ({:.0}°C) = infection risk",
                    c.precipitation, c.temp_avg
                ))
                .with_action("Monitor for symptoms, plan treatment for next dry window")
            };
            if let Some(p) = spot {
                item.reason
                    .push_str(&format!("; peacock spot risk {} ({:.0})", p.risk_level, p.risk_score));
            }
            advisory.advisories.push(item);
        }

        if c.pest_risk && c.days_ahead <= ADVISORY_PEST_DAYS {
            let season_month = profile.hemisphere().season_month(c.date.month());
            if OliveFlyModel.active(season_month) {
                let fly = prediction_for(inputs.predictions, PestType::OliveFly, c.days_ahead);
                let priority = match fly.map(|p| p.risk_level) {
                    Some(RiskLevel::High | RiskLevel::Critical) => Priority::High,
                    _ => Priority::Medium,
                };
                let mut reason = format!(
                    "Warm ({:.0}°C), moderate humidity ({:.0}%), dry",
                    c.temp_avg, c.humidity_avg
                );
                if let Some(p) = fly {
                    reason.push_str(&format!("; olive fly risk {} ({:.0})", p.risk_level, p.risk_score));
                }
                advisory.advisories.push(
                    Advisory::new(
                        AdvisoryType::Pest,
                        priority,
                        c.days_ahead,
                        format!("Olive fly favorable conditions day {}", c.days_ahead),
                    )
                    .with_reason(reason)
                    .with_action("Check McPhail traps, monitor fruit for oviposition"),
                );
            }
        }
    }

    advisory.coordination_warnings = coordination_warnings(&advisory.advisories);
    advisory
        .advisories
        .sort_by(|a, b| b.priority.cmp(&a.priority).then(a.days_ahead.cmp(&b.days_ahead)));
    advisory
}

fn weather_warnings(c: &DayConditions, out: &mut Vec<Advisory>) {
    if c.has_frost_risk {
        out.push(
            Advisory::new(
                AdvisoryType::Weather,
                Priority::Critical,
                c.days_ahead,
                format!("Frost risk on day {} (min {:.1}°C)", c.days_ahead, c.temp_min),
            )
            .with_reason("Temperature dropping below freezing")
            .with_action("Protect sensitive plants, avoid irrigation late in day"),
        );
    }
    if c.has_heat_risk {
        out.push(
            Advisory::new(
                AdvisoryType::Weather,
                Priority::High,
                c.days_ahead,
                format!("Extreme heat on day {} (max {:.1}°C)", c.days_ahead, c.temp_max),
            )
            .with_reason("Temperature exceeding safe limits")
            .with_action("Avoid field work midday, increase irrigation, monitor for heat stress"),
        );
    }
    if c.precipitation >= PRECIP_EXTREME {
        out.push(
            Advisory::new(
                AdvisoryType::Weather,
                Priority::High,
                c.days_ahead,
                format!(
                    "Heavy rain expected day {} ({:.0}mm)",
                    c.days_ahead, c.precipitation
                ),
            )
            .with_reason("Significant precipitation expected")
            .with_action("Delay all spray treatments, skip irrigation, check drainage"),
        );
    }
    if c.wind_gust_max >= WIND_GALE {
        out.push(
            Advisory::new(
                AdvisoryType::Weather,
                Priority::High,
                c.days_ahead,
                format!(
                    "Strong winds on day {} (gusts {:.0} km/h)",
                    c.days_ahead, c.wind_gust_max
                ),
            )
            .with_reason("Wind speed unsafe for field operations")
            .with_action("Avoid all spraying, secure equipment"),
        );
    }
}

/// Day-0 advice carried over from a triggered high-urgency water balance.
fn recommendation_advisory(
    recommendation: Option<&IrrigationRecommendation>,
    today: &DayConditions,
) -> Option<Advisory> {
    let rec = recommendation?;
    if !rec.should_irrigate || rec.urgency < Urgency::High || today.precipitation >= PRECIP_MODERATE
    {
        return None;
    }
    Some(
        Advisory::new(
            AdvisoryType::Irrigation,
            Priority::High,
            0,
            format!(
                "Irrigate today: {:.1}mm ({:.0} L/tree)",
                rec.recommended_amount_mm, rec.recommended_liters_per_tree
            ),
        )
        .with_reason(format!(
            "Soil moisture {:.0}%, {} stress, urgency {}",
            rec.soil_moisture, rec.stress_level, rec.urgency
        ))
        .with_action("Irrigate early morning to limit evaporation"),
    )
}

fn prediction_for(
    predictions: &[ForecastRiskPrediction],
    pest_type: PestType,
    days_ahead: u32,
) -> Option<&ForecastRiskPrediction> {
    predictions
        .iter()
        .find(|p| p.pest_type == pest_type && p.days_ahead == days_ahead)
}

/// One warning per day where a treatment and an irrigation are both advised.
fn coordination_warnings(advisories: &[Advisory]) -> Vec<String> {
    let spray_days: BTreeSet<u32> = advisories
        .iter()
        .filter(|a| a.kind == AdvisoryType::Treatment && a.priority > Priority::Info)
        .map(|a| a.days_ahead)
        .collect();
    let irrigate_days: BTreeSet<u32> = advisories
        .iter()
        .filter(|a| a.kind == AdvisoryType::Irrigation && a.priority >= Priority::Medium)
        .map(|a| a.days_ahead)
        .collect();

    spray_days
        .intersection(&irrigate_days)
        .map(|day| {
            format!(
                "Day {}: If treating, irrigate in morning and spray in evening (or skip irrigation)",
                day
            )
        })
        .collect()
}

pub fn should_irrigate(conditions: &[DayConditions]) -> IrrigateDecision {
    let decision = |should_irrigate: bool, reason: String| IrrigateDecision {
        should_irrigate,
        reason,
    };

    let Some(today) = conditions.first() else {
        return decision(
            true,
            "Weather data unavailable - check soil moisture to decide".to_string(),
        );
    };

    if today.precipitation >= PRECIP_MODERATE {
        return decision(
            false,
            format!(
                "Rain expected today ({:.0}mm) - skip irrigation",
                today.precipitation
            ),
        );
    }
    if let Some(tomorrow) = conditions.get(1) {
        if tomorrow.precipitation >= PRECIP_HEAVY {
            return decision(
                false,
                format!(
                    "Heavy rain tomorrow ({:.0}mm) - consider skipping irrigation",
                    tomorrow.precipitation
                ),
            );
        }
    }
    if today.has_frost_risk {
        return decision(false, "Frost risk - avoid late irrigation".to_string());
    }
    decision(true, "Weather suitable for irrigation".to_string())
}

pub fn should_spray(conditions: &[DayConditions]) -> SprayDecision {
    let decision = |should_spray: bool, reason: String, best_day: i32| SprayDecision {
        should_spray,
        reason,
        best_day,
    };

    let Some(today) = conditions.first() else {
        return decision(
            false,
            "Weather data unavailable - check conditions manually".to_string(),
            -1,
        );
    };

    if !today.is_dry {
        return match conditions[1..].iter().find(|c| c.is_sprayable) {
            Some(c) => decision(
                false,
                format!("Rain today - wait for day {}", c.days_ahead),
                c.days_ahead as i32,
            ),
            None => decision(false, "No good spray window in next 7 days".to_string(), -1),
        };
    }
    if !today.is_calm {
        return decision(
            false,
            format!(
                "Too windy ({:.0} km/h) - spray drift risk",
                today.wind_speed_max
            ),
            -1,
        );
    }
    if today.temp_avg < TEMP_SPRAY_MIN {
        return decision(
            false,
            format!("Too cold ({:.0}°C) - reduced efficacy", today.temp_avg),
            -1,
        );
    }
    if today.temp_avg > TEMP_SPRAY_MAX {
        return decision(
            false,
            format!("Too hot ({:.0}°C) - rapid evaporation", today.temp_avg),
            -1,
        );
    }
    if today.humidity_max >= HUMIDITY_VERY_HIGH {
        return decision(
            false,
            format!("Humidity too high ({:.0}%) - slow drying", today.humidity_max),
            -1,
        );
    }

    if let Some(c) = conditions
        .iter()
        .skip(1)
        .take(2)
        .find(|c| c.precipitation >= PRECIP_MODERATE)
    {
        return decision(
            true,
            format!("Apply today - rain expected day {}", c.days_ahead),
            0,
        );
    }
    decision(true, "Good conditions for spray application".to_string(), 0)
}

pub fn best_treatment_window(conditions: &[DayConditions], max_days: u32) -> TreatmentWindow {
    if conditions.is_empty() {
        return TreatmentWindow {
            day: -1,
            reason: "Weather data unavailable".to_string(),
        };
    }

    let in_range = || conditions.iter().take_while(|c| c.days_ahead <= max_days);

    if let Some(c) = in_range().find(|c| c.is_treat_window) {
        return TreatmentWindow {
            day: c.days_ahead as i32,
            reason: format!("Day {}: dry, calm, {:.0}°C", c.days_ahead, c.temp_avg),
        };
    }
    if let Some(c) = in_range().find(|c| c.is_sprayable) {
        return TreatmentWindow {
            day: c.days_ahead as i32,
            reason: format!("Day {}: acceptable conditions", c.days_ahead),
        };
    }
    TreatmentWindow {
        day: -1,
        reason: format!("No suitable treatment window in next {} days", max_days),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::climate::fallback_profile;
    use crate::logic::conditions::{classify_all, tests::fair_day};
    use crate::logic::pests::PestScorer;
    use crate::models::{DailyForecast, DeficitStrategy, GrowthStage, StressLevel};
    use chrono::{Duration, TimeZone};

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    fn week() -> Vec<DailyForecast> {
        (0..7u32)
            .map(|i| fair_day(start() + Duration::days(i as i64), i))
            .collect()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 6, 0, 0).unwrap()
    }

    fn run(days: &[DailyForecast], rec: Option<&IrrigationRecommendation>) -> WeatherAdvisory {
        let profile = fallback_profile(ParcelId(1), now());
        let conditions = classify_all(days, &profile);
        let predictions =
            PestScorer::new().forecast(ParcelId(1), days, profile.hemisphere(), now());
        generate(&AdvisoryInputs {
            parcel_id: ParcelId(1),
            profile: &profile,
            conditions: &conditions,
            predictions: &predictions,
            latest_recommendation: rec,
            today: start(),
            now: now(),
        })
    }

    fn conditions(days: &[DailyForecast]) -> Vec<DayConditions> {
        classify_all(days, &fallback_profile(ParcelId(1), now()))
    }

    fn triggered_recommendation() -> IrrigationRecommendation {
        IrrigationRecommendation {
            parcel_id: ParcelId(1),
            calculation_date: start(),
            et0: 6.0,
            kc: 0.75,
            etc: 4.5,
            rainfall: 0.0,
            effective_rainfall: 0.0,
            irrigation_applied: 0.0,
            water_balance: -4.5,
            cumulative_deficit: 110.0,
            soil_moisture: 26.7,
            should_irrigate: true,
            recommended_amount_mm: 15.0,
            recommended_liters_per_tree: 540.0,
            urgency: Urgency::High,
            growth_stage: GrowthStage::FruitDevelopment,
            stress_level: StressLevel::Severe,
            next_irrigation_date: Some(start() + Duration::days(3)),
            weather_forecast: "No significant rain forecasted".to_string(),
            deficit_strategy: DeficitStrategy::None,
            deficit_reduction_percent: 0.0,
        }
    }

    #[test]
    fn no_forecast_yields_single_info() {
        let advisory = run(&[], None);
        assert_eq!(advisory.advisories.len(), 1);
        assert_eq!(advisory.advisories[0].kind, AdvisoryType::Info);
        assert_eq!(advisory.advisories[0].message, "Weather forecast not available");
        assert_eq!(advisory.best_spray_day, -1);
        assert_eq!(advisory.best_irrigate_day, -1);
    }

    #[test]
    fn fair_week_picks_day_zero() {
        let advisory = run(&week(), None);
        assert_eq!(advisory.best_spray_day, 0);
        assert_eq!(advisory.best_irrigate_day, 0);
        assert!(advisory.rain_expected_days.is_empty());
        assert!(advisory
            .advisories
            .iter()
            .any(|a| a.kind == AdvisoryType::Treatment && a.message == "Day 0: Ideal treatment window"));
        assert!(!advisory.climate.is_dormant);
    }

    #[test]
    fn spray_before_rain_is_high_priority() {
        let mut days = week();
        days[2].precipitation_sum = 12.0;
        days[2].precipitation_probability = 90.0;
        let advisory = run(&days, None);

        assert_eq!(advisory.rain_expected_days, vec![2]);
        let last_windows: Vec<_> = advisory
            .advisories
            .iter()
            .filter(|a| a.message.contains("Last good spray window before rain"))
            .map(|a| a.days_ahead)
            .collect();
        assert_eq!(last_windows, vec![0, 1]);
        assert!(advisory
            .advisories
            .iter()
            .any(|a| a.message == "Skip irrigation day 2 - rain expected (12mm)"));
    }

    #[test]
    fn weather_warnings_are_emitted() {
        let mut days = week();
        days[1].temp_min = -1.0;
        days[3].temp_max = 41.0;
        days[4].precipitation_sum = 25.0;
        days[5].wind_gust_max = 55.0;
        let advisory = run(&days, None);

        let weather: Vec<_> = advisory
            .advisories
            .iter()
            .filter(|a| a.kind == AdvisoryType::Weather)
            .collect();
        assert_eq!(weather.len(), 4);
        assert_eq!(advisory.advisories[0].priority, Priority::Critical);
        assert_eq!(advisory.advisories[0].message, "Frost risk on day 1 (min -1.0°C)");
    }

    #[test]
    fn advisories_sorted_by_priority_then_day() {
        let mut days = week();
        days[2].precipitation_sum = 12.0;
        days[4].temp_min = -2.0;
        let advisory = run(&days, None);
        for pair in advisory.advisories.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(
                a.priority > b.priority || (a.priority == b.priority && a.days_ahead <= b.days_ahead)
            );
        }
    }

    #[test]
    fn high_demand_day_conflicts_with_treatment() {
        let mut days = week();
        days[0].et0 = 6.5;
        let advisory = run(&days, None);
        assert!(advisory
            .advisories
            .iter()
            .any(|a| a.kind == AdvisoryType::Irrigation && a.priority == Priority::Medium));
        assert_eq!(
            advisory.coordination_warnings,
            vec!["Day 0: If treating, irrigate in morning and spray in evening (or skip irrigation)"
                .to_string()]
        );
    }

    #[test]
    fn high_demand_uses_adjusted_et0() {
        let mut days = week();
        for d in &mut days {
            d.et0 = 4.0;
        }
        days[0].et0 = 4.5;

        let high_demand = |et_multiplier: f64| {
            let mut profile = fallback_profile(ParcelId(1), now());
            profile.et_multiplier = et_multiplier;
            let conditions = classify_all(&days, &profile);
            generate(&AdvisoryInputs {
                parcel_id: ParcelId(1),
                profile: &profile,
                conditions: &conditions,
                predictions: &[],
                latest_recommendation: None,
                today: start(),
                now: now(),
            })
            .advisories
            .into_iter()
            .filter(|a| a.kind == AdvisoryType::Irrigation && a.priority == Priority::Medium)
            .map(|a| a.days_ahead)
            .collect::<Vec<_>>()
        };

        // 4.5 raw, 5.4 adjusted
        assert_eq!(high_demand(1.2), vec![0]);
        assert!(high_demand(1.0).is_empty());
    }

    #[test]
    fn urgent_recommendation_adds_day_zero_irrigation() {
        let rec = triggered_recommendation();
        let advisory = run(&week(), Some(&rec));
        let item = advisory
            .advisories
            .iter()
            .find(|a| a.kind == AdvisoryType::Irrigation && a.priority == Priority::High)
            .unwrap();
        assert_eq!(item.days_ahead, 0);
        assert_eq!(advisory.coordination_warnings.len(), 1);

        let mut days = week();
        days[0].precipitation_sum = 6.0;
        let advisory = run(&days, Some(&rec));
        assert!(!advisory
            .advisories
            .iter()
            .any(|a| a.kind == AdvisoryType::Irrigation && a.priority == Priority::High));
    }

    #[test]
    fn disease_after_dry_day_asks_for_fungicide() {
        let oct = NaiveDate::from_ymd_opt(2025, 10, 6).unwrap();
        let mut days: Vec<DailyForecast> = (0..4u32)
            .map(|i| fair_day(oct + Duration::days(i as i64), i))
            .collect();
        days[2].precipitation_sum = 8.0;
        days[2].temp_avg = 15.0;
        let profile = fallback_profile(ParcelId(1), now());
        let conditions = classify_all(&days, &profile);
        let advisory = generate(&AdvisoryInputs {
            parcel_id: ParcelId(1),
            profile: &profile,
            conditions: &conditions,
            predictions: &[],
            latest_recommendation: None,
            today: oct,
            now: now(),
        });
        let disease = advisory
            .advisories
            .iter()
            .find(|a| a.kind == AdvisoryType::Disease)
            .unwrap();
        assert_eq!(disease.priority, Priority::High);
        assert_eq!(disease.message, "Apply fungicide day 1 before wet period");
        assert_eq!(disease.days_ahead, 1);
    }

    #[test]
    fn fly_advice_is_seasonal() {
        let advisory = run(&week(), None);
        assert!(advisory.advisories.iter().any(|a| a.kind == AdvisoryType::Pest));

        // favorable weather, but no fruit left in November
        let november = NaiveDate::from_ymd_opt(2025, 11, 3).unwrap();
        let mut days: Vec<DailyForecast> = (0..3u32)
            .map(|i| fair_day(november + Duration::days(i as i64), i))
            .collect();
        for d in &mut days {
            d.temp_avg = 18.0;
        }
        let profile = fallback_profile(ParcelId(1), now());
        let conditions = classify_all(&days, &profile);
        assert!(conditions.iter().all(|c| c.pest_risk));
        let advisory = generate(&AdvisoryInputs {
            parcel_id: ParcelId(1),
            profile: &profile,
            conditions: &conditions,
            predictions: &[],
            latest_recommendation: None,
            today: november,
            now: now(),
        });
        assert!(!advisory.advisories.iter().any(|a| a.kind == AdvisoryType::Pest));
    }

    #[test]
    fn dormant_profile_adds_info() {
        let jan = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let days = vec![fair_day(jan, 0)];
        let profile = fallback_profile(ParcelId(1), now());
        let conditions = classify_all(&days, &profile);
        let advisory = generate(&AdvisoryInputs {
            parcel_id: ParcelId(1),
            profile: &profile,
            conditions: &conditions,
            predictions: &[],
            latest_recommendation: None,
            today: jan,
            now: now(),
        });
        assert!(advisory.climate.is_dormant);
        assert_eq!(advisory.best_spray_day, -1);
        assert!(advisory
            .advisories
            .iter()
            .any(|a| a.kind == AdvisoryType::Info && a.message.starts_with("Trees are in dormancy")));
    }

    #[test]
    fn irrigate_decisions() {
        assert!(should_irrigate(&[]).should_irrigate);

        let mut days = week();
        assert!(should_irrigate(&conditions(&days)).should_irrigate);

        days[1].precipitation_sum = 12.0;
        let d = should_irrigate(&conditions(&days));
        assert!(!d.should_irrigate);
        assert!(d.reason.starts_with("Heavy rain tomorrow"));

        days[0].precipitation_sum = 5.0;
        assert!(!should_irrigate(&conditions(&days)).should_irrigate);

        let mut days = week();
        days[0].temp_min = -0.5;
        let d = should_irrigate(&conditions(&days));
        assert_eq!(d.reason, "Frost risk - avoid late irrigation");
    }

    #[test]
    fn spray_decisions() {
        let none = should_spray(&[]);
        assert!(!none.should_spray);
        assert_eq!(none.best_day, -1);

        let ok = should_spray(&conditions(&week()));
        assert!(ok.should_spray);
        assert_eq!(ok.best_day, 0);
        assert_eq!(ok.reason, "Good conditions for spray application");

        let mut days = week();
        days[0].precipitation_sum = 3.0;
        let wait = should_spray(&conditions(&days));
        assert!(!wait.should_spray);
        assert_eq!(wait.best_day, 1);

        let mut days = week();
        days[0].wind_speed_max = 30.0;
        assert!(should_spray(&conditions(&days)).reason.starts_with("Too windy"));

        let mut days = week();
        days[2].precipitation_sum = 7.0;
        let before_rain = should_spray(&conditions(&days));
        assert!(before_rain.should_spray);
        assert_eq!(before_rain.reason, "Apply today - rain expected day 2");
    }

    #[test]
    fn treatment_window_falls_back_to_sprayable() {
        let mut days = week();
        for d in &mut days {
            d.sunshine_hours = 2.0;
        }
        let w = best_treatment_window(&conditions(&days), 3);
        assert_eq!(w.day, 0);
        assert_eq!(w.reason, "Day 0: acceptable conditions");

        for d in &mut days {
            d.precipitation_sum = 3.0;
        }
        let w = best_treatment_window(&conditions(&days), 3);
        assert_eq!(w.day, -1);
        assert_eq!(w.reason, "No suitable treatment window in next 3 days");

        assert_eq!(best_treatment_window(&[], 5).day, -1);
    }
}
