//! FAO-56 style daily root-zone water balance for olive groves.

use super::thresholds::{IRRIGATION_RAIN_GATE, MAX_IRRIGATION_MM};
use crate::models::{
    DeficitStrategy, GrowthStage, IrrigationEvent, IrrigationRecommendation,
    IrrigationSystemSpec, ParcelId, SoilProfile, StressLevel, Urgency, WaterUsageStats,
};
use chrono::{Datelike, Duration, NaiveDate};

pub const NO_WEATHER_TEXT: &str =
    "Weather data not available - check soil moisture manually before irrigating";

/// Everything one day's balance is computed from.
#[derive(Debug, Clone)]
pub struct WaterBalanceInput<'a> {
    pub parcel_id: ParcelId,
    pub date: NaiveDate,
    pub et0: f64,
    pub rainfall: f64,
    pub irrigation_applied: f64,
    pub prior_deficit: f64,
    pub soil: &'a SoilProfile,
    pub system: &'a IrrigationSystemSpec,
    pub strategy: DeficitStrategy,
}

/// Runoff-corrected rainfall; steeper slopes keep less, never below half.
pub fn effective_rainfall(rainfall: f64, slope_percent: f64) -> f64 {
    rainfall * (1.0 - slope_percent * 0.01).max(0.5)
}

/// Carries the cumulative deficit forward. Never negative.
pub fn update_deficit(prior_deficit: f64, water_balance: f64) -> f64 {
    let prior = prior_deficit.max(0.0);
    if water_balance < 0.0 {
        prior - water_balance
    } else {
        (prior - water_balance).max(0.0)
    }
}

pub fn depletion_ratio(deficit: f64, awc: f64) -> f64 {
    if awc <= 0.0 {
        return 1.0;
    }
    (deficit / awc).clamp(0.0, 1.0)
}

pub fn soil_moisture(deficit: f64, awc: f64) -> f64 {
    ((1.0 - depletion_ratio(deficit, awc)) * 100.0).clamp(0.0, 100.0)
}

pub fn forecast_summary(rain_mm: f64) -> &'static str {
    if rain_mm > 10.0 {
        "Heavy rain expected - delay irrigation"
    } else if rain_mm > 5.0 {
        "Moderate rain expected"
    } else if rain_mm > 0.0 {
        "Light rain possible"
    } else {
        "No significant rain forecasted"
    }
}

pub fn calculate(input: &WaterBalanceInput<'_>) -> IrrigationRecommendation {
    let stage = GrowthStage::from_month(input.date.month());
    let kc = stage.kc();
    let etc = input.et0 * kc;

    let eff_rain = effective_rainfall(input.rainfall, input.soil.slope_percent);
    let water_balance = (eff_rain + input.irrigation_applied) - etc;
    let deficit = update_deficit(input.prior_deficit, water_balance);

    let awc = input.soil.available_water_capacity;
    let depletion = depletion_ratio(deficit, awc);
    let stress = StressLevel::from_depletion(depletion);
    let threshold = stage.trigger_threshold();
    let should_irrigate = depletion >= threshold && input.rainfall < IRRIGATION_RAIN_GATE;

    let mut amount = 0.0;
    let mut liters = 0.0;
    let mut urgency = Urgency::None;
    let mut reduction = 0.0;
    let next_date;

    if should_irrigate {
        let efficiency = input.system.efficiency / 100.0;
        let gross = if efficiency > 0.0 {
            deficit / efficiency
        } else {
            deficit
        };
        reduction = input.strategy.reduction_percent(stage);
        amount = gross.min(MAX_IRRIGATION_MM) * (1.0 - reduction / 100.0);
        let spacing = input.system.effective_tree_spacing();
        liters = amount * spacing * spacing;
        urgency = Urgency::from_depletion(depletion);
        next_date = days_until(amount, etc).map(|d| input.date + Duration::days(d));
    } else {
        let remaining = (awc * threshold - deficit).max(0.0);
        next_date = days_until(remaining, etc).map(|d| input.date + Duration::days(d.max(1)));
    }

    IrrigationRecommendation {
        parcel_id: input.parcel_id,
        calculation_date: input.date,
        et0: input.et0,
        kc,
        etc,
        rainfall: input.rainfall,
        effective_rainfall: eff_rain,
        irrigation_applied: input.irrigation_applied,
        water_balance,
        cumulative_deficit: deficit,
        soil_moisture: soil_moisture(deficit, awc),
        should_irrigate,
        recommended_amount_mm: amount,
        recommended_liters_per_tree: liters,
        urgency,
        growth_stage: stage,
        stress_level: stress,
        next_irrigation_date: next_date,
        weather_forecast: forecast_summary(input.rainfall).to_string(),
        deficit_strategy: input.strategy,
        deficit_reduction_percent: reduction,
    }
}

fn days_until(water_mm: f64, etc: f64) -> Option<i64> {
    if etc <= 0.0 {
        return None;
    }
    Some((water_mm / etc).round() as i64)
}

/// Result returned when no weather observation exists. Carries the prior
/// deficit forward so soil moisture stays meaningful.
pub fn degraded(
    parcel_id: ParcelId,
    date: NaiveDate,
    prior_deficit: f64,
    soil: &SoilProfile,
    strategy: DeficitStrategy,
) -> IrrigationRecommendation {
    let stage = GrowthStage::from_month(date.month());
    let awc = soil.available_water_capacity;
    let deficit = prior_deficit.max(0.0);
    IrrigationRecommendation {
        parcel_id,
        calculation_date: date,
        et0: 0.0,
        kc: stage.kc(),
        etc: 0.0,
        rainfall: 0.0,
        effective_rainfall: 0.0,
        irrigation_applied: 0.0,
        water_balance: 0.0,
        cumulative_deficit: deficit,
        soil_moisture: soil_moisture(deficit, awc),
        should_irrigate: false,
        recommended_amount_mm: 0.0,
        recommended_liters_per_tree: 0.0,
        urgency: Urgency::None,
        growth_stage: stage,
        stress_level: StressLevel::from_depletion(depletion_ratio(deficit, awc)),
        next_irrigation_date: None,
        weather_forecast: NO_WEATHER_TEXT.to_string(),
        deficit_strategy: strategy,
        deficit_reduction_percent: 0.0,
    }
}

/// Water applied within the trailing 24 hours of `date` (the day and the one before).
pub fn applied_last_24h(events: &[IrrigationEvent], date: NaiveDate) -> f64 {
    let start = date - Duration::days(1);
    events
        .iter()
        .filter(|e| e.date >= start && e.date <= date)
        .map(|e| e.water_amount_mm.max(0.0))
        .sum()
}

pub fn usage_stats(
    parcel_id: ParcelId,
    from: NaiveDate,
    to: NaiveDate,
    events: &[IrrigationEvent],
    recommendations: &[IrrigationRecommendation],
    system: &IrrigationSystemSpec,
) -> WaterUsageStats {
    let total_applied: f64 = events.iter().map(|e| e.water_amount_mm).sum();
    let spacing = system.effective_tree_spacing();
    let count = events.len();
    let total_etc: f64 = recommendations.iter().map(|r| r.etc).sum();
    let total_rain: f64 = recommendations.iter().map(|r| r.effective_rainfall).sum();
    let supplied = total_applied + total_rain;

    WaterUsageStats {
        parcel_id,
        start_date: from,
        end_date: to,
        total_water_applied_mm: total_applied,
        total_liters_per_tree: total_applied * spacing * spacing,
        irrigation_events: count,
        average_water_per_event_mm: if count > 0 {
            total_applied / count as f64
        } else {
            0.0
        },
        total_cost: events.iter().filter_map(|e| e.cost).sum(),
        total_energy_kwh: events.iter().filter_map(|e| e.energy_kwh).sum(),
        total_etc_mm: total_etc,
        total_effective_rainfall_mm: total_rain,
        water_use_efficiency: if supplied > 0.0 && total_etc > 0.0 {
            Some((total_etc / supplied * 100.0).min(100.0))
        } else {
            None
        },
    }
}
