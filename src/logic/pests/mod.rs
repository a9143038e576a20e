pub mod olive_fly;
pub mod peacock_spot;

pub use olive_fly::OliveFlyModel;
pub use peacock_spot::PeacockSpotModel;

use crate::models::{
    forecast_confidence, DailyForecast, ForecastRiskPrediction, Hemisphere, Observation,
    ParcelId, PestRiskAssessment, PestType, RiskCutPoints, RiskInputs, RiskLevel, TreatmentPlan,
    Trend,
};
use chrono::{DateTime, Datelike, Utc};

/// Weather-driven risk model for one pest or disease.
///
/// `season_month` is the calendar month shifted by six months in the
/// southern hemisphere, so every model reasons in northern-season terms.
pub trait PestModel: Send + Sync {
    fn pest_type(&self) -> PestType;

    /// Score bounds for each level. Each model has its own.
    fn cut_points(&self) -> RiskCutPoints;

    /// Whether the pest is scored at all this month.
    fn active(&self, _season_month: u32) -> bool {
        true
    }

    /// Additive 0-100 score.
    fn score(&self, inputs: &RiskInputs, season_month: u32) -> f64;

    fn alert(&self, level: RiskLevel) -> &'static str;

    fn inactive_alert(&self) -> &'static str {
        "Not applicable this season."
    }

    fn plan(&self, level: RiskLevel) -> TreatmentPlan;
}

/// One model's verdict for one set of inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskOutcome {
    pub pest_type: PestType,
    pub score: f64,
    pub level: RiskLevel,
    pub alert: String,
    pub plan: TreatmentPlan,
}

pub struct PestScorer {
    models: Vec<Box<dyn PestModel>>,
}

impl PestScorer {
    pub fn new() -> Self {
        let models: Vec<Box<dyn PestModel>> =
            vec![Box::new(OliveFlyModel), Box::new(PeacockSpotModel)];
        Self { models }
    }

    pub fn with_models(models: Vec<Box<dyn PestModel>>) -> Self {
        Self { models }
    }

    pub fn pest_types(&self) -> Vec<PestType> {
        self.models.iter().map(|m| m.pest_type()).collect()
    }

    pub fn evaluate(&self, inputs: &RiskInputs, hemisphere: Hemisphere) -> Vec<RiskOutcome> {
        let season_month = hemisphere.season_month(inputs.month);
        self.models
            .iter()
            .map(|model| evaluate_model(model.as_ref(), inputs, season_month))
            .collect()
    }

    /// Scores the current observation for every supported pest.
    pub fn assess_current(
        &self,
        parcel_id: ParcelId,
        observation: &Observation,
        hemisphere: Hemisphere,
        now: DateTime<Utc>,
    ) -> Vec<PestRiskAssessment> {
        let inputs = RiskInputs {
            temperature: observation.temperature,
            humidity: observation.humidity,
            precipitation: observation.precipitation,
            rain_next_24h: observation.rain_next_24h,
            month: observation.month(),
        };
        let date = observation.date();

        self.evaluate(&inputs, hemisphere)
            .into_iter()
            .map(|o| PestRiskAssessment {
                parcel_id,
                pest_type: o.pest_type,
                date,
                risk_score: o.score,
                risk_level: o.level,
                alert_message: o.alert,
                plan: o.plan,
                inputs,
                calculated_at: now,
            })
            .collect()
    }

    /// Scores each forecast day. The next day's rain stands in for
    /// rain-next-24h; the last day has none.
    pub fn forecast(
        &self,
        parcel_id: ParcelId,
        days: &[DailyForecast],
        hemisphere: Hemisphere,
        now: DateTime<Utc>,
    ) -> Vec<ForecastRiskPrediction> {
        let mut days: Vec<&DailyForecast> = days.iter().collect();
        days.sort_by_key(|d| d.days_ahead);

        let mut predictions = Vec::with_capacity(days.len() * self.models.len());
        for model in &self.models {
            let mut previous: Option<f64> = None;
            for (i, day) in days.iter().enumerate() {
                let inputs = RiskInputs {
                    temperature: day.temp_avg,
                    humidity: day.humidity_avg,
                    precipitation: day.precipitation_sum,
                    rain_next_24h: days.get(i + 1).map_or(0.0, |d| d.precipitation_sum),
                    month: day.date.month(),
                };
                let outcome = evaluate_model(
                    model.as_ref(),
                    &inputs,
                    hemisphere.season_month(inputs.month),
                );
                let trend = match previous {
                    Some(prev) => Trend::between(prev, outcome.score),
                    None => Trend::Stable,
                };
                previous = Some(outcome.score);

                predictions.push(ForecastRiskPrediction {
                    parcel_id,
                    pest_type: outcome.pest_type,
                    days_ahead: day.days_ahead,
                    forecast_date: day.date,
                    risk_score: outcome.score,
                    risk_level: outcome.level,
                    trend,
                    confidence: forecast_confidence(day.days_ahead),
                    alert_message: outcome.alert,
                    plan: outcome.plan,
                    generated_at: now,
                });
            }
        }
        predictions
    }
}

impl Default for PestScorer {
    fn default() -> Self {
        Self::new()
    }
}

fn evaluate_model(model: &dyn PestModel, inputs: &RiskInputs, season_month: u32) -> RiskOutcome {
    if !model.active(season_month) {
        return RiskOutcome {
            pest_type: model.pest_type(),
            score: 0.0,
            level: RiskLevel::None,
            alert: model.inactive_alert().to_string(),
            plan: TreatmentPlan::empty(RiskLevel::None),
        };
    }

    let score = model.score(inputs, season_month).clamp(0.0, 100.0);
    let level = model.cut_points().level(score);
    RiskOutcome {
        pest_type: model.pest_type(),
        score,
        level,
        alert: model.alert(level).to_string(),
        plan: model.plan(level),
    }
}
