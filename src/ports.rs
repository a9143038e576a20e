//! Capabilities the engine consumes. Concrete implementations live in
//! `datasources` (Open-Meteo) and `db` (SQLite); tests supply their own.

use crate::error::Result;
use crate::models::{
    ClimateProfile, DailyForecast, ForecastRiskPrediction, HistoricalClimate, IrrigationEvent,
    IrrigationRecommendation, IrrigationSystemSpec, Observation, ParcelGeometry, ParcelId,
    PestRiskAssessment, PestType, SoilProfile, WeatherReport,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Current conditions plus a 7-day daily forecast.
    async fn current_and_forecast(&self, latitude: f64, longitude: f64) -> Result<WeatherReport>;
}

#[async_trait]
pub trait HistoricalClimateProvider: Send + Sync {
    /// Multi-year archive for a coordinate, aggregated to annual means.
    async fn archive(&self, latitude: f64, longitude: f64, years: u32)
        -> Result<HistoricalClimate>;
}

pub trait GeometryResolver: Send + Sync {
    /// Fails with `LocationUnavailable` when the parcel has no geometry.
    fn geometry(&self, parcel_id: ParcelId) -> Result<ParcelGeometry>;
}

/// Keyed storage for everything the engine owns.
///
/// Upserts are by natural key: one climate/soil/system record per parcel, one
/// recommendation per (parcel, date), one assessment per (parcel, pest, day).
pub trait PersistencePort: Send + Sync {
    fn climate_profile(&self, parcel_id: ParcelId) -> Result<Option<ClimateProfile>>;
    fn upsert_climate_profile(&self, profile: &ClimateProfile) -> Result<()>;

    fn soil_profile(&self, parcel_id: ParcelId) -> Result<Option<SoilProfile>>;
    fn upsert_soil_profile(&self, soil: &SoilProfile) -> Result<()>;
    fn irrigation_system(&self, parcel_id: ParcelId) -> Result<Option<IrrigationSystemSpec>>;
    fn upsert_irrigation_system(&self, system: &IrrigationSystemSpec) -> Result<()>;

    fn latest_observation(&self, parcel_id: ParcelId) -> Result<Option<Observation>>;
    fn insert_observation(&self, parcel_id: ParcelId, observation: &Observation) -> Result<()>;
    fn observations_since(
        &self,
        parcel_id: ParcelId,
        since: DateTime<Utc>,
    ) -> Result<Vec<Observation>>;
    fn daily_forecasts(&self, parcel_id: ParcelId) -> Result<Vec<DailyForecast>>;
    /// Replaces every stored forecast day for the parcel.
    fn replace_daily_forecasts(&self, parcel_id: ParcelId, days: &[DailyForecast]) -> Result<()>;

    fn recommendation(
        &self,
        parcel_id: ParcelId,
        date: NaiveDate,
    ) -> Result<Option<IrrigationRecommendation>>;
    /// Most recent recommendation dated strictly before `date`.
    fn recommendation_before(
        &self,
        parcel_id: ParcelId,
        date: NaiveDate,
    ) -> Result<Option<IrrigationRecommendation>>;
    fn latest_recommendation(&self, parcel_id: ParcelId)
        -> Result<Option<IrrigationRecommendation>>;
    fn recommendations_between(
        &self,
        parcel_id: ParcelId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<IrrigationRecommendation>>;
    fn upsert_recommendation(&self, recommendation: &IrrigationRecommendation) -> Result<()>;

    /// Returns the new event id.
    fn append_irrigation_event(&self, event: &IrrigationEvent) -> Result<i64>;
    fn irrigation_events_between(
        &self,
        parcel_id: ParcelId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<IrrigationEvent>>;

    fn upsert_pest_assessment(&self, assessment: &PestRiskAssessment) -> Result<()>;
    fn pest_assessments_since(
        &self,
        parcel_id: ParcelId,
        pest_type: Option<PestType>,
        since: NaiveDate,
    ) -> Result<Vec<PestRiskAssessment>>;
    fn forecast_predictions(&self, parcel_id: ParcelId) -> Result<Vec<ForecastRiskPrediction>>;
    /// Replaces every stored prediction for the parcel.
    fn replace_forecast_predictions(
        &self,
        parcel_id: ParcelId,
        predictions: &[ForecastRiskPrediction],
    ) -> Result<()>;
}
