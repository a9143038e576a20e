//! The advisory engine: wires the pure computations to the injected ports.

use super::advisory::{self, AdvisoryInputs};
use super::climate::{derive_location, fallback_profile, profile_from_location};
use super::conditions::{classify_all, classify_observation, DayConditions, FieldConditions};
use super::irrigation::{self, WaterBalanceInput};
use super::pests::PestScorer;
use super::upgrade::{ClimateUpgrader, UpgradeQueue};
use crate::error::{OliveOpsError, Result};
use crate::models::{
    ClimateProfile, DeficitStrategy, ForecastRiskPrediction, IrrigateDecision, IrrigationEvent,
    IrrigationRecommendation, IrrigationSystemSpec, ParcelId, PestRiskAssessment, PestType,
    RiskInputs, RiskLevel, SoilProfile, SprayDecision, TreatmentPlan, TreatmentWindow,
    WaterUsageStats, WeatherAdvisory, WeatherState,
};
use crate::ports::{GeometryResolver, HistoricalClimateProvider, PersistencePort, WeatherProvider};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const NO_WEATHER_ALERT: &str = "Weather data not available - risk cannot be assessed";

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Stored forecasts younger than this are served without a provider call.
    pub forecast_staleness: Duration,
    pub archive_years: u32,
    pub deficit_strategy: DeficitStrategy,
    /// Used to price logged events that carry no cost, per hectare.
    pub water_cost_per_m3: Option<f64>,
    /// Template for parcels without a stored soil profile.
    pub soil_preset: SoilProfile,
    /// Template for parcels without a stored irrigation system.
    pub system_preset: IrrigationSystemSpec,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            forecast_staleness: Duration::minutes(60),
            archive_years: 5,
            deficit_strategy: DeficitStrategy::None,
            water_cost_per_m3: None,
            soil_preset: SoilProfile::mediterranean_default(ParcelId(0)),
            system_preset: IrrigationSystemSpec::drip_default(ParcelId(0)),
        }
    }
}

pub struct AdvisoryEngine {
    store: Arc<dyn PersistencePort>,
    geometry: Arc<dyn GeometryResolver>,
    weather: Arc<dyn WeatherProvider>,
    scorer: PestScorer,
    upgrades: Option<UpgradeQueue>,
    settings: EngineSettings,
}

impl AdvisoryEngine {
    /// Starts the climate upgrade worker when called inside a tokio runtime.
    /// Outside one, profiles are still served but never upgraded.
    pub fn new(
        store: Arc<dyn PersistencePort>,
        geometry: Arc<dyn GeometryResolver>,
        weather: Arc<dyn WeatherProvider>,
        archive: Arc<dyn HistoricalClimateProvider>,
        settings: EngineSettings,
    ) -> Self {
        let upgrades = match tokio::runtime::Handle::try_current() {
            Ok(_) => {
                let upgrader =
                    ClimateUpgrader::new(Arc::clone(&store), archive, settings.archive_years);
                let (queue, _worker) = UpgradeQueue::spawn(upgrader);
                Some(queue)
            }
            Err(_) => {
                debug!("No tokio runtime, climate upgrades disabled");
                None
            }
        };

        Self {
            store,
            geometry,
            weather,
            scorer: PestScorer::new(),
            upgrades,
            settings,
        }
    }

    pub fn with_scorer(mut self, scorer: PestScorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn upgrade_pending(&self, parcel_id: ParcelId) -> bool {
        self.upgrades
            .as_ref()
            .map(|q| q.is_pending(parcel_id))
            .unwrap_or(false)
    }

    fn schedule_upgrade(&self, parcel_id: ParcelId) {
        if let Some(queue) = &self.upgrades {
            if queue.schedule(parcel_id) {
                debug!(parcel_id = %parcel_id, "Scheduled climate profile upgrade");
            }
        }
    }

    // Climate context

    /// Returns the best stored profile without waiting on any upgrade.
    pub fn get_or_create_climate_profile(&self, parcel_id: ParcelId) -> Result<ClimateProfile> {
        let now = Utc::now();
        if let Some(profile) = self.store.climate_profile(parcel_id)? {
            if profile.needs_upgrade(now) {
                self.schedule_upgrade(parcel_id);
            }
            return Ok(profile);
        }

        let geometry = match self.geometry.geometry(parcel_id) {
            Ok(g) => g,
            Err(OliveOpsError::LocationUnavailable(_)) => {
                warn!(parcel_id = %parcel_id, "No geometry for parcel, using default climate context");
                return Ok(fallback_profile(parcel_id, now));
            }
            Err(e) => return Err(e),
        };

        let profile = profile_from_location(parcel_id, derive_location(&geometry), now);
        if let Err(e) = self.store.upsert_climate_profile(&profile) {
            warn!(parcel_id = %parcel_id, error = %e, "Failed to store climate profile");
        }
        info!(
            parcel_id = %parcel_id,
            zone = %profile.zone,
            confidence = profile.confidence,
            "Created climate profile from location"
        );
        self.schedule_upgrade(parcel_id);
        Ok(profile)
    }

    // Weather

    /// Serves stored weather while fresh, otherwise asks the provider. On
    /// provider failure the stored data is returned marked stale.
    pub async fn refresh_weather(&self, parcel_id: ParcelId) -> Result<WeatherState> {
        let now = Utc::now();
        let stored_current = self.store.latest_observation(parcel_id)?;
        let stored_daily = self.store.daily_forecasts(parcel_id)?;

        let last_fetch = stored_daily.iter().map(|d| d.fetched_at).max();
        if let Some(fetched) = last_fetch {
            if now - fetched < self.settings.forecast_staleness {
                return Ok(WeatherState {
                    current: stored_current,
                    daily: stored_daily,
                    stale: false,
                });
            }
        }

        let fetched = match self.geometry.geometry(parcel_id) {
            Ok(g) => self.weather.current_and_forecast(g.latitude, g.longitude).await,
            Err(OliveOpsError::LocationUnavailable(_)) => {
                Err(OliveOpsError::LocationUnavailable(parcel_id))
            }
            Err(e) => return Err(e),
        };

        match fetched {
            Ok(report) => {
                if let Err(e) = self.store.insert_observation(parcel_id, &report.current) {
                    warn!(parcel_id = %parcel_id, error = %e, "Failed to store observation");
                }
                if let Err(e) = self.store.replace_daily_forecasts(parcel_id, &report.daily) {
                    warn!(parcel_id = %parcel_id, error = %e, "Failed to store forecast");
                }
                Ok(WeatherState {
                    current: Some(report.current),
                    daily: report.daily,
                    stale: false,
                })
            }
            Err(e)
                if e.is_provider_failure()
                    || matches!(e, OliveOpsError::LocationUnavailable(_)) =>
            {
                if stored_current.is_none() && stored_daily.is_empty() {
                    warn!(parcel_id = %parcel_id, error = %e, "Weather unavailable and nothing stored");
                    return Err(OliveOpsError::NoWeatherData(parcel_id));
                }
                warn!(parcel_id = %parcel_id, error = %e, "Weather refresh failed, serving stored data");
                Ok(WeatherState {
                    current: stored_current,
                    daily: stored_daily,
                    stale: true,
                })
            }
            Err(e) => Err(e),
        }
    }

    // Irrigation

    fn soil_for(&self, parcel_id: ParcelId) -> Result<SoilProfile> {
        if let Some(soil) = self.store.soil_profile(parcel_id)? {
            return Ok(soil);
        }
        let mut soil = self.settings.soil_preset.clone();
        soil.parcel_id = parcel_id;
        if let Ok(Some(slope)) = self.geometry.geometry(parcel_id).map(|g| g.slope_percent) {
            soil.slope_percent = slope;
        }
        if let Err(e) = self.store.upsert_soil_profile(&soil) {
            warn!(parcel_id = %parcel_id, error = %e, "Failed to store default soil profile");
        }
        Ok(soil)
    }

    fn system_for(&self, parcel_id: ParcelId) -> Result<IrrigationSystemSpec> {
        if let Some(system) = self.store.irrigation_system(parcel_id)? {
            return Ok(system);
        }
        let mut system = self.settings.system_preset.clone();
        system.parcel_id = parcel_id;
        if let Err(e) = self.store.upsert_irrigation_system(&system) {
            warn!(parcel_id = %parcel_id, error = %e, "Failed to store default irrigation system");
        }
        Ok(system)
    }

    /// Daily water balance from the latest stored observation. Recomputing the
    /// same day replaces the stored record.
    pub fn calculate_irrigation_recommendation(
        &self,
        parcel_id: ParcelId,
        date: NaiveDate,
    ) -> Result<IrrigationRecommendation> {
        let soil = self.soil_for(parcel_id)?;
        let system = self.system_for(parcel_id)?;
        let prior_deficit = self
            .store
            .recommendation_before(parcel_id, date)?
            .map(|r| r.cumulative_deficit)
            .unwrap_or(0.0);
        let strategy = self.settings.deficit_strategy;

        let recommendation = match self.store.latest_observation(parcel_id)? {
            None => {
                info!(parcel_id = %parcel_id, "No weather observation, returning degraded recommendation");
                irrigation::degraded(parcel_id, date, prior_deficit, &soil, strategy)
            }
            Some(observation) => {
                let events = self.store.irrigation_events_between(
                    parcel_id,
                    date - Duration::days(1),
                    date,
                )?;
                irrigation::calculate(&WaterBalanceInput {
                    parcel_id,
                    date,
                    et0: observation.et0,
                    rainfall: observation.rain_next_24h,
                    irrigation_applied: irrigation::applied_last_24h(&events, date),
                    prior_deficit,
                    soil: &soil,
                    system: &system,
                    strategy,
                })
            }
        };

        if let Err(e) = self.store.upsert_recommendation(&recommendation) {
            warn!(parcel_id = %parcel_id, error = %e, "Failed to store irrigation recommendation");
        }
        Ok(recommendation)
    }

    pub fn log_irrigation_event(&self, mut event: IrrigationEvent) -> Result<IrrigationEvent> {
        if !event.water_amount_mm.is_finite() || event.water_amount_mm < 0.0 {
            return Err(OliveOpsError::InvalidData(format!(
                "water amount must be a non-negative number, got {}",
                event.water_amount_mm
            )));
        }
        if event.cost.is_none() {
            // 1 mm over a hectare is 10 m³
            event.cost = self
                .settings
                .water_cost_per_m3
                .map(|price| event.water_amount_mm * 10.0 * price);
        }
        let id = self.store.append_irrigation_event(&event)?;
        event.id = Some(id);
        info!(parcel_id = %event.parcel_id, mm = event.water_amount_mm, "Logged irrigation event");
        Ok(event)
    }

    pub fn get_irrigation_history(
        &self,
        parcel_id: ParcelId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<IrrigationEvent>> {
        check_range(from, to)?;
        self.store.irrigation_events_between(parcel_id, from, to)
    }

    pub fn get_water_usage_stats(
        &self,
        parcel_id: ParcelId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<WaterUsageStats> {
        check_range(from, to)?;
        let events = self.store.irrigation_events_between(parcel_id, from, to)?;
        let recommendations = self.store.recommendations_between(parcel_id, from, to)?;
        let system = self.system_for(parcel_id)?;
        Ok(irrigation::usage_stats(
            parcel_id,
            from,
            to,
            &events,
            &recommendations,
            &system,
        ))
    }

    // Pest risk

    /// Scores the latest observation. Without one, every pest is reported as
    /// unassessed and nothing is stored.
    pub fn calculate_current_pest_risk(&self, parcel_id: ParcelId) -> Result<Vec<PestRiskAssessment>> {
        let now = Utc::now();
        let Some(observation) = self.store.latest_observation(parcel_id)? else {
            info!(parcel_id = %parcel_id, "No weather observation, pest risk not assessed");
            return Ok(self.unassessed(parcel_id, now));
        };
        let profile = self.get_or_create_climate_profile(parcel_id)?;

        let assessments =
            self.scorer
                .assess_current(parcel_id, &observation, profile.hemisphere(), now);
        for assessment in &assessments {
            if let Err(e) = self.store.upsert_pest_assessment(assessment) {
                warn!(
                    parcel_id = %parcel_id,
                    pest = %assessment.pest_type,
                    error = %e,
                    "Failed to store pest assessment"
                );
            }
        }
        Ok(assessments)
    }

    fn unassessed(&self, parcel_id: ParcelId, now: DateTime<Utc>) -> Vec<PestRiskAssessment> {
        let date = now.date_naive();
        self.scorer
            .pest_types()
            .into_iter()
            .map(|pest_type| PestRiskAssessment {
                parcel_id,
                pest_type,
                date,
                risk_score: 0.0,
                risk_level: RiskLevel::None,
                alert_message: NO_WEATHER_ALERT.to_string(),
                plan: TreatmentPlan::empty(RiskLevel::None),
                inputs: RiskInputs {
                    temperature: 0.0,
                    humidity: 0.0,
                    precipitation: 0.0,
                    rain_next_24h: 0.0,
                    month: date.month(),
                },
                calculated_at: now,
            })
            .collect()
    }

    /// Stored predictions are reused while they are newer than the stored
    /// forecast; otherwise all of them are recomputed and replaced.
    pub fn get_or_refresh_forecast_risk(
        &self,
        parcel_id: ParcelId,
    ) -> Result<Vec<ForecastRiskPrediction>> {
        let stored = self.store.forecast_predictions(parcel_id)?;
        let daily = self.store.daily_forecasts(parcel_id)?;
        let Some(last_fetch) = daily.iter().map(|d| d.fetched_at).max() else {
            return Ok(stored);
        };
        if !stored.is_empty() && stored.iter().all(|p| p.generated_at >= last_fetch) {
            return Ok(stored);
        }

        let profile = self.get_or_create_climate_profile(parcel_id)?;
        let predictions =
            self.scorer
                .forecast(parcel_id, &daily, profile.hemisphere(), Utc::now());
        if let Err(e) = self.store.replace_forecast_predictions(parcel_id, &predictions) {
            warn!(parcel_id = %parcel_id, error = %e, "Failed to store forecast risk");
        }
        Ok(predictions)
    }

    pub fn get_pest_risk_history(
        &self,
        parcel_id: ParcelId,
        pest_type: Option<PestType>,
        days: u32,
    ) -> Result<Vec<PestRiskAssessment>> {
        let since = Utc::now().date_naive() - Duration::days(days as i64);
        self.store.pest_assessments_since(parcel_id, pest_type, since)
    }

    // Advisory

    fn conditions(&self, parcel_id: ParcelId) -> Result<(ClimateProfile, Vec<DayConditions>)> {
        let profile = self.get_or_create_climate_profile(parcel_id)?;
        let daily = self.store.daily_forecasts(parcel_id)?;
        let conditions = classify_all(&daily, &profile);
        Ok((profile, conditions))
    }

    pub fn field_conditions(&self, parcel_id: ParcelId) -> Result<FieldConditions> {
        let (profile, forecast) = self.conditions(parcel_id)?;
        let current = self
            .store
            .latest_observation(parcel_id)?
            .map(|obs| classify_observation(&obs, &profile));
        Ok(FieldConditions { current, forecast })
    }

    pub fn generate_weather_advisory(&self, parcel_id: ParcelId) -> Result<WeatherAdvisory> {
        let (profile, conditions) = self.conditions(parcel_id)?;
        let predictions = if conditions.is_empty() {
            Vec::new()
        } else {
            self.get_or_refresh_forecast_risk(parcel_id)?
        };
        let latest = self.store.latest_recommendation(parcel_id)?;
        let now = Utc::now();

        Ok(advisory::generate(&AdvisoryInputs {
            parcel_id,
            profile: &profile,
            conditions: &conditions,
            predictions: &predictions,
            latest_recommendation: latest.as_ref(),
            today: now.date_naive(),
            now,
        }))
    }

    pub fn should_irrigate_now(&self, parcel_id: ParcelId) -> Result<IrrigateDecision> {
        let (_, conditions) = self.conditions(parcel_id)?;
        Ok(advisory::should_irrigate(&conditions))
    }

    pub fn should_spray_now(&self, parcel_id: ParcelId) -> Result<SprayDecision> {
        let (_, conditions) = self.conditions(parcel_id)?;
        Ok(advisory::should_spray(&conditions))
    }

    pub fn best_treatment_window(
        &self,
        parcel_id: ParcelId,
        max_days: u32,
    ) -> Result<TreatmentWindow> {
        let (_, conditions) = self.conditions(parcel_id)?;
        Ok(advisory::best_treatment_window(&conditions, max_days))
    }
}

fn check_range(from: NaiveDate, to: NaiveDate) -> Result<()> {
    if from > to {
        return Err(OliveOpsError::InvalidData(format!(
            "start date {} is after end date {}",
            from, to
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::logic::conditions::tests::fair_day;
    use crate::logic::upgrade::tests::StubArchive;
    use crate::models::{
        DailyForecast, DataTier, Observation, Parcel, ParcelGeometry, SystemType, Urgency,
        WeatherReport,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Weather stub: serves a fixed report, or fails with a timeout when
    /// `report` is `None`.
    struct StubWeather {
        report: Mutex<Option<WeatherReport>>,
        calls: AtomicUsize,
    }

    impl StubWeather {
        fn serving(report: WeatherReport) -> Self {
            Self {
                report: Mutex::new(Some(report)),
                calls: AtomicUsize::new(0),
            }
        }

        fn down() -> Self {
            Self {
                report: Mutex::new(None),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl WeatherProvider for StubWeather {
        async fn current_and_forecast(&self, _lat: f64, _lon: f64) -> Result<WeatherReport> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.report
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| OliveOpsError::ProviderTimeout("forecast".to_string()))
        }
    }

    fn observation(at: DateTime<Utc>) -> Observation {
        Observation {
            observed_at: at,
            fetched_at: at,
            temperature: 24.0,
            humidity: 65.0,
            precipitation: 0.0,
            wind_speed: 10.0,
            wind_direction: 180.0,
            cloud_cover: 10.0,
            pressure: 1014.0,
            et0: 5.5,
            rain_next_24h: 0.0,
            temp_min_24h: 17.0,
            temp_max_24h: 31.0,
        }
    }

    fn report(at: DateTime<Utc>) -> WeatherReport {
        let today = at.date_naive();
        let daily: Vec<DailyForecast> = (0..7)
            .map(|i| {
                let mut day = fair_day(today + Duration::days(i as i64), i);
                day.fetched_at = at;
                day
            })
            .collect();
        WeatherReport {
            current: observation(at),
            daily,
        }
    }

    fn registered_db() -> Arc<Database> {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let mut geometry = ParcelGeometry::new(36.0, -5.4);
        geometry.altitude_m = Some(300.0);
        geometry.distance_to_sea_km = Some(15.0);
        geometry.slope_percent = Some(8.0);
        db.upsert_parcel(&Parcel {
            id: ParcelId(1),
            name: "South terrace".into(),
            geometry: Some(geometry),
        })
        .unwrap();
        db
    }

    fn engine(db: Arc<Database>, weather: StubWeather) -> AdvisoryEngine {
        AdvisoryEngine::new(
            db.clone(),
            db,
            Arc::new(weather),
            Arc::new(StubArchive::failing()),
            EngineSettings::default(),
        )
    }

    #[tokio::test]
    async fn profile_is_created_from_geometry() {
        let db = registered_db();
        let engine = engine(db.clone(), StubWeather::down());

        let profile = engine.get_or_create_climate_profile(ParcelId(1)).unwrap();
        assert_eq!(profile.zone.as_str(), "Warm Mediterranean");
        assert_eq!(profile.irrigation_factor, 0.85);
        assert_eq!(profile.tier, DataTier::LocationEstimate);
        assert!(db.climate_profile(ParcelId(1)).unwrap().is_some());
    }

    #[tokio::test]
    async fn missing_geometry_falls_back_without_storing() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let engine = engine(db.clone(), StubWeather::down());

        let profile = engine.get_or_create_climate_profile(ParcelId(5)).unwrap();
        assert_eq!(profile.confidence, 0.0);
        assert!(db.climate_profile(ParcelId(5)).unwrap().is_none());
    }

    #[tokio::test]
    async fn refresh_stores_report_then_serves_cache() {
        let db = registered_db();
        let weather = StubWeather::serving(report(Utc::now()));
        let engine = AdvisoryEngine::new(
            db.clone(),
            db.clone(),
            Arc::new(weather),
            Arc::new(StubArchive::failing()),
            EngineSettings::default(),
        );

        let first = engine.refresh_weather(ParcelId(1)).await.unwrap();
        assert!(!first.stale);
        assert_eq!(first.daily.len(), 7);
        assert_eq!(db.daily_forecasts(ParcelId(1)).unwrap().len(), 7);

        let second = engine.refresh_weather(ParcelId(1)).await.unwrap();
        assert!(!second.stale);
        assert_eq!(second.daily, first.daily);
    }

    #[tokio::test]
    async fn provider_failure_serves_stale_data() {
        let db = registered_db();
        let old = Utc::now() - Duration::hours(6);
        let stored = report(old);
        db.insert_observation(ParcelId(1), &stored.current).unwrap();
        db.replace_daily_forecasts(ParcelId(1), &stored.daily).unwrap();

        let engine = engine(db, StubWeather::down());
        let state = engine.refresh_weather(ParcelId(1)).await.unwrap();
        assert!(state.stale);
        assert_eq!(state.daily.len(), 7);
        assert!(state.current.is_some());
    }

    #[tokio::test]
    async fn provider_failure_with_nothing_stored_is_no_weather() {
        let engine = engine(registered_db(), StubWeather::down());
        assert!(matches!(
            engine.refresh_weather(ParcelId(1)).await,
            Err(OliveOpsError::NoWeatherData(ParcelId(1)))
        ));
    }

    #[tokio::test]
    async fn recommendation_without_weather_is_degraded() {
        let db = registered_db();
        let engine = engine(db.clone(), StubWeather::down());
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();

        let rec = engine
            .calculate_irrigation_recommendation(ParcelId(1), date)
            .unwrap();
        assert!(!rec.should_irrigate);
        assert_eq!(rec.weather_forecast, irrigation::NO_WEATHER_TEXT);
        assert_eq!(rec.urgency, Urgency::None);

        // defaults are persisted on first use, slope from geometry
        let soil = db.soil_profile(ParcelId(1)).unwrap().unwrap();
        assert_eq!(soil.slope_percent, 8.0);
        assert_eq!(soil.available_water_capacity, 150.0);
        let system = db.irrigation_system(ParcelId(1)).unwrap().unwrap();
        assert_eq!(system.system_type, SystemType::Drip);
    }

    #[tokio::test]
    async fn recommendation_is_idempotent_per_day() {
        let db = registered_db();
        db.insert_observation(ParcelId(1), &observation(Utc::now()))
            .unwrap();
        let engine = engine(db.clone(), StubWeather::down());
        let day1 = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        let day2 = NaiveDate::from_ymd_opt(2025, 7, 2).unwrap();

        let first = engine
            .calculate_irrigation_recommendation(ParcelId(1), day1)
            .unwrap();
        // 5.5 x 0.75
        assert!((first.cumulative_deficit - 4.125).abs() < 1e-9);

        let again = engine
            .calculate_irrigation_recommendation(ParcelId(1), day1)
            .unwrap();
        assert_eq!(again.cumulative_deficit, first.cumulative_deficit);

        let next = engine
            .calculate_irrigation_recommendation(ParcelId(1), day2)
            .unwrap();
        assert!((next.cumulative_deficit - 8.25).abs() < 1e-9);
        assert_eq!(
            db.recommendations_between(ParcelId(1), day1, day2)
                .unwrap()
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn logged_irrigation_offsets_demand() {
        let db = registered_db();
        db.insert_observation(ParcelId(1), &observation(Utc::now()))
            .unwrap();
        let engine = engine(db, StubWeather::down());
        let date = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();

        engine
            .log_irrigation_event(IrrigationEvent::new(ParcelId(1), date, 10.0))
            .unwrap();
        let rec = engine
            .calculate_irrigation_recommendation(ParcelId(1), date)
            .unwrap();
        assert_eq!(rec.irrigation_applied, 10.0);
        assert_eq!(rec.cumulative_deficit, 0.0);
    }

    #[tokio::test]
    async fn event_log_and_usage_stats() {
        let db = registered_db();
        let settings = EngineSettings {
            water_cost_per_m3: Some(0.5),
            ..EngineSettings::default()
        };
        let engine = AdvisoryEngine::new(
            db.clone(),
            db,
            Arc::new(StubWeather::down()),
            Arc::new(StubArchive::failing()),
            settings,
        );
        let june = |d| NaiveDate::from_ymd_opt(2025, 6, d).unwrap();

        let logged = engine
            .log_irrigation_event(IrrigationEvent::new(ParcelId(1), june(3), 8.0))
            .unwrap();
        assert!(logged.id.is_some());
        assert_eq!(logged.cost, Some(40.0));
        engine
            .log_irrigation_event(IrrigationEvent::new(ParcelId(1), june(10), 4.0).with_cost(1.0))
            .unwrap();

        let history = engine
            .get_irrigation_history(ParcelId(1), june(1), june(30))
            .unwrap();
        assert_eq!(history.len(), 2);

        let stats = engine
            .get_water_usage_stats(ParcelId(1), june(1), june(30))
            .unwrap();
        assert_eq!(stats.irrigation_events, 2);
        assert_eq!(stats.total_water_applied_mm, 12.0);
        assert_eq!(stats.total_liters_per_tree, 12.0 * 36.0);
        assert_eq!(stats.total_cost, 41.0);

        assert!(engine
            .log_irrigation_event(IrrigationEvent::new(ParcelId(1), june(4), -1.0))
            .is_err());
        assert!(engine
            .get_irrigation_history(ParcelId(1), june(30), june(1))
            .is_err());
    }

    #[tokio::test]
    async fn pest_risk_without_weather_is_unassessed() {
        let db = registered_db();
        let engine = engine(db.clone(), StubWeather::down());

        let assessments = engine.calculate_current_pest_risk(ParcelId(1)).unwrap();
        assert_eq!(assessments.len(), 2);
        assert!(assessments
            .iter()
            .all(|a| a.risk_level == RiskLevel::None && a.alert_message == NO_WEATHER_ALERT));
        assert!(engine
            .get_pest_risk_history(ParcelId(1), None, 30)
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn pest_risk_is_stored_and_listed() {
        let db = registered_db();
        db.insert_observation(ParcelId(1), &observation(Utc::now()))
            .unwrap();
        let engine = engine(db, StubWeather::down());

        let assessments = engine.calculate_current_pest_risk(ParcelId(1)).unwrap();
        assert_eq!(assessments.len(), 2);
        engine.calculate_current_pest_risk(ParcelId(1)).unwrap();

        let history = engine.get_pest_risk_history(ParcelId(1), None, 7).unwrap();
        assert_eq!(history.len(), 2);
        let fly = engine
            .get_pest_risk_history(ParcelId(1), Some(PestType::OliveFly), 7)
            .unwrap();
        assert_eq!(fly.len(), 1);
    }

    #[tokio::test]
    async fn forecast_risk_is_reused_until_new_forecast() {
        let db = registered_db();
        let fetched = Utc::now() - Duration::minutes(5);
        db.replace_daily_forecasts(ParcelId(1), &report(fetched).daily)
            .unwrap();
        let engine = engine(db.clone(), StubWeather::down());

        let first = engine.get_or_refresh_forecast_risk(ParcelId(1)).unwrap();
        assert_eq!(first.len(), 14);
        assert_eq!(first[0].confidence, 100.0);

        let again = engine.get_or_refresh_forecast_risk(ParcelId(1)).unwrap();
        assert_eq!(again.len(), 14);
        assert!(again.iter().all(|p| p.generated_at == first[0].generated_at));

        db.replace_daily_forecasts(ParcelId(1), &report(Utc::now()).daily)
            .unwrap();
        let refreshed = engine.get_or_refresh_forecast_risk(ParcelId(1)).unwrap();
        assert!(refreshed[0].generated_at > first[0].generated_at);
    }

    #[tokio::test]
    async fn advisory_without_forecast_is_informational() {
        let engine = engine(registered_db(), StubWeather::down());
        let advisory = engine.generate_weather_advisory(ParcelId(1)).unwrap();
        assert_eq!(advisory.advisories.len(), 1);
        assert_eq!(advisory.advisories[0].message, "Weather forecast not available");
        assert_eq!(advisory.best_spray_day, -1);

        let decision = engine.should_irrigate_now(ParcelId(1)).unwrap();
        assert!(decision.should_irrigate);
        let spray = engine.should_spray_now(ParcelId(1)).unwrap();
        assert!(!spray.should_spray);
        assert_eq!(spray.best_day, -1);
        assert_eq!(engine.best_treatment_window(ParcelId(1), 7).unwrap().day, -1);
    }

    #[tokio::test]
    async fn advisory_uses_stored_forecast() {
        let db = registered_db();
        let engine = AdvisoryEngine::new(
            db.clone(),
            db.clone(),
            Arc::new(StubWeather::serving(report(Utc::now()))),
            Arc::new(StubArchive::failing()),
            EngineSettings::default(),
        );
        engine.refresh_weather(ParcelId(1)).await.unwrap();

        let advisory = engine.generate_weather_advisory(ParcelId(1)).unwrap();
        assert_eq!(advisory.parcel_id, ParcelId(1));
        assert!(advisory.rain_expected_days.is_empty());
        assert_eq!(db.forecast_predictions(ParcelId(1)).unwrap().len(), 14);
    }

    #[tokio::test]
    async fn field_conditions_cover_observation_and_forecast() {
        let db = registered_db();
        let engine = engine(db.clone(), StubWeather::serving(report(Utc::now())));

        let empty = engine.field_conditions(ParcelId(1)).unwrap();
        assert!(empty.current.is_none());
        assert!(empty.forecast.is_empty());

        engine.refresh_weather(ParcelId(1)).await.unwrap();
        let conditions = engine.field_conditions(ParcelId(1)).unwrap();
        let current = conditions.current.unwrap();
        assert_eq!(current.days_ahead, 0);
        assert!(!current.is_treat_window);
        assert_eq!(conditions.forecast.len(), 7);
    }
}
