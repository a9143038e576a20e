use crate::db::Database;
use crate::error::{OliveOpsError, Result};
use crate::models::{
    ClimateProfile, ClimateStats, ClimateZone, DailyForecast, DataTier, DeficitStrategy,
    DormancyWindow, ForecastRiskPrediction, GrowthStage, Hemisphere, IrrigationEvent,
    IrrigationRecommendation, IrrigationSystemSpec, Observation, Parcel, ParcelGeometry, ParcelId,
    ParcelLocation, PestRiskAssessment, PestType, RiskInputs, RiskLevel, SoilProfile, SoilTexture,
    StressLevel, SystemType, TreatmentPlan, Trend, Urgency,
};
use crate::ports::{GeometryResolver, PersistencePort};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Row};
use tracing::warn;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Observations older than this are pruned on insert. A full year is kept for
/// the weather-history climate upgrade.
pub const OBSERVATION_RETENTION_DAYS: i64 = 400;

fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn day(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            warn!(timestamp = %s, "Invalid timestamp in database, using now");
            Utc::now()
        })
}

fn parse_day(s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

// Parcel Queries

impl Database {
    pub fn upsert_parcel(&self, parcel: &Parcel) -> Result<()> {
        let geometry = parcel.geometry.as_ref();
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO parcels
                    (id, name, latitude, longitude, altitude_m, slope_percent, distance_to_sea_km, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    latitude = excluded.latitude,
                    longitude = excluded.longitude,
                    altitude_m = excluded.altitude_m,
                    slope_percent = excluded.slope_percent,
                    distance_to_sea_km = excluded.distance_to_sea_km,
                    updated_at = excluded.updated_at
                "#,
                params![
                    parcel.id.0,
                    parcel.name,
                    geometry.map(|g| g.latitude),
                    geometry.map(|g| g.longitude),
                    geometry.and_then(|g| g.altitude_m),
                    geometry.and_then(|g| g.slope_percent),
                    geometry.and_then(|g| g.distance_to_sea_km),
                    ts(&Utc::now()),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_parcel(&self, parcel_id: ParcelId) -> Result<Option<Parcel>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM parcels WHERE id = ?1",
                [parcel_id.0],
                row_to_parcel,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    pub fn list_parcels(&self) -> Result<Vec<Parcel>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM parcels ORDER BY id")?;
            let parcels = stmt
                .query_map([], row_to_parcel)?
                .filter_map(|r| r.ok())
                .collect();
            Ok(parcels)
        })
    }
}

fn row_to_parcel(row: &Row) -> rusqlite::Result<Parcel> {
    let latitude: Option<f64> = row.get("latitude")?;
    let longitude: Option<f64> = row.get("longitude")?;
    let geometry = match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Some(ParcelGeometry {
            latitude,
            longitude,
            altitude_m: row.get("altitude_m")?,
            slope_percent: row.get("slope_percent")?,
            distance_to_sea_km: row.get("distance_to_sea_km")?,
        }),
        _ => None,
    };
    Ok(Parcel {
        id: ParcelId(row.get("id")?),
        name: row.get("name")?,
        geometry,
    })
}

impl GeometryResolver for Database {
    fn geometry(&self, parcel_id: ParcelId) -> Result<ParcelGeometry> {
        self.get_parcel(parcel_id)?
            .and_then(|p| p.geometry)
            .ok_or(OliveOpsError::LocationUnavailable(parcel_id))
    }
}

fn row_to_climate_profile(row: &Row) -> rusqlite::Result<ClimateProfile> {
    let zone_str: String = row.get("zone")?;
    let hemisphere_str: String = row.get("hemisphere")?;
    let tier_str: String = row.get("tier")?;
    let suitability_json: String = row.get("suitability_json")?;
    let last_calculated: String = row.get("last_calculated")?;
    let latitude: f64 = row.get("latitude")?;

    let zone = ClimateZone::from_str(&zone_str).unwrap_or_else(|| {
        warn!(zone = %zone_str, "Unknown climate zone in database, defaulting to Central Mediterranean");
        ClimateZone::CentralMediterranean
    });
    let hemisphere = Hemisphere::from_str(&hemisphere_str).unwrap_or_else(|| {
        warn!(hemisphere = %hemisphere_str, "Unknown hemisphere in database, using latitude");
        Hemisphere::from_latitude(latitude)
    });
    let tier = DataTier::from_str(&tier_str).unwrap_or_else(|| {
        warn!(tier = %tier_str, "Unknown data tier in database, defaulting to location_estimate");
        DataTier::LocationEstimate
    });
    let suitability = serde_json::from_str(&suitability_json).unwrap_or_else(|e| {
        warn!("Unreadable suitability factors in database: {}", e);
        Vec::new()
    });

    Ok(ClimateProfile {
        parcel_id: ParcelId(row.get("parcel_id")?),
        zone,
        location: ParcelLocation {
            latitude,
            longitude: row.get("longitude")?,
            altitude_m: row.get("altitude_m")?,
            distance_to_sea_km: row.get("distance_to_sea_km")?,
            hemisphere,
            altitude_measured: row.get("altitude_measured")?,
        },
        dormancy: DormancyWindow::new(row.get("dormancy_start")?, row.get("dormancy_end")?),
        irrigation_factor: row.get("irrigation_factor")?,
        et_multiplier: row.get("et_multiplier")?,
        pest_pressure_factor: row.get("pest_pressure_factor")?,
        frost_risk_factor: row.get("frost_risk_factor")?,
        suitability_score: row.get("suitability_score")?,
        suitability,
        confidence: row.get("confidence")?,
        tier,
        stats: ClimateStats {
            avg_annual_temp: row.get("avg_annual_temp")?,
            winter_temp: row.get("winter_temp")?,
            summer_temp: row.get("summer_temp")?,
            annual_rainfall_mm: row.get("annual_rainfall_mm")?,
            frost_days: row.get("frost_days")?,
            hot_days: row.get("hot_days")?,
            gdd: row.get("gdd")?,
            chilling_hours: row.get("chilling_hours")?,
            annual_et0_mm: row.get("annual_et0_mm")?,
        },
        last_calculated: parse_ts(&last_calculated),
    })
}

fn row_to_soil_profile(row: &Row) -> rusqlite::Result<SoilProfile> {
    let texture_str: String = row.get("texture")?;
    let texture = SoilTexture::from_str(&texture_str).unwrap_or_else(|| {
        warn!(texture = %texture_str, "Unknown soil texture in database, defaulting to clay_loam");
        SoilTexture::ClayLoam
    });
    Ok(SoilProfile {
        parcel_id: ParcelId(row.get("parcel_id")?),
        texture,
        field_capacity: row.get("field_capacity")?,
        wilting_point: row.get("wilting_point")?,
        available_water_capacity: row.get("available_water_capacity")?,
        root_depth_cm: row.get("root_depth_cm")?,
        infiltration_rate: row.get("infiltration_rate")?,
        slope_percent: row.get("slope_percent")?,
        organic_matter: row.get("organic_matter")?,
    })
}

fn row_to_irrigation_system(row: &Row) -> rusqlite::Result<IrrigationSystemSpec> {
    let type_str: String = row.get("system_type")?;
    let system_type = SystemType::from_str(&type_str).unwrap_or_else(|| {
        warn!(system_type = %type_str, "Unknown irrigation system in database, defaulting to drip");
        SystemType::Drip
    });
    Ok(IrrigationSystemSpec {
        parcel_id: ParcelId(row.get("parcel_id")?),
        system_type,
        efficiency: row.get("efficiency")?,
        flow_rate: row.get("flow_rate")?,
        emitter_spacing_cm: row.get("emitter_spacing_cm")?,
        tree_spacing_m: row.get("tree_spacing_m")?,
    })
}

fn row_to_observation(row: &Row) -> rusqlite::Result<Observation> {
    let observed_at: String = row.get("observed_at")?;
    let fetched_at: String = row.get("fetched_at")?;
    Ok(Observation {
        observed_at: parse_ts(&observed_at),
        fetched_at: parse_ts(&fetched_at),
        temperature: row.get("temperature")?,
        humidity: row.get("humidity")?,
        precipitation: row.get("precipitation")?,
        wind_speed: row.get("wind_speed")?,
        wind_direction: row.get("wind_direction")?,
        cloud_cover: row.get("cloud_cover")?,
        pressure: row.get("pressure")?,
        et0: row.get("et0")?,
        rain_next_24h: row.get("rain_next_24h")?,
        temp_min_24h: row.get("temp_min_24h")?,
        temp_max_24h: row.get("temp_max_24h")?,
    })
}

fn row_to_daily_forecast(row: &Row) -> rusqlite::Result<DailyForecast> {
    let date: String = row.get("forecast_date")?;
    let fetched_at: String = row.get("fetched_at")?;
    Ok(DailyForecast {
        date: parse_day(&date)?,
        days_ahead: row.get("days_ahead")?,
        temp_min: row.get("temp_min")?,
        temp_max: row.get("temp_max")?,
        temp_avg: row.get("temp_avg")?,
        precipitation_sum: row.get("precipitation_sum")?,
        precipitation_probability: row.get("precipitation_probability")?,
        humidity_min: row.get("humidity_min")?,
        humidity_max: row.get("humidity_max")?,
        humidity_avg: row.get("humidity_avg")?,
        wind_speed_max: row.get("wind_speed_max")?,
        wind_gust_max: row.get("wind_gust_max")?,
        et0: row.get("et0")?,
        sunshine_hours: row.get("sunshine_hours")?,
        uv_index_max: row.get("uv_index_max")?,
        fetched_at: parse_ts(&fetched_at),
    })
}

fn row_to_recommendation(row: &Row) -> rusqlite::Result<IrrigationRecommendation> {
    let date: String = row.get("calculation_date")?;
    let next_date: Option<String> = row.get("next_irrigation_date")?;
    let urgency_str: String = row.get("urgency")?;
    let stage_str: String = row.get("growth_stage")?;
    let stress_str: String = row.get("stress_level")?;
    let strategy_str: String = row.get("deficit_strategy")?;
    let calculation_date = parse_day(&date)?;

    let urgency = Urgency::from_str(&urgency_str).unwrap_or_else(|| {
        warn!(urgency = %urgency_str, "Unknown urgency in database, defaulting to none");
        Urgency::None
    });
    let growth_stage = GrowthStage::from_str(&stage_str).unwrap_or_else(|| {
        warn!(growth_stage = %stage_str, "Unknown growth stage in database, using calendar");
        GrowthStage::from_month(chrono::Datelike::month(&calculation_date))
    });
    let stress_level = StressLevel::from_str(&stress_str).unwrap_or_else(|| {
        warn!(stress_level = %stress_str, "Unknown stress level in database, defaulting to none");
        StressLevel::None
    });
    let deficit_strategy = DeficitStrategy::from_str(&strategy_str).unwrap_or_else(|| {
        warn!(deficit_strategy = %strategy_str, "Unknown deficit strategy in database, defaulting to none");
        DeficitStrategy::None
    });

    Ok(IrrigationRecommendation {
        parcel_id: ParcelId(row.get("parcel_id")?),
        calculation_date,
        et0: row.get("et0")?,
        kc: row.get("kc")?,
        etc: row.get("etc")?,
        rainfall: row.get("rainfall")?,
        effective_rainfall: row.get("effective_rainfall")?,
        irrigation_applied: row.get("irrigation_applied")?,
        water_balance: row.get("water_balance")?,
        cumulative_deficit: row.get("cumulative_deficit")?,
        soil_moisture: row.get("soil_moisture")?,
        should_irrigate: row.get("should_irrigate")?,
        recommended_amount_mm: row.get("recommended_amount_mm")?,
        recommended_liters_per_tree: row.get("recommended_liters_per_tree")?,
        urgency,
        growth_stage,
        stress_level,
        next_irrigation_date: next_date.as_deref().map(parse_day).transpose()?,
        weather_forecast: row.get("weather_forecast")?,
        deficit_strategy,
        deficit_reduction_percent: row.get("deficit_reduction_percent")?,
    })
}

fn row_to_irrigation_event(row: &Row) -> rusqlite::Result<IrrigationEvent> {
    let date: String = row.get("event_date")?;
    let method_str: Option<String> = row.get("method")?;
    let created_at: String = row.get("created_at")?;
    let method = method_str.as_ref().and_then(|m| {
        SystemType::from_str(m).or_else(|| {
            warn!(method = %m, "Unknown irrigation method in database, ignoring");
            None
        })
    });
    Ok(IrrigationEvent {
        id: Some(row.get("id")?),
        parcel_id: ParcelId(row.get("parcel_id")?),
        date: parse_day(&date)?,
        water_amount_mm: row.get("water_amount_mm")?,
        duration_minutes: row.get("duration_minutes")?,
        method,
        water_source: row.get("water_source")?,
        flow_rate: row.get("flow_rate")?,
        cost: row.get("cost")?,
        energy_kwh: row.get("energy_kwh")?,
        notes: row.get("notes")?,
        created_at: parse_ts(&created_at),
    })
}

fn pest_type_column(row: &Row) -> rusqlite::Result<PestType> {
    let s: String = row.get("pest_type")?;
    PestType::from_str(&s).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("unknown pest type {}", s).into(),
        )
    })
}

fn risk_level_column(row: &Row) -> rusqlite::Result<RiskLevel> {
    let s: String = row.get("risk_level")?;
    Ok(RiskLevel::from_str(&s).unwrap_or_else(|| {
        warn!(risk_level = %s, "Unknown risk level in database, defaulting to none");
        RiskLevel::None
    }))
}

fn plan_column(row: &Row, level: RiskLevel) -> rusqlite::Result<TreatmentPlan> {
    let json: String = row.get("plan_json")?;
    Ok(serde_json::from_str(&json).unwrap_or_else(|e| {
        warn!("Unreadable treatment plan in database: {}", e);
        TreatmentPlan::empty(level)
    }))
}

fn row_to_pest_assessment(row: &Row) -> rusqlite::Result<PestRiskAssessment> {
    let date: String = row.get("assessment_date")?;
    let calculated_at: String = row.get("calculated_at")?;
    let risk_level = risk_level_column(row)?;
    Ok(PestRiskAssessment {
        parcel_id: ParcelId(row.get("parcel_id")?),
        pest_type: pest_type_column(row)?,
        date: parse_day(&date)?,
        risk_score: row.get("risk_score")?,
        risk_level,
        alert_message: row.get("alert_message")?,
        plan: plan_column(row, risk_level)?,
        inputs: RiskInputs {
            temperature: row.get("temperature")?,
            humidity: row.get("humidity")?,
            precipitation: row.get("precipitation")?,
            rain_next_24h: row.get("rain_next_24h")?,
            month: row.get("month")?,
        },
        calculated_at: parse_ts(&calculated_at),
    })
}

fn row_to_prediction(row: &Row) -> rusqlite::Result<ForecastRiskPrediction> {
    let date: String = row.get("forecast_date")?;
    let generated_at: String = row.get("generated_at")?;
    let trend_str: String = row.get("trend")?;
    let risk_level = risk_level_column(row)?;
    let trend = Trend::from_str(&trend_str).unwrap_or_else(|| {
        warn!(trend = %trend_str, "Unknown trend in database, defaulting to stable");
        Trend::Stable
    });
    Ok(ForecastRiskPrediction {
        parcel_id: ParcelId(row.get("parcel_id")?),
        pest_type: pest_type_column(row)?,
        days_ahead: row.get("days_ahead")?,
        forecast_date: parse_day(&date)?,
        risk_score: row.get("risk_score")?,
        risk_level,
        trend,
        confidence: row.get("confidence")?,
        alert_message: row.get("alert_message")?,
        plan: plan_column(row, risk_level)?,
        generated_at: parse_ts(&generated_at),
    })
}

impl PersistencePort for Database {
    // Climate Profile Queries

    fn climate_profile(&self, parcel_id: ParcelId) -> Result<Option<ClimateProfile>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM climate_profiles WHERE parcel_id = ?1",
                [parcel_id.0],
                row_to_climate_profile,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    fn upsert_climate_profile(&self, profile: &ClimateProfile) -> Result<()> {
        let suitability_json = serde_json::to_string(&profile.suitability)?;
        let loc = &profile.location;
        let stats = &profile.stats;
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT OR REPLACE INTO climate_profiles
                    (parcel_id, zone, latitude, longitude, altitude_m, distance_to_sea_km,
                     hemisphere, altitude_measured, dormancy_start, dormancy_end,
                     irrigation_factor, et_multiplier, pest_pressure_factor, frost_risk_factor,
                     suitability_score, suitability_json, confidence, tier,
                     avg_annual_temp, winter_temp, summer_temp, annual_rainfall_mm,
                     frost_days, hot_days, gdd, chilling_hours, annual_et0_mm, last_calculated)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                        ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28)
                "#,
                params![
                    profile.parcel_id.0,
                    profile.zone.as_str(),
                    loc.latitude,
                    loc.longitude,
                    loc.altitude_m,
                    loc.distance_to_sea_km,
                    loc.hemisphere.as_str(),
                    loc.altitude_measured,
                    profile.dormancy.start_month,
                    profile.dormancy.end_month,
                    profile.irrigation_factor,
                    profile.et_multiplier,
                    profile.pest_pressure_factor,
                    profile.frost_risk_factor,
                    profile.suitability_score,
                    suitability_json,
                    profile.confidence,
                    profile.tier.as_str(),
                    stats.avg_annual_temp,
                    stats.winter_temp,
                    stats.summer_temp,
                    stats.annual_rainfall_mm,
                    stats.frost_days,
                    stats.hot_days,
                    stats.gdd,
                    stats.chilling_hours,
                    stats.annual_et0_mm,
                    ts(&profile.last_calculated),
                ],
            )?;
            Ok(())
        })
    }

    // Soil and System Queries

    fn soil_profile(&self, parcel_id: ParcelId) -> Result<Option<SoilProfile>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM soil_profiles WHERE parcel_id = ?1",
                [parcel_id.0],
                row_to_soil_profile,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    fn upsert_soil_profile(&self, soil: &SoilProfile) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT OR REPLACE INTO soil_profiles
                    (parcel_id, texture, field_capacity, wilting_point, available_water_capacity,
                     root_depth_cm, infiltration_rate, slope_percent, organic_matter)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                params![
                    soil.parcel_id.0,
                    soil.texture.as_str(),
                    soil.field_capacity,
                    soil.wilting_point,
                    soil.available_water_capacity,
                    soil.root_depth_cm,
                    soil.infiltration_rate,
                    soil.slope_percent,
                    soil.organic_matter,
                ],
            )?;
            Ok(())
        })
    }

    fn irrigation_system(&self, parcel_id: ParcelId) -> Result<Option<IrrigationSystemSpec>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM irrigation_systems WHERE parcel_id = ?1",
                [parcel_id.0],
                row_to_irrigation_system,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    fn upsert_irrigation_system(&self, system: &IrrigationSystemSpec) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT OR REPLACE INTO irrigation_systems
                    (parcel_id, system_type, efficiency, flow_rate, emitter_spacing_cm, tree_spacing_m)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    system.parcel_id.0,
                    system.system_type.as_str(),
                    system.efficiency,
                    system.flow_rate,
                    system.emitter_spacing_cm,
                    system.tree_spacing_m,
                ],
            )?;
            Ok(())
        })
    }

    // Weather Queries

    fn latest_observation(&self, parcel_id: ParcelId) -> Result<Option<Observation>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM weather_observations WHERE parcel_id = ?1 ORDER BY observed_at DESC LIMIT 1",
                [parcel_id.0],
                row_to_observation,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    fn insert_observation(&self, parcel_id: ParcelId, observation: &Observation) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT OR REPLACE INTO weather_observations
                    (parcel_id, observed_at, fetched_at, temperature, humidity, precipitation,
                     wind_speed, wind_direction, cloud_cover, pressure, et0, rain_next_24h,
                     temp_min_24h, temp_max_24h)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                "#,
                params![
                    parcel_id.0,
                    ts(&observation.observed_at),
                    ts(&observation.fetched_at),
                    observation.temperature,
                    observation.humidity,
                    observation.precipitation,
                    observation.wind_speed,
                    observation.wind_direction,
                    observation.cloud_cover,
                    observation.pressure,
                    observation.et0,
                    observation.rain_next_24h,
                    observation.temp_min_24h,
                    observation.temp_max_24h,
                ],
            )?;
            let cutoff = observation.observed_at - chrono::Duration::days(OBSERVATION_RETENTION_DAYS);
            let pruned = conn.execute(
                "DELETE FROM weather_observations WHERE parcel_id = ?1 AND observed_at < ?2",
                params![parcel_id.0, ts(&cutoff)],
            )?;
            if pruned > 0 {
                tracing::debug!(parcel_id = %parcel_id, pruned, "Pruned old weather observations");
            }
            Ok(())
        })
    }

    fn observations_since(
        &self,
        parcel_id: ParcelId,
        since: DateTime<Utc>,
    ) -> Result<Vec<Observation>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM weather_observations WHERE parcel_id = ?1 AND observed_at >= ?2 ORDER BY observed_at",
            )?;
            let rows = stmt
                .query_map(params![parcel_id.0, ts(&since)], row_to_observation)?
                .filter_map(|r| r.ok())
                .collect();
            Ok(rows)
        })
    }

    fn daily_forecasts(&self, parcel_id: ParcelId) -> Result<Vec<DailyForecast>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM daily_forecasts WHERE parcel_id = ?1 ORDER BY days_ahead",
            )?;
            let rows = stmt
                .query_map([parcel_id.0], row_to_daily_forecast)?
                .filter_map(|r| r.ok())
                .collect();
            Ok(rows)
        })
    }

    fn replace_daily_forecasts(&self, parcel_id: ParcelId, days: &[DailyForecast]) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM daily_forecasts WHERE parcel_id = ?1", [parcel_id.0])?;
            for d in days {
                tx.execute(
                    r#"
                    INSERT OR REPLACE INTO daily_forecasts
                        (parcel_id, forecast_date, days_ahead, temp_min, temp_max, temp_avg,
                         precipitation_sum, precipitation_probability, humidity_min, humidity_max,
                         humidity_avg, wind_speed_max, wind_gust_max, et0, sunshine_hours,
                         uv_index_max, fetched_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
                    "#,
                    params![
                        parcel_id.0,
                        day(&d.date),
                        d.days_ahead,
                        d.temp_min,
                        d.temp_max,
                        d.temp_avg,
                        d.precipitation_sum,
                        d.precipitation_probability,
                        d.humidity_min,
                        d.humidity_max,
                        d.humidity_avg,
                        d.wind_speed_max,
                        d.wind_gust_max,
                        d.et0,
                        d.sunshine_hours,
                        d.uv_index_max,
                        ts(&d.fetched_at),
                    ],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    // Irrigation Recommendation Queries

    fn recommendation(
        &self,
        parcel_id: ParcelId,
        date: NaiveDate,
    ) -> Result<Option<IrrigationRecommendation>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM irrigation_recommendations WHERE parcel_id = ?1 AND calculation_date = ?2",
                params![parcel_id.0, day(&date)],
                row_to_recommendation,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    fn recommendation_before(
        &self,
        parcel_id: ParcelId,
        date: NaiveDate,
    ) -> Result<Option<IrrigationRecommendation>> {
        self.with_conn(|conn| {
            conn.query_row(
                r#"
                SELECT * FROM irrigation_recommendations
                WHERE parcel_id = ?1 AND calculation_date < ?2
                ORDER BY calculation_date DESC LIMIT 1
                "#,
                params![parcel_id.0, day(&date)],
                row_to_recommendation,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    fn latest_recommendation(
        &self,
        parcel_id: ParcelId,
    ) -> Result<Option<IrrigationRecommendation>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM irrigation_recommendations WHERE parcel_id = ?1 ORDER BY calculation_date DESC LIMIT 1",
                [parcel_id.0],
                row_to_recommendation,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    fn recommendations_between(
        &self,
        parcel_id: ParcelId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<IrrigationRecommendation>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT * FROM irrigation_recommendations
                WHERE parcel_id = ?1 AND calculation_date BETWEEN ?2 AND ?3
                ORDER BY calculation_date
                "#,
            )?;
            let rows = stmt
                .query_map(
                    params![parcel_id.0, day(&from), day(&to)],
                    row_to_recommendation,
                )?
                .filter_map(|r| r.ok())
                .collect();
            Ok(rows)
        })
    }

    fn upsert_recommendation(&self, rec: &IrrigationRecommendation) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO irrigation_recommendations
                    (parcel_id, calculation_date, et0, kc, etc, rainfall, effective_rainfall,
                     irrigation_applied, water_balance, cumulative_deficit, soil_moisture,
                     should_irrigate, recommended_amount_mm, recommended_liters_per_tree,
                     urgency, growth_stage, stress_level, next_irrigation_date, weather_forecast,
                     deficit_strategy, deficit_reduction_percent, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                        ?17, ?18, ?19, ?20, ?21, datetime('now'))
                ON CONFLICT(parcel_id, calculation_date) DO UPDATE SET
                    et0 = excluded.et0,
                    kc = excluded.kc,
                    etc = excluded.etc,
                    rainfall = excluded.rainfall,
                    effective_rainfall = excluded.effective_rainfall,
                    irrigation_applied = excluded.irrigation_applied,
                    water_balance = excluded.water_balance,
                    cumulative_deficit = excluded.cumulative_deficit,
                    soil_moisture = excluded.soil_moisture,
                    should_irrigate = excluded.should_irrigate,
                    recommended_amount_mm = excluded.recommended_amount_mm,
                    recommended_liters_per_tree = excluded.recommended_liters_per_tree,
                    urgency = excluded.urgency,
                    growth_stage = excluded.growth_stage,
                    stress_level = excluded.stress_level,
                    next_irrigation_date = excluded.next_irrigation_date,
                    weather_forecast = excluded.weather_forecast,
                    deficit_strategy = excluded.deficit_strategy,
                    deficit_reduction_percent = excluded.deficit_reduction_percent,
                    updated_at = excluded.updated_at
                "#,
                params![
                    rec.parcel_id.0,
                    day(&rec.calculation_date),
                    rec.et0,
                    rec.kc,
                    rec.etc,
                    rec.rainfall,
                    rec.effective_rainfall,
                    rec.irrigation_applied,
                    rec.water_balance,
                    rec.cumulative_deficit,
                    rec.soil_moisture,
                    rec.should_irrigate,
                    rec.recommended_amount_mm,
                    rec.recommended_liters_per_tree,
                    rec.urgency.as_str(),
                    rec.growth_stage.as_str(),
                    rec.stress_level.as_str(),
                    rec.next_irrigation_date.as_ref().map(day),
                    rec.weather_forecast,
                    rec.deficit_strategy.as_str(),
                    rec.deficit_reduction_percent,
                ],
            )?;
            Ok(())
        })
    }

    // Irrigation Event Queries

    fn append_irrigation_event(&self, event: &IrrigationEvent) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO irrigation_events
                    (parcel_id, event_date, water_amount_mm, duration_minutes, method,
                     water_source, flow_rate, cost, energy_kwh, notes, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
                params![
                    event.parcel_id.0,
                    day(&event.date),
                    event.water_amount_mm,
                    event.duration_minutes,
                    event.method.map(|m| m.as_str()),
                    event.water_source,
                    event.flow_rate,
                    event.cost,
                    event.energy_kwh,
                    event.notes,
                    ts(&event.created_at),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    fn irrigation_events_between(
        &self,
        parcel_id: ParcelId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<IrrigationEvent>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT * FROM irrigation_events
                WHERE parcel_id = ?1 AND event_date BETWEEN ?2 AND ?3
                ORDER BY event_date, id
                "#,
            )?;
            let rows = stmt
                .query_map(
                    params![parcel_id.0, day(&from), day(&to)],
                    row_to_irrigation_event,
                )?
                .filter_map(|r| r.ok())
                .collect();
            Ok(rows)
        })
    }

    // Pest Risk Queries

    fn upsert_pest_assessment(&self, a: &PestRiskAssessment) -> Result<()> {
        let plan_json = serde_json::to_string(&a.plan)?;
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO pest_risk_assessments
                    (parcel_id, pest_type, assessment_date, risk_score, risk_level, alert_message,
                     plan_json, temperature, humidity, precipitation, rain_next_24h, month,
                     calculated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                ON CONFLICT(parcel_id, pest_type, assessment_date) DO UPDATE SET
                    risk_score = excluded.risk_score,
                    risk_level = excluded.risk_level,
                    alert_message = excluded.alert_message,
                    plan_json = excluded.plan_json,
                    temperature = excluded.temperature,
                    humidity = excluded.humidity,
                    precipitation = excluded.precipitation,
                    rain_next_24h = excluded.rain_next_24h,
                    month = excluded.month,
                    calculated_at = excluded.calculated_at
                "#,
                params![
                    a.parcel_id.0,
                    a.pest_type.as_str(),
                    day(&a.date),
                    a.risk_score,
                    a.risk_level.as_str(),
                    a.alert_message,
                    plan_json,
                    a.inputs.temperature,
                    a.inputs.humidity,
                    a.inputs.precipitation,
                    a.inputs.rain_next_24h,
                    a.inputs.month,
                    ts(&a.calculated_at),
                ],
            )?;
            Ok(())
        })
    }

    fn pest_assessments_since(
        &self,
        parcel_id: ParcelId,
        pest_type: Option<PestType>,
        since: NaiveDate,
    ) -> Result<Vec<PestRiskAssessment>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT * FROM pest_risk_assessments
                WHERE parcel_id = ?1 AND assessment_date >= ?2
                  AND (?3 IS NULL OR pest_type = ?3)
                ORDER BY assessment_date DESC, pest_type
                "#,
            )?;
            let rows = stmt
                .query_map(
                    params![parcel_id.0, day(&since), pest_type.map(|p| p.as_str())],
                    row_to_pest_assessment,
                )?
                .filter_map(|r| r.ok())
                .collect();
            Ok(rows)
        })
    }

    fn forecast_predictions(&self, parcel_id: ParcelId) -> Result<Vec<ForecastRiskPrediction>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM forecast_risk_predictions WHERE parcel_id = ?1 ORDER BY pest_type, days_ahead",
            )?;
            let rows = stmt
                .query_map([parcel_id.0], row_to_prediction)?
                .filter_map(|r| r.ok())
                .collect();
            Ok(rows)
        })
    }

    fn replace_forecast_predictions(
        &self,
        parcel_id: ParcelId,
        predictions: &[ForecastRiskPrediction],
    ) -> Result<()> {
        let plans = predictions
            .iter()
            .map(|p| serde_json::to_string(&p.plan))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM forecast_risk_predictions WHERE parcel_id = ?1",
                [parcel_id.0],
            )?;
            for (p, plan_json) in predictions.iter().zip(&plans) {
                tx.execute(
                    r#"
                    INSERT OR REPLACE INTO forecast_risk_predictions
                        (parcel_id, pest_type, days_ahead, forecast_date, risk_score, risk_level,
                         trend, confidence, alert_message, plan_json, generated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                    "#,
                    params![
                        parcel_id.0,
                        p.pest_type.as_str(),
                        p.days_ahead,
                        day(&p.forecast_date),
                        p.risk_score,
                        p.risk_level.as_str(),
                        p.trend.as_str(),
                        p.confidence,
                        p.alert_message,
                        plan_json,
                        ts(&p.generated_at),
                    ],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }
}

trait OptionalExt<T> {
    fn optional(self) -> rusqlite::Result<Option<T>>;
}

impl<T> OptionalExt<T> for rusqlite::Result<T> {
    fn optional(self) -> rusqlite::Result<Option<T>> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::climate::{derive_location, profile_from_location};
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn recommendation(parcel: i64, on: NaiveDate, deficit: f64) -> IrrigationRecommendation {
        IrrigationRecommendation {
            parcel_id: ParcelId(parcel),
            calculation_date: on,
            et0: 5.5,
            kc: 0.75,
            etc: 4.125,
            rainfall: 0.0,
            effective_rainfall: 0.0,
            irrigation_applied: 0.0,
            water_balance: -4.125,
            cumulative_deficit: deficit,
            soil_moisture: 90.583_333_333,
            should_irrigate: false,
            recommended_amount_mm: 0.0,
            recommended_liters_per_tree: 0.0,
            urgency: Urgency::None,
            growth_stage: GrowthStage::FruitDevelopment,
            stress_level: StressLevel::None,
            next_irrigation_date: Some(on + chrono::Duration::days(15)),
            weather_forecast: "No significant rain forecasted".to_string(),
            deficit_strategy: DeficitStrategy::Regulated,
            deficit_reduction_percent: 0.0,
        }
    }

    fn row_count(db: &Database, table: &str) -> i64 {
        db.with_conn(|conn| {
            Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| {
                r.get(0)
            })?)
        })
        .unwrap()
    }

    #[test]
    fn recommendation_round_trip_and_upsert() {
        let db = Database::open_in_memory().unwrap();
        let on = date(2025, 6, 1);
        let rec = recommendation(7, on, 14.125);

        db.upsert_recommendation(&rec).unwrap();
        let loaded = db.recommendation(ParcelId(7), on).unwrap().unwrap();
        assert_eq!(loaded, rec);

        let mut again = rec.clone();
        again.cumulative_deficit = 20.0;
        db.upsert_recommendation(&again).unwrap();
        assert_eq!(row_count(&db, "irrigation_recommendations"), 1);
        assert_eq!(
            db.recommendation(ParcelId(7), on).unwrap().unwrap().cumulative_deficit,
            20.0
        );
    }

    #[test]
    fn recommendation_before_excludes_same_day() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_recommendation(&recommendation(1, date(2025, 6, 1), 10.0))
            .unwrap();
        db.upsert_recommendation(&recommendation(1, date(2025, 6, 2), 14.0))
            .unwrap();

        let prior = db
            .recommendation_before(ParcelId(1), date(2025, 6, 2))
            .unwrap()
            .unwrap();
        assert_eq!(prior.calculation_date, date(2025, 6, 1));
        let latest = db.latest_recommendation(ParcelId(1)).unwrap().unwrap();
        assert_eq!(latest.calculation_date, date(2025, 6, 2));
        assert!(db
            .recommendation_before(ParcelId(1), date(2025, 6, 1))
            .unwrap()
            .is_none());
    }

    #[test]
    fn climate_profile_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 8, 30, 15).unwrap();
        let mut geometry = ParcelGeometry::new(36.0, -5.4);
        geometry.altitude_m = Some(300.0);
        geometry.distance_to_sea_km = Some(15.0);
        let profile = profile_from_location(ParcelId(3), derive_location(&geometry), now);

        db.upsert_climate_profile(&profile).unwrap();
        let loaded = db.climate_profile(ParcelId(3)).unwrap().unwrap();
        assert_eq!(loaded, profile);
    }

    #[test]
    fn geometry_requires_coordinates() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_parcel(&Parcel {
            id: ParcelId(1),
            name: "North block".into(),
            geometry: Some(ParcelGeometry::new(37.9, 23.7)),
        })
        .unwrap();
        db.upsert_parcel(&Parcel {
            id: ParcelId(2),
            name: "Unsurveyed".into(),
            geometry: None,
        })
        .unwrap();

        assert_eq!(db.geometry(ParcelId(1)).unwrap().latitude, 37.9);
        assert!(matches!(
            db.geometry(ParcelId(2)),
            Err(OliveOpsError::LocationUnavailable(ParcelId(2)))
        ));
        assert!(matches!(
            db.geometry(ParcelId(3)),
            Err(OliveOpsError::LocationUnavailable(_))
        ));
        assert_eq!(db.list_parcels().unwrap().len(), 2);
    }

    #[test]
    fn irrigation_events_by_range() {
        let db = Database::open_in_memory().unwrap();
        let first = IrrigationEvent::new(ParcelId(1), date(2025, 6, 1), 8.0)
            .with_method(SystemType::Drip)
            .with_cost(12.5);
        let id = db.append_irrigation_event(&first).unwrap();
        db.append_irrigation_event(&IrrigationEvent::new(ParcelId(1), date(2025, 6, 20), 5.0))
            .unwrap();

        let events = db
            .irrigation_events_between(ParcelId(1), date(2025, 6, 1), date(2025, 6, 10))
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, Some(id));
        assert_eq!(events[0].method, Some(SystemType::Drip));
        assert_eq!(events[0].cost, Some(12.5));
        assert_eq!(events[0].created_at, first.created_at);
    }

    #[test]
    fn forecasts_are_replaced_wholesale() {
        let db = Database::open_in_memory().unwrap();
        let fetched = Utc.with_ymd_and_hms(2025, 6, 1, 6, 0, 0).unwrap();
        let make = |n: u32| -> Vec<DailyForecast> {
            (0..n)
                .map(|i| DailyForecast {
                    date: date(2025, 6, 1) + chrono::Duration::days(i as i64),
                    days_ahead: i,
                    temp_min: 15.0,
                    temp_max: 28.0,
                    temp_avg: 21.5,
                    precipitation_sum: 0.0,
                    precipitation_probability: 5.0,
                    humidity_min: 35.0,
                    humidity_max: 70.0,
                    humidity_avg: 52.5,
                    wind_speed_max: 14.0,
                    wind_gust_max: 25.0,
                    et0: 5.2,
                    sunshine_hours: 11.0,
                    uv_index_max: 8.0,
                    fetched_at: fetched,
                })
                .collect()
        };

        db.replace_daily_forecasts(ParcelId(1), &make(7)).unwrap();
        db.replace_daily_forecasts(ParcelId(1), &make(3)).unwrap();
        let stored = db.daily_forecasts(ParcelId(1)).unwrap();
        assert_eq!(stored, make(3));
    }

    #[test]
    fn old_observations_are_pruned() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let observation = |at: DateTime<Utc>| Observation {
            observed_at: at,
            fetched_at: at,
            temperature: 24.0,
            humidity: 55.0,
            precipitation: 0.0,
            wind_speed: 9.0,
            wind_direction: 180.0,
            cloud_cover: 10.0,
            pressure: 1015.0,
            et0: 5.1,
            rain_next_24h: 0.0,
            temp_min_24h: 17.0,
            temp_max_24h: 30.0,
        };
        let ancient = now - chrono::Duration::days(OBSERVATION_RETENTION_DAYS + 5);
        db.insert_observation(ParcelId(1), &observation(ancient)).unwrap();
        db.insert_observation(ParcelId(1), &observation(now - chrono::Duration::days(200)))
            .unwrap();
        db.insert_observation(ParcelId(1), &observation(now)).unwrap();

        let kept = db
            .observations_since(ParcelId(1), now - chrono::Duration::days(1000))
            .unwrap();
        assert_eq!(kept.len(), 2);
        assert_eq!(
            db.latest_observation(ParcelId(1)).unwrap().unwrap().observed_at,
            now
        );
    }

    #[test]
    fn pest_assessment_upserts_per_day() {
        let db = Database::open_in_memory().unwrap();
        let at = Utc.with_ymd_and_hms(2025, 10, 2, 9, 0, 0).unwrap();
        let mut a = PestRiskAssessment {
            parcel_id: ParcelId(1),
            pest_type: PestType::PeacockSpot,
            date: date(2025, 10, 2),
            risk_score: 60.0,
            risk_level: RiskLevel::High,
            alert_message: "High infection risk".into(),
            plan: TreatmentPlan::empty(RiskLevel::High).with_chemical(&["Copper"]),
            inputs: RiskInputs {
                temperature: 15.0,
                humidity: 85.0,
                precipitation: 2.0,
                rain_next_24h: 0.0,
                month: 10,
            },
            calculated_at: at,
        };
        db.upsert_pest_assessment(&a).unwrap();
        a.risk_score = 80.0;
        a.risk_level = RiskLevel::Critical;
        db.upsert_pest_assessment(&a).unwrap();

        let history = db
            .pest_assessments_since(ParcelId(1), Some(PestType::PeacockSpot), date(2025, 9, 1))
            .unwrap();
        assert_eq!(history, vec![a]);
        assert!(db
            .pest_assessments_since(ParcelId(1), Some(PestType::OliveFly), date(2025, 9, 1))
            .unwrap()
            .is_empty());
    }
}
