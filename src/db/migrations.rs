use crate::db::Database;
use crate::error::Result;

const MIGRATIONS: &[&str] = &[
    // Migration 1: Initial schema
    r#"
    CREATE TABLE IF NOT EXISTS parcels (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        latitude REAL,
        longitude REAL,
        altitude_m REAL,
        slope_percent REAL,
        distance_to_sea_km REAL,
        updated_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS climate_profiles (
        parcel_id INTEGER PRIMARY KEY,
        zone TEXT NOT NULL,
        latitude REAL NOT NULL,
        longitude REAL NOT NULL,
        altitude_m REAL NOT NULL,
        distance_to_sea_km REAL NOT NULL,
        hemisphere TEXT NOT NULL,
        altitude_measured INTEGER NOT NULL,
        dormancy_start INTEGER NOT NULL,
        dormancy_end INTEGER NOT NULL,
        irrigation_factor REAL NOT NULL,
        et_multiplier REAL NOT NULL,
        pest_pressure_factor REAL NOT NULL,
        frost_risk_factor REAL NOT NULL,
        suitability_score REAL NOT NULL,
        suitability_json TEXT NOT NULL,
        confidence REAL NOT NULL,
        tier TEXT NOT NULL,
        avg_annual_temp REAL NOT NULL,
        winter_temp REAL NOT NULL,
        summer_temp REAL NOT NULL,
        annual_rainfall_mm REAL NOT NULL,
        frost_days REAL NOT NULL,
        hot_days REAL NOT NULL,
        gdd REAL NOT NULL,
        chilling_hours REAL NOT NULL,
        annual_et0_mm REAL,
        last_calculated TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS soil_profiles (
        parcel_id INTEGER PRIMARY KEY,
        texture TEXT NOT NULL,
        field_capacity REAL NOT NULL,
        wilting_point REAL NOT NULL,
        available_water_capacity REAL NOT NULL,
        root_depth_cm REAL NOT NULL,
        infiltration_rate REAL NOT NULL,
        slope_percent REAL NOT NULL,
        organic_matter REAL NOT NULL
    );

    CREATE TABLE IF NOT EXISTS irrigation_systems (
        parcel_id INTEGER PRIMARY KEY,
        system_type TEXT NOT NULL,
        efficiency REAL NOT NULL,
        flow_rate REAL NOT NULL,
        emitter_spacing_cm REAL NOT NULL,
        tree_spacing_m REAL NOT NULL
    );

    CREATE TABLE IF NOT EXISTS weather_observations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        parcel_id INTEGER NOT NULL,
        observed_at TEXT NOT NULL,
        fetched_at TEXT NOT NULL,
        temperature REAL NOT NULL,
        humidity REAL NOT NULL,
        precipitation REAL NOT NULL,
        wind_speed REAL NOT NULL,
        wind_direction REAL NOT NULL,
        cloud_cover REAL NOT NULL,
        pressure REAL NOT NULL,
        et0 REAL NOT NULL,
        rain_next_24h REAL NOT NULL,
        temp_min_24h REAL NOT NULL,
        temp_max_24h REAL NOT NULL,
        UNIQUE(parcel_id, observed_at)
    );

    CREATE TABLE IF NOT EXISTS daily_forecasts (
        parcel_id INTEGER NOT NULL,
        forecast_date TEXT NOT NULL,
        days_ahead INTEGER NOT NULL,
        temp_min REAL NOT NULL,
        temp_max REAL NOT NULL,
        temp_avg REAL NOT NULL,
        precipitation_sum REAL NOT NULL,
        precipitation_probability REAL NOT NULL,
        humidity_min REAL NOT NULL,
        humidity_max REAL NOT NULL,
        humidity_avg REAL NOT NULL,
        wind_speed_max REAL NOT NULL,
        wind_gust_max REAL NOT NULL,
        et0 REAL NOT NULL,
        sunshine_hours REAL NOT NULL,
        uv_index_max REAL NOT NULL,
        fetched_at TEXT NOT NULL,
        PRIMARY KEY (parcel_id, forecast_date)
    );

    CREATE TABLE IF NOT EXISTS irrigation_recommendations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        parcel_id INTEGER NOT NULL,
        calculation_date TEXT NOT NULL,
        et0 REAL NOT NULL,
        kc REAL NOT NULL,
        etc REAL NOT NULL,
        rainfall REAL NOT NULL,
        effective_rainfall REAL NOT NULL,
        irrigation_applied REAL NOT NULL,
        water_balance REAL NOT NULL,
        cumulative_deficit REAL NOT NULL,
        soil_moisture REAL NOT NULL,
        should_irrigate INTEGER NOT NULL,
        recommended_amount_mm REAL NOT NULL,
        recommended_liters_per_tree REAL NOT NULL,
        urgency TEXT NOT NULL,
        growth_stage TEXT NOT NULL,
        stress_level TEXT NOT NULL,
        next_irrigation_date TEXT,
        weather_forecast TEXT NOT NULL,
        deficit_strategy TEXT NOT NULL,
        deficit_reduction_percent REAL NOT NULL,
        updated_at TEXT NOT NULL DEFAULT (datetime('now')),
        UNIQUE(parcel_id, calculation_date)
    );

    CREATE TABLE IF NOT EXISTS irrigation_events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        parcel_id INTEGER NOT NULL,
        event_date TEXT NOT NULL,
        water_amount_mm REAL NOT NULL,
        duration_minutes REAL,
        method TEXT,
        water_source TEXT,
        flow_rate REAL,
        cost REAL,
        energy_kwh REAL,
        notes TEXT,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS pest_risk_assessments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        parcel_id INTEGER NOT NULL,
        pest_type TEXT NOT NULL,
        assessment_date TEXT NOT NULL,
        risk_score REAL NOT NULL,
        risk_level TEXT NOT NULL,
        alert_message TEXT NOT NULL,
        plan_json TEXT NOT NULL,
        temperature REAL NOT NULL,
        humidity REAL NOT NULL,
        precipitation REAL NOT NULL,
        rain_next_24h REAL NOT NULL,
        month INTEGER NOT NULL,
        calculated_at TEXT NOT NULL,
        UNIQUE(parcel_id, pest_type, assessment_date)
    );

    CREATE TABLE IF NOT EXISTS forecast_risk_predictions (
        parcel_id INTEGER NOT NULL,
        pest_type TEXT NOT NULL,
        days_ahead INTEGER NOT NULL,
        forecast_date TEXT NOT NULL,
        risk_score REAL NOT NULL,
        risk_level TEXT NOT NULL,
        trend TEXT NOT NULL,
        confidence REAL NOT NULL,
        alert_message TEXT NOT NULL,
        plan_json TEXT NOT NULL,
        generated_at TEXT NOT NULL,
        PRIMARY KEY (parcel_id, pest_type, days_ahead)
    );

    CREATE TABLE IF NOT EXISTS schema_migrations (
        version INTEGER PRIMARY KEY,
        applied_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
    "#,
    // Migration 2: Add indexes
    r#"
    CREATE INDEX IF NOT EXISTS idx_observations_parcel_time
        ON weather_observations(parcel_id, observed_at);
    CREATE INDEX IF NOT EXISTS idx_recommendations_parcel_date
        ON irrigation_recommendations(parcel_id, calculation_date);
    CREATE INDEX IF NOT EXISTS idx_irrigation_events_parcel_date
        ON irrigation_events(parcel_id, event_date);
    CREATE INDEX IF NOT EXISTS idx_pest_assessments_parcel_date
        ON pest_risk_assessments(parcel_id, assessment_date);
    "#,
];

pub fn run(db: &Database) -> Result<()> {
    db.with_conn_mut(|conn| {
        // Ensure schema_migrations table exists
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        )?;

        let current_version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            let version = (i + 1) as i32;
            if version > current_version {
                tracing::info!("Applying migration {}", version);
                let tx = conn.transaction()?;
                tx.execute_batch(migration)?;
                tx.execute(
                    "INSERT INTO schema_migrations (version) VALUES (?1)",
                    [version],
                )?;
                tx.commit()?;
            }
        }

        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let db = Database::open_in_memory().unwrap();
        run(&db).unwrap();
        let version: i32 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT MAX(version) FROM schema_migrations", [], |r| {
                    r.get(0)
                })?)
            })
            .unwrap();
        assert_eq!(version, MIGRATIONS.len() as i32);
    }
}
