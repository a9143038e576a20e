use anyhow::{bail, Context};
use chrono::{Duration, Utc};
use clap::Parser;
use oliveops::cli::{Cli, Commands};
use oliveops::config::Config;
use oliveops::datasources::OpenMeteoClient;
use oliveops::db::Database;
use oliveops::error::OliveOpsError;
use oliveops::logic::AdvisoryEngine;
use oliveops::models::{IrrigationEvent, ParcelId, SystemType};
use oliveops::ports::WeatherProvider;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Initialize logging
    let default_level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Init = cli.command {
        Config::setup_interactive()?;
        return Ok(());
    }

    // Load configuration
    let config = if Config::exists(cli.config.as_ref()) {
        Config::load(cli.config.clone())?
    } else {
        eprintln!("No configuration found.");
        Config::setup_interactive()?.0
    };

    // Initialize database
    let db_path = Config::db_path(cli.data_dir.as_ref())?;
    let db = Arc::new(
        Database::open(&db_path)
            .with_context(|| format!("opening database at {}", db_path.display()))?,
    );
    for parcel in &config.parcels {
        db.upsert_parcel(&parcel.to_parcel())?;
    }

    let client = Arc::new(OpenMeteoClient::new(config.weather.clone())?);
    let engine = AdvisoryEngine::new(
        db.clone(),
        db.clone(),
        client.clone(),
        client.clone(),
        config.engine_settings()?,
    );

    if let Some(parcel) = cli.command.parcel() {
        if db.get_parcel(ParcelId(parcel))?.is_none() {
            return Err(OliveOpsError::NotFound(format!(
                "parcel {} is not registered; add it to the config",
                parcel
            ))
            .into());
        }
        if cli.command.wants_weather() {
            // Best effort: stale or missing data is reported by the command itself.
            if let Err(e) = engine.refresh_weather(ParcelId(parcel)).await {
                warn!(parcel_id = parcel, error = %e, "Weather refresh failed");
            }
        }
    }

    let today = Utc::now().date_naive();
    match cli.command {
        Commands::Init => {}
        Commands::Check => check(&config, &db, client.as_ref()).await?,
        Commands::Refresh { parcel } => print_json(&engine.refresh_weather(ParcelId(parcel)).await?)?,
        Commands::Climate { parcel } => {
            let id = ParcelId(parcel);
            let mut profile = engine.get_or_create_climate_profile(id)?;
            if engine.upgrade_pending(id) {
                info!(parcel_id = parcel, "Waiting for climate history");
                let deadline = std::time::Instant::now()
                    + std::time::Duration::from_secs(config.weather.archive_timeout_secs + 5);
                while engine.upgrade_pending(id) && std::time::Instant::now() < deadline {
                    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
                }
                profile = engine.get_or_create_climate_profile(id)?;
            }
            print_json(&profile)?
        }
        Commands::Irrigate { parcel, date } => print_json(
            &engine.calculate_irrigation_recommendation(ParcelId(parcel), date.unwrap_or(today))?,
        )?,
        Commands::LogIrrigation {
            parcel,
            mm,
            date,
            duration,
            method,
            cost,
            notes,
        } => {
            let mut event = IrrigationEvent::new(ParcelId(parcel), date.unwrap_or(today), mm);
            if let Some(m) = method {
                let Some(system) = SystemType::from_str(&m) else {
                    bail!("unknown irrigation method '{}'", m);
                };
                event = event.with_method(system);
            }
            if let Some(d) = duration {
                event = event.with_duration(d);
            }
            if let Some(c) = cost {
                event = event.with_cost(c);
            }
            if let Some(n) = notes {
                event = event.with_notes(n);
            }
            print_json(&engine.log_irrigation_event(event)?)?
        }
        Commands::History { parcel, days } => {
            let from = today - Duration::days(days as i64);
            let id = ParcelId(parcel);
            print_json(&serde_json::json!({
                "events": engine.get_irrigation_history(id, from, today)?,
                "usage": engine.get_water_usage_stats(id, from, today)?,
            }))?
        }
        Commands::Conditions { parcel } => {
            print_json(&engine.field_conditions(ParcelId(parcel))?)?
        }
        Commands::Pests { parcel, history } => match history {
            Some(days) => print_json(&engine.get_pest_risk_history(ParcelId(parcel), None, days)?)?,
            None => print_json(&engine.calculate_current_pest_risk(ParcelId(parcel))?)?,
        },
        Commands::ForecastRisk { parcel } => {
            print_json(&engine.get_or_refresh_forecast_risk(ParcelId(parcel))?)?
        }
        Commands::Advisory { parcel } => {
            print_json(&engine.generate_weather_advisory(ParcelId(parcel))?)?
        }
        Commands::ShouldIrrigate { parcel } => {
            print_json(&engine.should_irrigate_now(ParcelId(parcel))?)?
        }
        Commands::ShouldSpray { parcel } => print_json(&engine.should_spray_now(ParcelId(parcel))?)?,
        Commands::Window { parcel, days } => {
            print_json(&engine.best_treatment_window(ParcelId(parcel), days)?)?
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn check(
    config: &Config,
    db: &Database,
    weather: &dyn WeatherProvider,
) -> anyhow::Result<()> {
    config.validate()?;
    println!("Config:   OK ({} parcels)", config.parcels.len());
    println!(
        "Database: {} ({} parcels registered)",
        db.path().display(),
        db.list_parcels()?.len()
    );

    let Some(parcel) = config.parcels.first() else {
        println!("Weather:  SKIPPED (no parcels configured)");
        return Ok(());
    };
    match weather
        .current_and_forecast(parcel.latitude, parcel.longitude)
        .await
    {
        Ok(report) => println!("Weather:  OK ({} forecast days)", report.daily.len()),
        Err(e) => println!("Weather:  OFFLINE ({})", e),
    }
    Ok(())
}
