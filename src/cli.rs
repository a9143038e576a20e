use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "oliveops", version, about = "Olive grove weather advisory engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config.yaml
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override SQLite data directory
    #[arg(short, long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Re-run interactive setup
    Init,
    /// Validate config and test the weather provider
    Check,
    /// Fetch current weather and forecast for a parcel
    Refresh { parcel: i64 },
    /// Show the parcel's climate profile
    Climate { parcel: i64 },
    /// Compute the daily irrigation recommendation
    Irrigate {
        parcel: i64,
        /// Calculation date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Record an irrigation that was applied
    LogIrrigation {
        parcel: i64,
        /// Applied water depth in mm
        #[arg(long)]
        mm: f64,
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Duration in minutes
        #[arg(long)]
        duration: Option<f64>,
        /// drip, micro_sprinkler, sprinkler or subsurface
        #[arg(long)]
        method: Option<String>,
        #[arg(long)]
        cost: Option<f64>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Irrigation events and water usage over the last days
    History {
        parcel: i64,
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
    /// Classified field conditions for today and the forecast days
    Conditions { parcel: i64 },
    /// Current pest risk
    Pests {
        parcel: i64,
        /// Show stored assessments for the last N days instead
        #[arg(long)]
        history: Option<u32>,
    },
    /// Pest risk over the forecast horizon
    ForecastRisk { parcel: i64 },
    /// Full weather advisory
    Advisory { parcel: i64 },
    /// Whether irrigation should run today
    ShouldIrrigate { parcel: i64 },
    /// Whether a spray can go on today
    ShouldSpray { parcel: i64 },
    /// Best treatment day in the coming days
    Window {
        parcel: i64,
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
}

impl Commands {
    /// Commands that read the stored forecast and benefit from a refresh first.
    pub fn wants_weather(&self) -> bool {
        matches!(
            self,
            Commands::Irrigate { .. }
                | Commands::Conditions { .. }
                | Commands::Pests { history: None, .. }
                | Commands::ForecastRisk { .. }
                | Commands::Advisory { .. }
                | Commands::ShouldIrrigate { .. }
                | Commands::ShouldSpray { .. }
                | Commands::Window { .. }
        )
    }

    pub fn parcel(&self) -> Option<i64> {
        match self {
            Commands::Init | Commands::Check => None,
            Commands::Refresh { parcel }
            | Commands::Climate { parcel }
            | Commands::Irrigate { parcel, .. }
            | Commands::LogIrrigation { parcel, .. }
            | Commands::History { parcel, .. }
            | Commands::Conditions { parcel }
            | Commands::Pests { parcel, .. }
            | Commands::ForecastRisk { parcel }
            | Commands::Advisory { parcel }
            | Commands::ShouldIrrigate { parcel }
            | Commands::ShouldSpray { parcel }
            | Commands::Window { parcel, .. } => Some(*parcel),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_log_irrigation() {
        let cli = Cli::parse_from([
            "oliveops",
            "log-irrigation",
            "3",
            "--mm",
            "12.5",
            "--date",
            "2025-07-01",
            "--method",
            "drip",
        ]);
        match cli.command {
            Commands::LogIrrigation {
                parcel, mm, date, method, ..
            } => {
                assert_eq!(parcel, 3);
                assert_eq!(mm, 12.5);
                assert_eq!(date, NaiveDate::from_ymd_opt(2025, 7, 1));
                assert_eq!(method.as_deref(), Some("drip"));
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn weather_refresh_only_for_forecast_readers() {
        let cli = Cli::parse_from(["oliveops", "-vv", "advisory", "1"]);
        assert_eq!(cli.verbose, 2);
        assert!(cli.command.wants_weather());
        assert_eq!(cli.command.parcel(), Some(1));

        let cli = Cli::parse_from(["oliveops", "pests", "1", "--history", "14"]);
        assert!(!cli.command.wants_weather());

        let cli = Cli::parse_from(["oliveops", "check"]);
        assert!(!cli.command.wants_weather());
        assert_eq!(cli.command.parcel(), None);
    }
}
