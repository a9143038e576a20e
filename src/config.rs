use crate::error::{OliveOpsError, Result};
use crate::logic::EngineSettings;
use crate::models::{
    DeficitStrategy, IrrigationSystemSpec, Parcel, ParcelGeometry, ParcelId, SoilProfile,
    SoilTexture, SystemType,
};
use dialoguer::{Input, Select};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub irrigation: IrrigationConfig,
    #[serde(default)]
    pub parcels: Vec<ParcelConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub forecast_url: String,
    pub archive_url: String,
    pub request_timeout_secs: u64,
    pub archive_timeout_secs: u64,
    pub archive_years: u32,
    /// Stored forecasts younger than this are not re-fetched.
    pub staleness_minutes: i64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            forecast_url: "https://api.open-meteo.com/v1/forecast".into(),
            archive_url: "https://archive-api.open-meteo.com/v1/archive".into(),
            request_timeout_secs: 10,
            archive_timeout_secs: 30,
            archive_years: 5,
            staleness_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct IrrigationConfig {
    /// none, regulated or sustained
    pub deficit_strategy: Option<String>,
    pub water_cost_per_m3: Option<f64>,
    pub soil: SoilConfig,
    pub system: SystemConfig,
}

/// Overrides applied to the Mediterranean clay-loam preset.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SoilConfig {
    pub texture: Option<String>,
    pub field_capacity: Option<f64>,
    pub wilting_point: Option<f64>,
    pub available_water_capacity: Option<f64>,
    pub root_depth_cm: Option<f64>,
    pub infiltration_rate: Option<f64>,
    pub slope_percent: Option<f64>,
    pub organic_matter: Option<f64>,
}

/// Overrides applied to the drip preset.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemConfig {
    pub system_type: Option<String>,
    pub efficiency: Option<f64>,
    pub flow_rate: Option<f64>,
    pub emitter_spacing_cm: Option<f64>,
    pub tree_spacing_m: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ParcelConfig {
    pub id: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slope_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_to_sea_km: Option<f64>,
}

impl ParcelConfig {
    pub fn to_parcel(&self) -> Parcel {
        Parcel {
            id: ParcelId(self.id),
            name: self.name.clone(),
            geometry: Some(ParcelGeometry {
                latitude: self.latitude,
                longitude: self.longitude,
                altitude_m: self.altitude_m,
                slope_percent: self.slope_percent,
                distance_to_sea_km: self.distance_to_sea_km,
            }),
        }
    }
}

fn input_error(e: dialoguer::Error) -> OliveOpsError {
    OliveOpsError::Config(format!("Input error: {}", e))
}

impl Config {
    pub fn load(config_override: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_override {
            Some(p) => p,
            None => Self::find_config_path()?,
        };

        if !config_path.exists() {
            return Err(OliveOpsError::Config(format!(
                "Config file not found at {:?}. Run `oliveops init` to set up.",
                config_path
            )));
        }

        let config_str = std::fs::read_to_string(&config_path)
            .map_err(|e| OliveOpsError::Config(format!("Failed to read config: {}", e)))?;

        Self::from_yaml(&config_str)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // Substitute environment variables
        let content = Self::substitute_env_vars(content);

        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| OliveOpsError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Search for config.yaml in standard locations.
    /// Returns the path of the first found config, or the XDG default path if none found.
    fn find_config_path() -> Result<PathBuf> {
        let local_config = PathBuf::from("config/config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join("oliveops").join("config.yaml");
            if xdg_config.exists() {
                return Ok(xdg_config);
            }
        }

        Self::default_config_path()
    }

    /// Returns true if a config file can be found in any standard location.
    pub fn exists(config_override: Option<&PathBuf>) -> bool {
        match config_override {
            Some(p) => p.exists(),
            None => Self::find_config_path()
                .map(|p| p.exists())
                .unwrap_or(false),
        }
    }

    /// Default path for writing new config files (~/.config/oliveops/config.yaml).
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| OliveOpsError::Config("Cannot determine config directory".into()))?
            .join("oliveops");
        Ok(config_dir.join("config.yaml"))
    }

    pub fn validate(&self) -> Result<()> {
        let w = &self.weather;
        if w.request_timeout_secs == 0 || w.archive_timeout_secs == 0 {
            return Err(OliveOpsError::Config("weather timeouts must be positive".into()));
        }
        if !(1..=30).contains(&w.archive_years) {
            return Err(OliveOpsError::Config(format!(
                "archive_years must be between 1 and 30, got {}",
                w.archive_years
            )));
        }
        if w.staleness_minutes < 0 {
            return Err(OliveOpsError::Config("staleness_minutes must not be negative".into()));
        }

        let mut seen = HashSet::new();
        for p in &self.parcels {
            if !seen.insert(p.id) {
                return Err(OliveOpsError::Config(format!("duplicate parcel id {}", p.id)));
            }
            if !(-90.0..=90.0).contains(&p.latitude) || !(-180.0..=180.0).contains(&p.longitude) {
                return Err(OliveOpsError::Config(format!(
                    "parcel {} has invalid coordinates ({}, {})",
                    p.id, p.latitude, p.longitude
                )));
            }
        }

        self.engine_settings().map(|_| ())
    }

    pub fn engine_settings(&self) -> Result<EngineSettings> {
        let irrigation = &self.irrigation;
        let deficit_strategy = match irrigation.deficit_strategy.as_deref() {
            None => DeficitStrategy::None,
            Some(s) => DeficitStrategy::from_str(s).ok_or_else(|| {
                OliveOpsError::Config(format!("unknown deficit strategy '{}'", s))
            })?,
        };

        let mut soil = SoilProfile::mediterranean_default(ParcelId(0));
        let sc = &irrigation.soil;
        if let Some(t) = &sc.texture {
            soil.texture = SoilTexture::from_str(t)
                .ok_or_else(|| OliveOpsError::Config(format!("unknown soil texture '{}'", t)))?;
        }
        soil.field_capacity = sc.field_capacity.unwrap_or(soil.field_capacity);
        soil.wilting_point = sc.wilting_point.unwrap_or(soil.wilting_point);
        soil.available_water_capacity = sc
            .available_water_capacity
            .unwrap_or(soil.available_water_capacity);
        soil.root_depth_cm = sc.root_depth_cm.unwrap_or(soil.root_depth_cm);
        soil.infiltration_rate = sc.infiltration_rate.unwrap_or(soil.infiltration_rate);
        soil.slope_percent = sc.slope_percent.unwrap_or(soil.slope_percent);
        soil.organic_matter = sc.organic_matter.unwrap_or(soil.organic_matter);
        if soil.available_water_capacity <= 0.0 {
            return Err(OliveOpsError::Config(
                "available_water_capacity must be positive".into(),
            ));
        }

        let mut system = IrrigationSystemSpec::drip_default(ParcelId(0));
        let yc = &irrigation.system;
        if let Some(t) = &yc.system_type {
            system.system_type = SystemType::from_str(t)
                .ok_or_else(|| OliveOpsError::Config(format!("unknown irrigation system '{}'", t)))?;
        }
        system.efficiency = yc.efficiency.unwrap_or(system.efficiency);
        system.flow_rate = yc.flow_rate.unwrap_or(system.flow_rate);
        system.emitter_spacing_cm = yc.emitter_spacing_cm.unwrap_or(system.emitter_spacing_cm);
        system.tree_spacing_m = yc.tree_spacing_m.unwrap_or(system.tree_spacing_m);
        if !(system.efficiency > 0.0 && system.efficiency <= 100.0) {
            return Err(OliveOpsError::Config(format!(
                "irrigation efficiency must be in (0, 100], got {}",
                system.efficiency
            )));
        }

        Ok(EngineSettings {
            forecast_staleness: chrono::Duration::minutes(self.weather.staleness_minutes),
            archive_years: self.weather.archive_years,
            deficit_strategy,
            water_cost_per_m3: irrigation.water_cost_per_m3,
            soil_preset: soil,
            system_preset: system,
        })
    }

    /// Run interactive setup prompts and write config to disk.
    /// Returns the loaded Config and the path it was written to.
    pub fn setup_interactive() -> Result<(Self, PathBuf)> {
        println!();
        println!("Let's set up OliveOps!");
        println!();

        // --- First parcel ---
        println!("Parcel");
        let name: String = Input::new()
            .with_prompt("  Parcel name")
            .default("North Grove".into())
            .interact_text()
            .map_err(input_error)?;

        let latitude: f64 = Input::new()
            .with_prompt("  Latitude")
            .default(37.88)
            .interact_text()
            .map_err(input_error)?;

        let longitude: f64 = Input::new()
            .with_prompt("  Longitude")
            .default(-4.78)
            .interact_text()
            .map_err(input_error)?;

        let altitude: String = Input::new()
            .with_prompt("  Altitude in meters (blank to estimate)")
            .default(String::new())
            .allow_empty(true)
            .interact_text()
            .map_err(input_error)?;
        let altitude_m = if altitude.trim().is_empty() {
            None
        } else {
            Some(altitude.trim().parse::<f64>().map_err(|e| {
                OliveOpsError::Config(format!("Invalid altitude '{}': {}", altitude, e))
            })?)
        };

        println!();

        // --- Irrigation ---
        println!("Irrigation");
        let strategies = ["none", "regulated", "sustained"];
        let strategy = Select::new()
            .with_prompt("  Deficit strategy")
            .items(&strategies)
            .default(0)
            .interact()
            .map_err(input_error)?;

        let tree_spacing_m: f64 = Input::new()
            .with_prompt("  Tree spacing (m)")
            .default(6.0)
            .interact_text()
            .map_err(input_error)?;

        println!();

        let config = Config {
            weather: WeatherConfig::default(),
            irrigation: IrrigationConfig {
                deficit_strategy: Some(strategies[strategy].to_string()),
                water_cost_per_m3: None,
                soil: SoilConfig::default(),
                system: SystemConfig {
                    tree_spacing_m: Some(tree_spacing_m),
                    ..SystemConfig::default()
                },
            },
            parcels: vec![ParcelConfig {
                id: 1,
                name,
                latitude,
                longitude,
                altitude_m,
                slope_percent: None,
                distance_to_sea_km: None,
            }],
        };
        config.validate()?;

        // Write to default config path
        let config_path = Self::default_config_path()?;
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let yaml = serde_yaml::to_string(&config)
            .map_err(|e| OliveOpsError::Config(format!("Failed to serialize config: {}", e)))?;

        let content = format!(
            "# OliveOps Configuration\n# Generated by `oliveops init`\n# Environment variable substitution (${{VAR}}) is supported.\n\n{}",
            yaml
        );
        std::fs::write(&config_path, content)?;

        println!("Configuration saved to {}", config_path.display());
        println!();

        Ok((config, config_path))
    }

    fn substitute_env_vars(content: &str) -> String {
        let mut result = content.to_string();

        // Find all ${VAR_NAME} patterns and substitute
        let re = match regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}") {
            Ok(re) => re,
            Err(_) => return result,
        };

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let placeholder = &cap[0];
            if let Ok(value) = std::env::var(var_name) {
                result = result.replace(placeholder, &value);
            }
        }

        result
    }

    pub fn data_dir(data_dir_override: Option<&PathBuf>) -> Result<PathBuf> {
        // CLI override takes priority
        if let Some(dir) = data_dir_override {
            std::fs::create_dir_all(dir)?;
            return Ok(dir.clone());
        }

        // Then check env var
        if let Ok(dir) = std::env::var("OLIVEOPS_DATA_DIR") {
            let p = PathBuf::from(dir);
            std::fs::create_dir_all(&p)?;
            return Ok(p);
        }

        // Use XDG data directory
        let data_dir = dirs::data_dir()
            .ok_or_else(|| OliveOpsError::Config("Cannot determine data directory".into()))?
            .join("oliveops");

        std::fs::create_dir_all(&data_dir)?;
        Ok(data_dir)
    }

    pub fn db_path(data_dir_override: Option<&PathBuf>) -> Result<PathBuf> {
        Ok(Self::data_dir(data_dir_override)?.join("oliveops.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
weather:
  staleness_minutes: 30
irrigation:
  deficit_strategy: regulated
  water_cost_per_m3: 0.35
  soil:
    texture: loam
    available_water_capacity: 120
  system:
    tree_spacing_m: 7
parcels:
  - id: 1
    name: North Grove
    latitude: 37.88
    longitude: -4.78
    altitude_m: 120
  - id: 2
    name: Hill Block
    latitude: 37.91
    longitude: -4.70
"#;

    #[test]
    fn parses_sample_and_fills_defaults() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.weather.staleness_minutes, 30);
        assert_eq!(config.weather.request_timeout_secs, 10);
        assert_eq!(config.weather.archive_years, 5);
        assert_eq!(config.parcels.len(), 2);
        assert_eq!(config.parcels[1].altitude_m, None);

        let parcel = config.parcels[0].to_parcel();
        assert_eq!(parcel.id, ParcelId(1));
        assert_eq!(parcel.geometry.unwrap().altitude_m, Some(120.0));
    }

    #[test]
    fn settings_apply_overrides() {
        let settings = Config::from_yaml(SAMPLE).unwrap().engine_settings().unwrap();
        assert_eq!(settings.deficit_strategy, DeficitStrategy::Regulated);
        assert_eq!(settings.forecast_staleness, chrono::Duration::minutes(30));
        assert_eq!(settings.water_cost_per_m3, Some(0.35));
        assert_eq!(settings.soil_preset.texture, SoilTexture::Loam);
        assert_eq!(settings.soil_preset.available_water_capacity, 120.0);
        assert_eq!(settings.soil_preset.root_depth_cm, 120.0);
        assert_eq!(settings.system_preset.tree_spacing_m, 7.0);
        assert_eq!(settings.system_preset.efficiency, 90.0);
    }

    #[test]
    fn empty_config_uses_open_meteo() {
        let config = Config::from_yaml("{}").unwrap();
        assert!(config.weather.forecast_url.contains("api.open-meteo.com"));
        assert!(config.weather.archive_url.contains("archive-api.open-meteo.com"));
        assert!(config.parcels.is_empty());
        assert_eq!(
            config.engine_settings().unwrap().deficit_strategy,
            DeficitStrategy::None
        );
    }

    #[test]
    fn rejects_bad_values() {
        let dup = "parcels:\n  - {id: 1, name: a, latitude: 1, longitude: 1}\n  - {id: 1, name: b, latitude: 2, longitude: 2}\n";
        assert!(Config::from_yaml(dup).is_err());
        assert!(Config::from_yaml("parcels:\n  - {id: 1, name: a, latitude: 95, longitude: 1}\n").is_err());
        assert!(Config::from_yaml("irrigation:\n  deficit_strategy: extreme\n").is_err());
        assert!(Config::from_yaml("irrigation:\n  system:\n    efficiency: 0\n").is_err());
        assert!(Config::from_yaml("weather:\n  archive_years: 0\n").is_err());
    }

    #[test]
    fn substitutes_environment_variables() {
        std::env::set_var("OLIVEOPS_TEST_FORECAST_URL", "http://localhost:9000/forecast");
        let yaml = "weather:\n  forecast_url: ${OLIVEOPS_TEST_FORECAST_URL}\n  archive_url: ${OLIVEOPS_TEST_UNSET_VAR}\n";
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.weather.forecast_url, "http://localhost:9000/forecast");
        assert_eq!(config.weather.archive_url, "${OLIVEOPS_TEST_UNSET_VAR}");
    }
}
