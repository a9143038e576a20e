//! Agronomic thresholds shared by the day classifier, the irrigation engine,
//! the pest scorer and the advisory coordinator.

// Precipitation (mm/day)
pub const PRECIP_LIGHT: f64 = 1.0;
pub const PRECIP_MODERATE: f64 = 5.0;
pub const PRECIP_HEAVY: f64 = 10.0;
pub const PRECIP_EXTREME: f64 = 20.0;

// Wind (km/h)
pub const WIND_STRONG: f64 = 20.0;
pub const WIND_GALE: f64 = 40.0;

// Temperature (°C)
pub const TEMP_FROST: f64 = 0.0;
pub const TEMP_COLD: f64 = 5.0;
pub const TEMP_SPRAY_MIN: f64 = 10.0;
pub const TEMP_SPRAY_MAX: f64 = 30.0;
pub const TEMP_PEST_MIN: f64 = 15.0;
pub const TEMP_PEST_MAX: f64 = 30.0;
pub const TEMP_DISEASE_MAX: f64 = 25.0;
pub const TEMP_EXTREME: f64 = 40.0;

// Relative humidity (%)
pub const HUMIDITY_OPT_MIN: f64 = 50.0;
pub const HUMIDITY_HIGH: f64 = 85.0;
pub const HUMIDITY_VERY_HIGH: f64 = 90.0;

/// Sunshine needed for a spray deposit to dry (hours).
pub const TREAT_WINDOW_SUNSHINE_HOURS: f64 = 4.0;
pub const IRRIGATION_MAX_RAIN_PROBABILITY: f64 = 50.0;
/// ET0 above which irrigation demand is flagged (mm/day).
pub const ET0_HIGH_DEMAND: f64 = 5.0;
/// Minimum adjusted ET0 for a day to be picked as best irrigation day.
pub const ET0_BEST_IRRIGATE: f64 = 3.0;

/// Forecast rain that holds back an irrigation trigger (mm).
pub const IRRIGATION_RAIN_GATE: f64 = PRECIP_MODERATE;
pub const MAX_IRRIGATION_MM: f64 = 15.0;

pub const ADVISORY_TREATMENT_DAYS: u32 = 3;
pub const ADVISORY_IRRIGATION_DAYS: u32 = 2;
pub const ADVISORY_DISEASE_DAYS: u32 = 3;
pub const ADVISORY_PEST_DAYS: u32 = 3;
