use super::ParcelId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hemisphere {
    Northern,
    Southern,
}

impl Hemisphere {
    pub fn from_latitude(latitude: f64) -> Self {
        if latitude >= 0.0 {
            Hemisphere::Northern
        } else {
            Hemisphere::Southern
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Hemisphere::Northern => "northern",
            Hemisphere::Southern => "southern",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "northern" | "north" | "n" => Some(Hemisphere::Northern),
            "southern" | "south" | "s" => Some(Hemisphere::Southern),
            _ => None,
        }
    }

    pub fn is_northern(&self) -> bool {
        matches!(self, Hemisphere::Northern)
    }

    /// Maps a calendar month onto the northern-hemisphere seasonal calendar.
    /// Southern months are shifted by six (January behaves like July).
    pub fn season_month(&self, month: u32) -> u32 {
        match self {
            Hemisphere::Northern => month,
            Hemisphere::Southern => ((month + 5) % 12) + 1,
        }
    }
}

impl std::fmt::Display for Hemisphere {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Raw geometry as supplied by the parcel registry. Missing fields are
/// estimated when the location is derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParcelGeometry {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_m: Option<f64>,
    pub slope_percent: Option<f64>,
    pub distance_to_sea_km: Option<f64>,
}

impl ParcelGeometry {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude_m: None,
            slope_percent: None,
            distance_to_sea_km: None,
        }
    }
}

/// A registered grove block. Geometry may be missing for parcels that were
/// created before they were surveyed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parcel {
    pub id: ParcelId,
    pub name: String,
    pub geometry: Option<ParcelGeometry>,
}

/// Location facts the climate resolver works from. Read-only once derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParcelLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_m: f64,
    pub distance_to_sea_km: f64,
    pub hemisphere: Hemisphere,
    /// False when altitude had to be estimated from coordinates.
    pub altitude_measured: bool,
}

impl ParcelLocation {
    pub fn abs_latitude(&self) -> f64 {
        self.latitude.abs()
    }

    pub fn is_coastal(&self) -> bool {
        self.distance_to_sea_km < 50.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hemisphere_from_latitude() {
        assert_eq!(Hemisphere::from_latitude(36.0), Hemisphere::Northern);
        assert_eq!(Hemisphere::from_latitude(0.0), Hemisphere::Northern);
        assert_eq!(Hemisphere::from_latitude(-33.9), Hemisphere::Southern);
    }

    #[test]
    fn southern_months_shift_by_six() {
        let south = Hemisphere::Southern;
        assert_eq!(south.season_month(1), 7);
        assert_eq!(south.season_month(6), 12);
        assert_eq!(south.season_month(7), 1);
        assert_eq!(south.season_month(12), 6);
        assert_eq!(Hemisphere::Northern.season_month(3), 3);
    }

    #[test]
    fn hemisphere_from_str() {
        assert_eq!(Hemisphere::from_str("Northern"), Some(Hemisphere::Northern));
        assert_eq!(Hemisphere::from_str("s"), Some(Hemisphere::Southern));
        assert_eq!(Hemisphere::from_str("east"), None);
    }
}
