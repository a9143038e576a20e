use crate::models::ParcelId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OliveOpsError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("No weather data available for parcel {0}")]
    NoWeatherData(ParcelId),

    #[error("Location unavailable for parcel {0}")]
    LocationUnavailable(ParcelId),

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Provider timed out: {0}")]
    ProviderTimeout(String),

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl OliveOpsError {
    /// Errors raised by an external provider that callers should absorb.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            OliveOpsError::ProviderUnavailable(_)
                | OliveOpsError::ProviderTimeout(_)
                | OliveOpsError::Http(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, OliveOpsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_failures_are_classified() {
        assert!(OliveOpsError::ProviderUnavailable("down".into()).is_provider_failure());
        assert!(OliveOpsError::ProviderTimeout("slow".into()).is_provider_failure());
        assert!(!OliveOpsError::NoWeatherData(ParcelId(3)).is_provider_failure());
        assert!(!OliveOpsError::InvalidData("x".into()).is_provider_failure());
    }

    #[test]
    fn messages_name_the_parcel() {
        let err = OliveOpsError::LocationUnavailable(ParcelId(42));
        assert_eq!(err.to_string(), "Location unavailable for parcel 42");
    }
}
