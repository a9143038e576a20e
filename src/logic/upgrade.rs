//! Background refinement of low-confidence climate profiles.

use super::climate::{apply_historical, apply_weather_history, PROFILE_MAX_AGE_DAYS};
use crate::error::{OliveOpsError, Result};
use crate::models::{DataTier, ParcelId};
use crate::ports::{HistoricalClimateProvider, PersistencePort};
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeOutcome {
    Upgraded(DataTier),
    /// A recent non-estimate profile is already stored.
    SkippedFresh,
    /// The candidate would have lowered confidence.
    SkippedNoGain,
    NoProfile,
    /// Neither the archive nor stored observations produced a profile.
    NoData,
}

pub struct ClimateUpgrader {
    store: Arc<dyn PersistencePort>,
    archive: Arc<dyn HistoricalClimateProvider>,
    archive_years: u32,
}

impl ClimateUpgrader {
    pub fn new(
        store: Arc<dyn PersistencePort>,
        archive: Arc<dyn HistoricalClimateProvider>,
        archive_years: u32,
    ) -> Self {
        Self {
            store,
            archive,
            archive_years,
        }
    }

    /// Single attempt. The archive and a year of stored observations are both
    /// considered; the candidate with the higher confidence wins, the archive
    /// on a tie. Storage calls run on the blocking pool.
    pub async fn upgrade(&self, parcel_id: ParcelId, now: DateTime<Utc>) -> Result<UpgradeOutcome> {
        let store = Arc::clone(&self.store);
        let Some(current) = blocking(move || store.climate_profile(parcel_id)).await? else {
            return Ok(UpgradeOutcome::NoProfile);
        };
        if current.tier != DataTier::LocationEstimate && !current.needs_upgrade(now) {
            return Ok(UpgradeOutcome::SkippedFresh);
        }

        let location = &current.location;
        let from_archive = match self
            .archive
            .archive(location.latitude, location.longitude, self.archive_years)
            .await
        {
            Ok(h) if h.days > 0 => Some(apply_historical(&current, &h, now)),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Historical archive unavailable for parcel {}: {}", parcel_id, e);
                None
            }
        };

        let store = Arc::clone(&self.store);
        let since = now - Duration::days(365);
        let observations = blocking(move || store.observations_since(parcel_id, since)).await?;
        let from_history = apply_weather_history(&current, &observations, now);

        let candidate = match (from_archive, from_history) {
            (Some(archive), Some(history)) if history.confidence > archive.confidence => {
                Some(history)
            }
            (Some(archive), _) => Some(archive),
            (None, history) => history,
        };

        let Some(candidate) = candidate else {
            tracing::info!("No climate data to refine parcel {} yet", parcel_id);
            return Ok(UpgradeOutcome::NoData);
        };
        if candidate.confidence < current.confidence {
            return Ok(UpgradeOutcome::SkippedNoGain);
        }

        let tier = candidate.tier;
        let confidence = candidate.confidence;
        let store = Arc::clone(&self.store);
        blocking(move || store.upsert_climate_profile(&candidate)).await?;
        tracing::info!(
            "Climate profile for parcel {} upgraded to {} (confidence {:.2})",
            parcel_id,
            tier,
            confidence
        );
        Ok(UpgradeOutcome::Upgraded(tier))
    }
}

/// Runs a synchronous storage call off the async worker threads.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| OliveOpsError::PersistenceFailure(format!("storage task: {}", e)))?
}

/// Handle to the upgrade worker. At most one job per parcel is queued or
/// running at a time, and a parcel is not attempted again until
/// `min_interval` has passed since its last attempt.
#[derive(Clone)]
pub struct UpgradeQueue {
    tx: mpsc::UnboundedSender<ParcelId>,
    in_flight: Arc<Mutex<HashSet<ParcelId>>>,
    attempts: Arc<Mutex<HashMap<ParcelId, DateTime<Utc>>>>,
    min_interval: Duration,
}

impl UpgradeQueue {
    /// Starts the worker on the current tokio runtime.
    pub fn spawn(upgrader: ClimateUpgrader) -> (Self, JoinHandle<()>) {
        Self::spawn_with_interval(upgrader, Duration::days(PROFILE_MAX_AGE_DAYS))
    }

    pub fn spawn_with_interval(
        upgrader: ClimateUpgrader,
        min_interval: Duration,
    ) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<ParcelId>();
        let in_flight: Arc<Mutex<HashSet<ParcelId>>> = Arc::new(Mutex::new(HashSet::new()));
        let attempts: Arc<Mutex<HashMap<ParcelId, DateTime<Utc>>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let pending = Arc::clone(&in_flight);
        let attempted = Arc::clone(&attempts);

        let handle = tokio::spawn(async move {
            while let Some(parcel_id) = rx.recv().await {
                let started = Utc::now();
                match upgrader.upgrade(parcel_id, started).await {
                    Ok(outcome) => {
                        tracing::debug!("Climate upgrade for parcel {}: {:?}", parcel_id, outcome)
                    }
                    Err(e) => {
                        tracing::warn!("Climate upgrade failed for parcel {}: {}", parcel_id, e)
                    }
                }
                attempted
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .insert(parcel_id, started);
                pending
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .remove(&parcel_id);
            }
        });

        (
            Self {
                tx,
                in_flight,
                attempts,
                min_interval,
            },
            handle,
        )
    }

    /// Returns false when the parcel is already pending, was attempted too
    /// recently, or the worker is gone.
    pub fn schedule(&self, parcel_id: ParcelId) -> bool {
        let recently_attempted = self
            .attempts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&parcel_id)
            .is_some_and(|at| Utc::now() - *at < self.min_interval);
        if recently_attempted {
            return false;
        }

        let mut pending = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !pending.insert(parcel_id) {
            return false;
        }
        if self.tx.send(parcel_id).is_err() {
            pending.remove(&parcel_id);
            return false;
        }
        true
    }

    pub fn is_pending(&self, parcel_id: ParcelId) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(&parcel_id)
    }
}
