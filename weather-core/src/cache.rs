//! Time-to-live cache in front of the weather provider.
//!
//! Stored data is served while it is younger than the configured TTL. Once it
//! ages out the provider is asked for fresh data; if that fails, whatever is
//! stored is served instead. Refreshes of one location are serialized so
//! overlapping requests trigger a single upstream call.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, info, warn};

use crate::{
    clock::Clock,
    config::CacheSettings,
    error::CacheError,
    model::{CurrentReport, CurrentSnapshot, Forecasts, Location},
    provider::WeatherProvider,
    retention::RetentionTrimmer,
    store::WeatherStore,
    units,
};

/// Region recorded for locations discovered through an upstream lookup.
const DEFAULT_REGION: &str = "Sri Lanka";

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Debug)]
pub struct WeatherCache {
    store: Arc<WeatherStore>,
    provider: Arc<dyn WeatherProvider>,
    clock: Arc<dyn Clock>,
    settings: CacheSettings,
    trimmer: RetentionTrimmer,
    refresh_locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

/// Result of refreshing one location in a batch.
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub location: Location,
    pub current: Option<CurrentSnapshot>,
    pub forecasts: Forecasts,
}

#[derive(Debug, Clone, Default)]
pub struct RefreshSummary {
    pub outcomes: Vec<RefreshOutcome>,
}

impl RefreshSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.current.is_some()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

fn is_fresh(fetched_at: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
    now - fetched_at < ttl
}

impl WeatherCache {
    pub fn new(
        store: Arc<WeatherStore>,
        provider: Arc<dyn WeatherProvider>,
        clock: Arc<dyn Clock>,
        settings: CacheSettings,
    ) -> Self {
        let trimmer = RetentionTrimmer::new(settings.snapshot_retention);
        Self {
            store,
            provider,
            clock,
            settings,
            trimmer,
            refresh_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &WeatherStore {
        &self.store
    }

    fn refresh_lock(&self, location_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        self.refresh_locks
            .lock()
            .entry(location_id)
            .or_default()
            .clone()
    }

    /// Current weather for a stored location.
    ///
    /// Returns `None` only when nothing was ever stored and the provider
    /// could not be reached.
    pub async fn get_current(&self, location: &Location) -> CacheResult<Option<CurrentSnapshot>> {
        let lock = self.refresh_lock(location.id);
        let _guard = lock.lock().await;

        let latest = self.store.latest_snapshot(location.id)?;
        if let Some(snapshot) = &latest {
            if is_fresh(snapshot.fetched_at, self.clock.now(), self.settings.current_ttl()) {
                debug!(location = %location.name, "current weather cache hit");
                return Ok(latest);
            }
        }

        match self.provider.fetch_current(&location.name).await {
            Ok(report) => {
                // Coordinates may have been back-filled since the caller read `location`.
                let location = self
                    .store
                    .location(location.id)?
                    .ok_or_else(|| CacheError::LocationNotFound(location.name.clone()))?;
                self.persist_current(&location, report).map(Some)
            }
            Err(err) => {
                warn!(
                    location = %location.name,
                    error = %err,
                    has_stored = latest.is_some(),
                    "serving stored current weather"
                );
                Ok(latest)
            }
        }
    }

    /// Current weather by location name.
    ///
    /// Unknown names are looked up upstream and, if found, stored as new
    /// locations. Fails with `LocationNotFound` when no data can be produced.
    pub async fn get_current_by_name(&self, name: &str) -> CacheResult<CurrentSnapshot> {
        if let Some(location) = self.store.location_by_name(name)? {
            return self
                .get_current(&location)
                .await?
                .ok_or_else(|| CacheError::LocationNotFound(name.to_string()));
        }

        let report = match self.provider.fetch_current(name).await {
            Ok(report) => report,
            Err(err) => {
                warn!(location = name, error = %err, "unknown location and upstream lookup failed");
                return Err(CacheError::LocationNotFound(name.to_string()));
            }
        };

        let (location, created) = self.store.get_or_create_location(
            &units::title_case(name),
            DEFAULT_REGION,
            report.lat,
            report.lon,
        )?;
        if created {
            info!(location = %location.name, lat = report.lat, lon = report.lon, "created location");
        }

        let lock = self.refresh_lock(location.id);
        let _guard = lock.lock().await;
        self.persist_current(&location, report)
    }

    fn persist_current(
        &self,
        location: &Location,
        report: CurrentReport,
    ) -> CacheResult<CurrentSnapshot> {
        if !location.has_coordinates() {
            self.store
                .update_coordinates(location.id, report.lat, report.lon)?;
            info!(
                location = %location.name,
                lat = report.lat,
                lon = report.lon,
                "back-filled coordinates"
            );
        }

        let snapshot =
            self.store
                .insert_snapshot(location.id, &report.conditions, self.clock.now())?;
        self.trimmer.trim(&self.store, location.id)?;

        info!(
            location = %location.name,
            temperature = snapshot.conditions.temperature_c,
            "stored current weather"
        );
        Ok(snapshot)
    }

    /// Hourly and daily forecasts for a stored location.
    ///
    /// Served hourly points never lie in the past, even when the stored set
    /// still contains them.
    pub async fn get_forecasts(&self, location: &Location) -> CacheResult<Forecasts> {
        let lock = self.refresh_lock(location.id);
        let _guard = lock.lock().await;

        if let Some(fetched_at) = self.store.latest_hourly_fetch(location.id)? {
            if is_fresh(fetched_at, self.clock.now(), self.settings.forecast_ttl()) {
                debug!(location = %location.name, "forecast cache hit");
                return self.stored_forecasts(location.id);
            }
        }

        let location = self
            .store
            .location(location.id)?
            .ok_or_else(|| CacheError::LocationNotFound(location.name.clone()))?;
        if !location.has_coordinates() {
            warn!(location = %location.name, "no coordinates yet; serving stored forecasts");
            return self.stored_forecasts(location.id);
        }

        match self.provider.fetch_forecast(location.lat, location.lon).await {
            Ok(report) if !report.hourly.is_empty() => {
                let forecasts =
                    self.store
                        .replace_forecasts(location.id, &report, self.clock.now())?;
                info!(
                    location = %location.name,
                    hourly = forecasts.hourly.len(),
                    daily = forecasts.daily.len(),
                    "stored forecasts"
                );
                Ok(forecasts)
            }
            Ok(_) => {
                warn!(location = %location.name, "upstream returned an empty forecast");
                self.stored_forecasts(location.id)
            }
            Err(err) => {
                warn!(location = %location.name, error = %err, "serving stored forecasts");
                self.stored_forecasts(location.id)
            }
        }
    }

    fn stored_forecasts(&self, location_id: i64) -> CacheResult<Forecasts> {
        let now = self.clock.now();
        Ok(Forecasts {
            hourly: self
                .store
                .future_hourly(location_id, now, self.settings.hourly_limit)?,
            daily: self.store.daily(location_id, self.settings.daily_limit)?,
        })
    }

    /// Refresh current weather then forecasts for every stored location,
    /// or only the named one.
    ///
    /// Forecasts are skipped for a location whose current weather could not
    /// be produced.
    pub async fn refresh_all(&self, only: Option<&str>) -> CacheResult<RefreshSummary> {
        let locations = match only {
            Some(name) => vec![
                self.store
                    .location_by_name(name)?
                    .ok_or_else(|| CacheError::LocationNotFound(name.to_string()))?,
            ],
            None => self.store.list_locations()?,
        };

        let mut summary = RefreshSummary::default();
        for location in locations {
            let current = self.get_current(&location).await?;
            let forecasts = if current.is_some() {
                self.get_forecasts(&location).await?
            } else {
                Forecasts::default()
            };

            summary.outcomes.push(RefreshOutcome {
                location,
                current,
                forecasts,
            });
        }

        info!(
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            "refresh finished"
        );
        Ok(summary)
    }
}
