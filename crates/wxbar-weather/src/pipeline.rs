//! Resolution pipeline: location lookup, then the dependent weather fetches.
//!
//! The pipeline never touches the caches. It checks its `QueryToken` after
//! every await and bails out with `ResolveFailure::Superseded` as soon as a
//! newer query has taken over.

use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::cache::DEFAULT_TTL_SECS;
use crate::location::CoordinateSource;
use crate::provider::WeatherApi;
use crate::types::{
    CachedWeatherEntry, LocationKey, LocationRecord, TemperatureUnit, WeatherError,
};

/// Identity of one activation attempt.
///
/// Cloning shares the underlying cancellation state.
#[derive(Debug, Clone)]
pub struct QueryToken {
    id: u64,
    cancel: CancellationToken,
}

impl QueryToken {
    pub(crate) fn new(id: u64) -> Self {
        Self {
            id,
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// True once a newer query has replaced this one (or the host gave up on it).
    pub fn is_superseded(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn supersede(&self) {
        self.cancel.cancel();
    }

    fn checkpoint(&self) -> Result<(), ResolveFailure> {
        if self.is_superseded() {
            tracing::debug!(query = self.id, "Query superseded, abandoning pipeline");
            return Err(ResolveFailure::Superseded);
        }
        Ok(())
    }
}

/// Why a pipeline run produced nothing.
#[derive(Debug, thiserror::Error)]
pub enum ResolveFailure {
    #[error("location resolution failed: {0}")]
    Resolution(#[source] WeatherError),
    #[error("weather fetch failed: {0}")]
    Fetch(#[source] WeatherError),
    #[error("superseded by a newer query")]
    Superseded,
}

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// Lifetime of an entry when the provider sends no `Expiry`
    pub ttl: Duration,
    /// Also fetch the 5-day forecast
    pub fetch_forecast: bool,
    pub temperature_unit: TemperatureUnit,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::seconds(DEFAULT_TTL_SECS),
            fetch_forecast: true,
            temperature_unit: TemperatureUnit::Auto,
        }
    }
}

pub struct Resolver {
    api: Arc<dyn WeatherApi>,
    coordinates: Arc<dyn CoordinateSource>,
    settings: ResolverSettings,
}

impl Resolver {
    pub fn new(
        api: Arc<dyn WeatherApi>,
        coordinates: Arc<dyn CoordinateSource>,
        settings: ResolverSettings,
    ) -> Self {
        Self {
            api,
            coordinates,
            settings,
        }
    }

    /// Resolve `key` to a complete cache entry. An empty key means the
    /// device's own position.
    pub async fn resolve(
        &self,
        key: &LocationKey,
        token: &QueryToken,
    ) -> Result<CachedWeatherEntry, ResolveFailure> {
        token.checkpoint()?;

        let location = self.resolve_location(key, token).await?;
        token.checkpoint()?;

        let current = self
            .api
            .current_conditions(&location.key)
            .await
            .map_err(ResolveFailure::Fetch)?;
        token.checkpoint()?;

        let forecast = if self.settings.fetch_forecast {
            let units = self.settings.temperature_unit.resolve(&location);
            let forecast = self
                .api
                .daily_forecast(&location.key, units)
                .await
                .map_err(ResolveFailure::Fetch)?;
            token.checkpoint()?;
            Some(forecast)
        } else {
            None
        };

        let expires_at = current
            .expires_at
            .unwrap_or_else(|| Utc::now() + self.settings.ttl);

        Ok(CachedWeatherEntry {
            weather: current.snapshot,
            forecast,
            location,
            expires_at,
        })
    }

    async fn resolve_location(
        &self,
        key: &LocationKey,
        token: &QueryToken,
    ) -> Result<LocationRecord, ResolveFailure> {
        let result = if key.is_empty() {
            let coordinates = self
                .coordinates
                .current_position()
                .await
                .map_err(|e| ResolveFailure::Resolution(e.into()))?;
            token.checkpoint()?;
            self.api.locate(coordinates.rounded()).await
        } else {
            self.api.search_location(key.as_str()).await
        };

        result.map_err(ResolveFailure::Resolution)
    }
}
