//! Decides, per keystroke, whether a weather suggestion should be shown.
//!
//! Every activation mints a fresh `QueryToken` and supersedes the previous
//! one. Cache writes happen under the same lock that tracks the current
//! token, so a superseded run can never publish its result or record a
//! failure after a newer query has started.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::cache::{NegativeCache, WeatherCache};
use crate::extract::{extract_location, mentions_weather};
use crate::pipeline::{QueryToken, ResolveFailure, Resolver};
use crate::types::{CachedWeatherEntry, LocationKey};

/// Shortest typed location that is worth a lookup.
pub const DEFAULT_MIN_KEY_LEN: usize = 3;

#[derive(Debug, Clone)]
pub struct GateSettings {
    /// Keys shorter than this (in characters) never activate.
    pub min_key_len: usize,
    /// Let "weather" on its own resolve the device's position.
    pub implicit_location: bool,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            min_key_len: DEFAULT_MIN_KEY_LEN,
            implicit_location: false,
        }
    }
}

/// Why a query did not activate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InactiveReason {
    #[error("location too short")]
    TooShort,
    #[error("no location in query")]
    NoLocation,
    #[error("location recently failed")]
    Suppressed,
    #[error("location could not be resolved")]
    ResolutionFailed,
    #[error("weather could not be fetched")]
    FetchFailed,
    #[error("superseded by a newer query")]
    Superseded,
    #[error("query timed out")]
    TimedOut,
}

#[derive(Debug, Clone)]
pub enum Activation {
    Ready(Arc<CachedWeatherEntry>),
    Inactive(InactiveReason),
}

impl Activation {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn reason(&self) -> Option<InactiveReason> {
        match self {
            Self::Ready(_) => None,
            Self::Inactive(reason) => Some(*reason),
        }
    }
}

pub struct WeatherGate {
    resolver: Resolver,
    cache: Arc<WeatherCache>,
    negative: Arc<NegativeCache>,
    settings: GateSettings,
    current: Mutex<Option<QueryToken>>,
    next_id: AtomicU64,
}

impl WeatherGate {
    pub fn new(
        resolver: Resolver,
        cache: Arc<WeatherCache>,
        negative: Arc<NegativeCache>,
        settings: GateSettings,
    ) -> Self {
        Self {
            resolver,
            cache,
            negative,
            settings,
            current: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn cache(&self) -> &Arc<WeatherCache> {
        &self.cache
    }

    pub fn negative_cache(&self) -> &Arc<NegativeCache> {
        &self.negative
    }

    /// Mint a token for a new query, superseding whichever one was current.
    pub fn begin_query(&self) -> QueryToken {
        let token = QueryToken::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut current = self.current.lock();
        if let Some(previous) = current.replace(token.clone()) {
            previous.supersede();
        }
        token
    }

    /// Give up on `token`, e.g. when the host stopped waiting for it.
    pub fn abandon(&self, token: &QueryToken) {
        let mut current = self.current.lock();
        token.supersede();
        if current.as_ref().map(QueryToken::id) == Some(token.id()) {
            *current = None;
        }
    }

    /// Should a weather suggestion be shown for `search`?
    ///
    /// On `true` the entry for the query's location is in the cache.
    pub async fn activate(&self, search: &str) -> bool {
        self.activate_query(search).await.is_ready()
    }

    pub async fn activate_query(&self, search: &str) -> Activation {
        let token = self.begin_query();
        self.run(search, &token).await
    }

    /// Run activation for `search` under an already minted token.
    pub async fn run(&self, search: &str, token: &QueryToken) -> Activation {
        if token.is_superseded() {
            return Activation::Inactive(InactiveReason::Superseded);
        }

        let key = match self.key_for(search) {
            Ok(key) => key,
            Err(reason) => {
                tracing::trace!(query = token.id(), "Not activating: {}", reason);
                return Activation::Inactive(reason);
            }
        };

        if let Some(entry) = self.cache.get(&key) {
            tracing::debug!(query = token.id(), location = %key, "Weather cache hit");
            return Activation::Ready(entry);
        }

        if self.negative.is_suppressed(&key) {
            tracing::debug!(query = token.id(), location = %key, "Location in cooldown");
            return Activation::Inactive(InactiveReason::Suppressed);
        }

        match self.resolver.resolve(&key, token).await {
            Ok(entry) => self.commit(token, key, entry),
            Err(ResolveFailure::Superseded) => Activation::Inactive(InactiveReason::Superseded),
            Err(ResolveFailure::Resolution(e)) => {
                tracing::warn!(location = %key, "Location lookup failed: {}", e);
                self.fail(token, key, InactiveReason::ResolutionFailed)
            }
            Err(ResolveFailure::Fetch(e)) => {
                tracing::warn!(location = %key, "Weather fetch failed: {}", e);
                self.fail(token, key, InactiveReason::FetchFailed)
            }
        }
    }

    /// Cached entry for the location in `search`, without any network work.
    pub fn lookup(&self, search: &str) -> Option<Arc<CachedWeatherEntry>> {
        let key = self.key_for(search).ok()?;
        self.cache.get(&key)
    }

    fn key_for(&self, search: &str) -> Result<LocationKey, InactiveReason> {
        let key = extract_location(search);
        if key.is_empty() {
            if self.settings.implicit_location && mentions_weather(search) {
                return Ok(key);
            }
            return Err(InactiveReason::NoLocation);
        }
        if key.char_len() < self.settings.min_key_len {
            return Err(InactiveReason::TooShort);
        }
        Ok(key)
    }

    fn commit(
        &self,
        token: &QueryToken,
        key: LocationKey,
        entry: CachedWeatherEntry,
    ) -> Activation {
        let current = self.current.lock();
        if !Self::owns(&current, token) {
            return Activation::Inactive(InactiveReason::Superseded);
        }

        let entry = Arc::new(entry);
        self.negative.delete(&key);
        tracing::info!(
            location = %key,
            resolved = %entry.location.display_name(),
            expires_at = %entry.expires_at,
            "Cached weather"
        );
        self.cache.set(key, Arc::clone(&entry));
        Activation::Ready(entry)
    }

    fn fail(&self, token: &QueryToken, key: LocationKey, reason: InactiveReason) -> Activation {
        let current = self.current.lock();
        if !Self::owns(&current, token) {
            return Activation::Inactive(InactiveReason::Superseded);
        }

        self.negative.record_failure(key);
        Activation::Inactive(reason)
    }

    fn owns(current: &Option<QueryToken>, token: &QueryToken) -> bool {
        !token.is_superseded() && current.as_ref().map(QueryToken::id) == Some(token.id())
    }
}
