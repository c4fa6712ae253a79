//! In-memory result caches keyed by location.
//!
//! Both caches evict lazily: an entry is only checked, and dropped, when it is
//! looked up. There is no capacity bound and no background sweep.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::types::{CachedWeatherEntry, LocationKey};

/// Default lifetime of a weather result.
pub const DEFAULT_TTL_SECS: i64 = 600;

/// Default suppression window after a failed lookup.
pub const DEFAULT_COOLDOWN_SECS: i64 = 600;

/// Positive cache: resolved location plus weather, valid until `expires_at`.
#[derive(Debug, Default)]
pub struct WeatherCache {
    entries: Mutex<HashMap<LocationKey, Arc<CachedWeatherEntry>>>,
}

impl WeatherCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live entry for `key`, evicting it first if it has expired.
    pub fn get(&self, key: &LocationKey) -> Option<Arc<CachedWeatherEntry>> {
        self.get_at(key, Utc::now())
    }

    pub fn get_at(&self, key: &LocationKey, now: DateTime<Utc>) -> Option<Arc<CachedWeatherEntry>> {
        let mut entries = self.entries.lock();
        let entry = Arc::clone(entries.get(key)?);
        if entry.is_expired_at(now) {
            tracing::debug!(location = %key, "Evicting expired weather entry");
            entries.remove(key);
            return None;
        }
        Some(entry)
    }

    /// Insert or replace the entry for `key`.
    pub fn set(&self, key: LocationKey, entry: Arc<CachedWeatherEntry>) {
        self.entries.lock().insert(key, entry);
    }

    pub fn delete(&self, key: &LocationKey) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    /// Number of stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Negative cache: when a location last failed to resolve.
#[derive(Debug)]
pub struct NegativeCache {
    cooldown: Duration,
    failures: Mutex<HashMap<LocationKey, DateTime<Utc>>>,
}

impl Default for NegativeCache {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_COOLDOWN_SECS))
    }
}

impl NegativeCache {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            failures: Mutex::new(HashMap::new()),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Failure time for `key` if it is still inside the cooldown window.
    pub fn get(&self, key: &LocationKey) -> Option<DateTime<Utc>> {
        self.get_at(key, Utc::now())
    }

    pub fn get_at(&self, key: &LocationKey, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut failures = self.failures.lock();
        let failed_at = *failures.get(key)?;
        if now >= failed_at + self.cooldown {
            tracing::debug!(location = %key, "Negative entry cooled down");
            failures.remove(key);
            return None;
        }
        Some(failed_at)
    }

    pub fn is_suppressed(&self, key: &LocationKey) -> bool {
        self.get(key).is_some()
    }

    /// Record (or refresh) a failure for `key`.
    pub fn set(&self, key: LocationKey, failed_at: DateTime<Utc>) {
        self.failures.lock().insert(key, failed_at);
    }

    pub fn record_failure(&self, key: LocationKey) {
        self.set(key, Utc::now());
    }

    pub fn delete(&self, key: &LocationKey) -> bool {
        self.failures.lock().remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.failures.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
