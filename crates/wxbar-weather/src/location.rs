//! Device coordinates for "weather here" queries.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

use crate::types::{Coordinates, LocationError};

/// How long a position fix is reused before asking the source again.
pub const COORDINATE_REUSE_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Anything that can report the device's approximate position.
#[async_trait]
pub trait CoordinateSource: Send + Sync {
    async fn current_position(&self) -> Result<Coordinates, LocationError>;
}

/// A position fixed in configuration.
#[derive(Debug, Clone, Copy)]
pub struct FixedCoordinates(pub Coordinates);

#[async_trait]
impl CoordinateSource for FixedCoordinates {
    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        Ok(self.0)
    }
}

/// No positioning available on this host.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCoordinates;

#[async_trait]
impl CoordinateSource for NoCoordinates {
    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        Err(LocationError::ServiceUnavailable)
    }
}

/// Wraps a source, rounding fixes to one decimal place and reusing them
/// for a while so every keystroke does not re-poll the device.
pub struct CachedCoordinates<S> {
    source: S,
    reuse_for: Duration,
    last_fix: Mutex<Option<(Coordinates, Instant)>>,
}

impl<S: CoordinateSource> CachedCoordinates<S> {
    pub fn new(source: S) -> Self {
        Self::with_reuse_window(source, COORDINATE_REUSE_WINDOW)
    }

    pub fn with_reuse_window(source: S, reuse_for: Duration) -> Self {
        Self {
            source,
            reuse_for,
            last_fix: Mutex::new(None),
        }
    }

    fn reusable(&self) -> Option<Coordinates> {
        let last_fix = *self.last_fix.lock();
        last_fix
            .filter(|(_, taken_at)| taken_at.elapsed() < self.reuse_for)
            .map(|(coordinates, _)| coordinates)
    }
}

#[async_trait]
impl<S: CoordinateSource> CoordinateSource for CachedCoordinates<S> {
    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        if let Some(coordinates) = self.reusable() {
            return Ok(coordinates);
        }

        let coordinates = self.source.current_position().await?.rounded();
        tracing::debug!(
            "Position fix: {:.1}, {:.1}",
            coordinates.latitude,
            coordinates.longitude
        );
        *self.last_fix.lock() = Some((coordinates, Instant::now()));
        Ok(coordinates)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSource {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CoordinateSource for CountingSource {
        async fn current_position(&self) -> Result<Coordinates, LocationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Coordinates::new(43.6532, -79.3832))
        }
    }

    #[tokio::test]
    async fn test_fix_is_rounded() {
        let source = CachedCoordinates::new(FixedCoordinates(Coordinates::new(47.6062, -122.3321)));
        let coords = source.current_position().await.unwrap();
        assert!((coords.latitude - 47.6).abs() < 1e-9);
        assert!((coords.longitude - -122.3).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_fix_is_reused_within_window() {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = CachedCoordinates::new(CountingSource {
            calls: Arc::clone(&calls),
        });

        source.current_position().await.unwrap();
        source.current_position().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fix_is_refreshed_after_window() {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = CachedCoordinates::with_reuse_window(
            CountingSource {
                calls: Arc::clone(&calls),
            },
            Duration::ZERO,
        );

        source.current_position().await.unwrap();
        source.current_position().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unavailable_source() {
        let source = CachedCoordinates::new(NoCoordinates);
        let err = source.current_position().await.unwrap_err();
        assert!(matches!(err, LocationError::ServiceUnavailable));
    }
}
