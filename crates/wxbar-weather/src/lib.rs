//! Weather suggestions for address-bar queries
//!
//! Pulls a location out of free-text queries, resolves it through a weather
//! provider and keeps the results in in-memory positive and negative caches.

pub mod cache;
pub mod extract;
pub mod fixture;
pub mod gate;
pub mod location;
pub mod pipeline;
pub mod provider;
pub mod suggester;
pub mod suggestion;
pub mod types;

pub use cache::{NegativeCache, WeatherCache, DEFAULT_COOLDOWN_SECS, DEFAULT_TTL_SECS};
pub use extract::{extract_location, mentions_weather};
pub use fixture::FixtureApi;
pub use gate::{Activation, GateSettings, InactiveReason, WeatherGate, DEFAULT_MIN_KEY_LEN};
pub use location::{CachedCoordinates, CoordinateSource, FixedCoordinates, NoCoordinates};
pub use pipeline::{QueryToken, ResolveFailure, Resolver, ResolverSettings};
pub use provider::{AccuWeatherClient, WeatherApi, ACCUWEATHER_API_BASE};
pub use suggester::WeatherSuggester;
pub use suggestion::{DailySuggestion, Suggestion, SuggestionBuilder, DEFAULT_ICON_BASE_URL};
pub use types::*;
