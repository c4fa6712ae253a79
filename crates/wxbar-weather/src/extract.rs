//! Pulls the place name out of what the user has typed so far.
//!
//! This is a suffix/substring heuristic, not a parser. Rules are tried in
//! order and the first match wins:
//!
//! 1. `"<place> weather"`
//! 2. `"<place> forecast"`
//! 3. `"... weather in <place>"` / `"... weather at <place>"`
//! 4. `"weather <place>"`
//!
//! Anything else yields the empty key.

use crate::types::LocationKey;

const WEATHER_SUFFIX: &str = " weather";
const FORECAST_SUFFIX: &str = " forecast";
const WEATHER_PREFIX: &str = "weather ";
const PLACE_PHRASES: [&str; 2] = ["weather in", "weather at"];

/// Extract the location key from a raw query string.
pub fn extract_location(search: &str) -> LocationKey {
    let query = search.trim().to_lowercase();
    LocationKey::new(location_slice(&query))
}

fn location_slice(query: &str) -> &str {
    if let Some(place) = query.strip_suffix(WEATHER_SUFFIX) {
        return place;
    }
    if let Some(place) = query.strip_suffix(FORECAST_SUFFIX) {
        return place;
    }

    // Earliest phrase occurrence decides, so "weather at home weather in x"
    // reads as "home weather in x".
    let phrase_match = PLACE_PHRASES
        .iter()
        .filter_map(|phrase| query.find(phrase).map(|at| at + phrase.len()))
        .min();
    if let Some(start) = phrase_match {
        return &query[start..];
    }

    query.strip_prefix(WEATHER_PREFIX).unwrap_or("")
}

/// True when the query is about weather at all, with or without a place.
pub fn mentions_weather(search: &str) -> bool {
    let query = search.to_lowercase();
    query.contains("weather") || query.contains("forecast")
}
