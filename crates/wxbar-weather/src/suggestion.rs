//! Turns a cached weather entry into the payload the address bar renders.

use serde::Serialize;

use crate::types::{CachedWeatherEntry, TemperatureUnit, UnitSystem, WeatherCondition};

pub const DEFAULT_PROVIDER_NAME: &str = "AccuWeather";
pub const DEFAULT_ICON_BASE_URL: &str = "icons";

/// Row the weather result is placed at in the results list.
pub const SUGGESTED_INDEX: usize = 1;

/// Daily forecast entries shown under the current conditions.
const MAX_DAYS: usize = 5;

/// One day of the forecast strip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySuggestion {
    pub day_of_week: String,
    pub icon_url: String,
    pub conditions: String,
    pub high: i64,
    pub low: i64,
}

impl DailySuggestion {
    pub fn label(&self) -> String {
        format!("{}° / {}°", self.high, self.low)
    }
}

/// Weather result row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub title: String,
    pub url: String,
    pub provider_name: String,
    pub location_name: String,
    /// Observation time in the location's own offset, e.g. "Monday 2:28 PM"
    pub forecast_time: String,
    pub conditions: String,
    pub icon_url: String,
    pub temperature: i64,
    pub units: String,
    pub daily: Vec<DailySuggestion>,
    pub suggested_index: usize,
}

impl Suggestion {
    pub fn temperature_label(&self) -> String {
        format!("{}{}", self.temperature, self.units)
    }
}

#[derive(Debug, Clone)]
pub struct SuggestionBuilder {
    icon_base_url: String,
    temperature_unit: TemperatureUnit,
    provider_name: String,
}

impl Default for SuggestionBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_ICON_BASE_URL, TemperatureUnit::Auto)
    }
}

impl SuggestionBuilder {
    pub fn new(icon_base_url: &str, temperature_unit: TemperatureUnit) -> Self {
        Self {
            icon_base_url: icon_base_url.trim_end_matches('/').to_string(),
            temperature_unit,
            provider_name: DEFAULT_PROVIDER_NAME.to_string(),
        }
    }

    pub fn with_provider_name(mut self, name: &str) -> Self {
        self.provider_name = name.to_string();
        self
    }

    pub fn build(&self, entry: &CachedWeatherEntry) -> Suggestion {
        let units = self.temperature_unit.resolve(&entry.location);
        let reading = entry.weather.reading(units);
        let condition = entry.weather.condition();
        let location_name = entry.location.display_name();

        let conditions = if entry.weather.text.is_empty() {
            condition.description().to_string()
        } else {
            entry.weather.text.clone()
        };

        Suggestion {
            title: format!("Weather in {}", location_name),
            url: entry.weather.link.clone(),
            provider_name: format!("Data Provided by {}", self.provider_name),
            location_name,
            forecast_time: entry
                .location
                .local_time(entry.weather.observed_at)
                .format("%A %-I:%M %p")
                .to_string(),
            conditions,
            icon_url: self.icon_url(condition),
            temperature: reading.value.round() as i64,
            units: unit_label(&reading.unit, units),
            daily: self.daily(entry, units),
            suggested_index: SUGGESTED_INDEX,
        }
    }

    fn daily(&self, entry: &CachedWeatherEntry, units: UnitSystem) -> Vec<DailySuggestion> {
        let Some(forecast) = &entry.forecast else {
            return Vec::new();
        };

        forecast
            .days
            .iter()
            .take(MAX_DAYS)
            .map(|day| {
                let condition = WeatherCondition::from_icon_code(day.icon);
                DailySuggestion {
                    day_of_week: entry.location.local_time(day.date).format("%a").to_string(),
                    icon_url: self.icon_url(condition),
                    conditions: if day.phrase.is_empty() {
                        condition.description().to_string()
                    } else {
                        day.phrase.clone()
                    },
                    high: convert(day.high, forecast.units, units).round() as i64,
                    low: convert(day.low, forecast.units, units).round() as i64,
                }
            })
            .collect()
    }

    fn icon_url(&self, condition: WeatherCondition) -> String {
        format!("{}/{}", self.icon_base_url, condition.icon_asset())
    }
}

fn unit_label(provider_unit: &str, units: UnitSystem) -> String {
    let letter = match provider_unit.trim() {
        "" if units.is_metric() => "C",
        "" => "F",
        unit => unit,
    };
    format!("°{}", letter)
}

fn convert(value: f64, from: UnitSystem, to: UnitSystem) -> f64 {
    match (from, to) {
        (UnitSystem::Metric, UnitSystem::Imperial) => value * 9.0 / 5.0 + 32.0,
        (UnitSystem::Imperial, UnitSystem::Metric) => (value - 32.0) * 5.0 / 9.0,
        _ => value,
    }
}
