use chrono::{DateTime, FixedOffset, Offset, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized location text pulled out of a query ("new york", "berlin").
///
/// The empty key means no explicit location was typed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct LocationKey(String);

impl LocationKey {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Length in characters, not bytes.
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("<current location>")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl From<&str> for LocationKey {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Measurement system used to display temperatures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    Metric,
    Imperial,
}

impl UnitSystem {
    pub fn is_metric(self) -> bool {
        matches!(self, Self::Metric)
    }
}

/// Temperature unit preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    /// Follow the unit system of the location's country
    #[default]
    Auto,
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn resolve(self, location: &LocationRecord) -> UnitSystem {
        match self {
            Self::Auto => location.unit_system(),
            Self::Celsius => UnitSystem::Metric,
            Self::Fahrenheit => UnitSystem::Imperial,
        }
    }
}

/// Weather condition categories mapped from AccuWeather icon codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    Sunny,
    PartlySunny,
    Hazy,
    MostlyCloudy,
    Cloudy,
    Fog,
    Showers,
    Thunderstorm,
    Rain,
    Flurries,
    Snow,
    Ice,
    Sleet,
    FreezingRain,
    RainAndSnow,
    Hot,
    Cold,
    Windy,
    ClearNight,
    PartlyCloudyNight,
    /// Codes missing from the table
    Unknown,
}

impl WeatherCondition {
    /// Convert an AccuWeather icon number to a condition.
    /// See: https://developer.accuweather.com/weather-icons
    pub fn from_icon_code(code: u32) -> Self {
        match code {
            1 | 2 => Self::Sunny,
            3 | 4 => Self::PartlySunny,
            5 | 37 => Self::Hazy,
            6 | 38 => Self::MostlyCloudy,
            7 | 8 => Self::Cloudy,
            11 => Self::Fog,
            12..=14 | 39 | 40 => Self::Showers,
            15..=17 | 41 | 42 => Self::Thunderstorm,
            18 => Self::Rain,
            19..=21 | 43 => Self::Flurries,
            22 | 23 | 44 => Self::Snow,
            24 => Self::Ice,
            25 => Self::Sleet,
            26 => Self::FreezingRain,
            29 => Self::RainAndSnow,
            30 => Self::Hot,
            31 => Self::Cold,
            32 => Self::Windy,
            33 | 34 => Self::ClearNight,
            35 | 36 => Self::PartlyCloudyNight,
            _ => Self::Unknown,
        }
    }

    /// Get a human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Sunny => "Sunny",
            Self::PartlySunny => "Partly Sunny",
            Self::Hazy => "Hazy",
            Self::MostlyCloudy => "Mostly Cloudy",
            Self::Cloudy => "Cloudy",
            Self::Fog => "Fog",
            Self::Showers => "Showers",
            Self::Thunderstorm => "Thunderstorms",
            Self::Rain => "Rain",
            Self::Flurries => "Flurries",
            Self::Snow => "Snow",
            Self::Ice => "Ice",
            Self::Sleet => "Sleet",
            Self::FreezingRain => "Freezing Rain",
            Self::RainAndSnow => "Rain and Snow",
            Self::Hot => "Hot",
            Self::Cold => "Cold",
            Self::Windy => "Windy",
            Self::ClearNight => "Clear",
            Self::PartlyCloudyNight => "Partly Cloudy",
            Self::Unknown => "Unknown",
        }
    }

    /// Icon asset file name, relative to the icon base URL
    pub fn icon_asset(&self) -> &'static str {
        match self {
            Self::Sunny => "sunny.svg",
            Self::PartlySunny => "partly-sunny.svg",
            Self::Hazy => "hazy.svg",
            Self::MostlyCloudy => "mostly-cloudy.svg",
            Self::Cloudy => "cloudy.svg",
            Self::Fog => "fog.svg",
            Self::Showers => "showers.svg",
            Self::Thunderstorm => "thunderstorm.svg",
            Self::Rain => "rain.svg",
            Self::Flurries => "flurries.svg",
            Self::Snow => "snow.svg",
            Self::Ice | Self::Sleet | Self::FreezingRain => "sleet.svg",
            Self::RainAndSnow => "rain-snow.svg",
            Self::Hot => "hot.svg",
            Self::Cold => "cold.svg",
            Self::Windy => "windy.svg",
            Self::ClearNight => "clear-night.svg",
            Self::PartlyCloudyNight => "partly-cloudy-night.svg",
            Self::Unknown => "default.svg",
        }
    }
}

/// Geographic coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// One decimal place: roughly 11 km, enough for weather and no more.
    pub fn rounded(self) -> Self {
        Self {
            latitude: (self.latitude * 10.0).round() / 10.0,
            longitude: (self.longitude * 10.0).round() / 10.0,
        }
    }

    /// `lat,lon` with one decimal place, as the geoposition search expects
    pub fn query_string(&self) -> String {
        let rounded = self.rounded();
        format!("{:.1},{:.1}", rounded.latitude, rounded.longitude)
    }
}

/// A place resolved by the provider's location search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    /// Provider key used by the weather endpoints
    pub key: String,
    pub name: String,
    /// Administrative area code, e.g. "NY" or "ON"
    pub admin_area: Option<String>,
    /// ISO country code
    pub country: String,
    /// IANA time zone name
    pub time_zone: Option<String>,
    /// Offset from UTC, in hours (may be fractional)
    pub gmt_offset_hours: f64,
}

impl LocationRecord {
    /// "New York, NY"
    pub fn display_name(&self) -> String {
        match self.admin_area.as_deref() {
            Some(area) if !area.is_empty() && area != self.name => {
                format!("{}, {}", self.name, area)
            }
            _ => self.name.clone(),
        }
    }

    /// Imperial for the US, metric everywhere else.
    pub fn unit_system(&self) -> UnitSystem {
        if self.country.eq_ignore_ascii_case("US") {
            UnitSystem::Imperial
        } else {
            UnitSystem::Metric
        }
    }

    /// The location's UTC offset, falling back to UTC for nonsense values.
    pub fn utc_offset(&self) -> FixedOffset {
        let seconds = (self.gmt_offset_hours * 3600.0).round() as i32;
        FixedOffset::east_opt(seconds).unwrap_or_else(|| Utc.fix())
    }

    /// `at` as wall-clock time at the location.
    ///
    /// Uses the IANA zone when it is known, so daylight saving applies.
    /// Otherwise the provider's fixed offset is used.
    pub fn local_time(&self, at: DateTime<Utc>) -> DateTime<FixedOffset> {
        match self.time_zone.as_deref().map(str::parse::<Tz>) {
            Some(Ok(tz)) => {
                let local = at.with_timezone(&tz);
                local.with_timezone(&local.offset().fix())
            }
            _ => at.with_timezone(&self.utc_offset()),
        }
    }
}

/// A single temperature reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub value: f64,
    /// Provider unit letter, "C" or "F"
    pub unit: String,
}

/// Current conditions at a location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub text: String,
    pub icon: u32,
    pub metric: Reading,
    pub imperial: Reading,
    pub observed_at: DateTime<Utc>,
    pub link: String,
}

impl WeatherSnapshot {
    pub fn condition(&self) -> WeatherCondition {
        WeatherCondition::from_icon_code(self.icon)
    }

    pub fn reading(&self, units: UnitSystem) -> &Reading {
        match units {
            UnitSystem::Metric => &self.metric,
            UnitSystem::Imperial => &self.imperial,
        }
    }
}

/// Daily forecast entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayForecast {
    pub date: DateTime<Utc>,
    pub icon: u32,
    pub phrase: String,
    pub high: f64,
    pub low: f64,
}

/// Multi-day forecast, in the unit system it was requested in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub units: UnitSystem,
    pub days: Vec<DayForecast>,
}

/// Current conditions plus the provider's freshness hint
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentConditions {
    pub snapshot: WeatherSnapshot,
    /// Parsed `Expiry` response header, when present and valid
    pub expires_at: Option<DateTime<Utc>>,
}

/// Unit stored in the weather result cache. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedWeatherEntry {
    pub weather: WeatherSnapshot,
    pub forecast: Option<Forecast>,
    pub location: LocationRecord,
    pub expires_at: DateTime<Utc>,
}

impl CachedWeatherEntry {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Coordinate provider errors
#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("Location service unavailable")]
    ServiceUnavailable,
}

/// Weather provider errors
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("{endpoint} returned status {status}")]
    Status { endpoint: &'static str, status: u16 },
    #[error("{0} returned no results")]
    Empty(&'static str),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Location error: {0}")]
    Location(#[from] LocationError),
    #[error("Fixture error: {0}")]
    Fixture(String),
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn location(country: &str, admin: Option<&str>) -> LocationRecord {
        LocationRecord {
            key: "349727".to_string(),
            name: "New York".to_string(),
            admin_area: admin.map(str::to_string),
            country: country.to_string(),
            time_zone: Some("America/New_York".to_string()),
            gmt_offset_hours: -5.0,
        }
    }

    #[test]
    fn test_icon_code_sunny() {
        assert_eq!(WeatherCondition::from_icon_code(1), WeatherCondition::Sunny);
        assert_eq!(WeatherCondition::from_icon_code(2), WeatherCondition::Sunny);
    }

    #[test]
    fn test_icon_code_cloudy() {
        assert_eq!(WeatherCondition::from_icon_code(7), WeatherCondition::Cloudy);
        assert_eq!(WeatherCondition::from_icon_code(8), WeatherCondition::Cloudy);
        assert_eq!(WeatherCondition::Cloudy.icon_asset(), "cloudy.svg");
    }

    #[test]
    fn test_icon_code_storms_day_and_night() {
        for code in [15, 16, 17, 41, 42] {
            assert_eq!(WeatherCondition::from_icon_code(code), WeatherCondition::Thunderstorm);
        }
    }

    #[test]
    fn test_icon_code_winter() {
        assert_eq!(WeatherCondition::from_icon_code(21), WeatherCondition::Flurries);
        assert_eq!(WeatherCondition::from_icon_code(44), WeatherCondition::Snow);
        assert_eq!(WeatherCondition::from_icon_code(26), WeatherCondition::FreezingRain);
        assert_eq!(WeatherCondition::FreezingRain.icon_asset(), "sleet.svg");
    }

    #[test]
    fn test_icon_code_night() {
        assert_eq!(WeatherCondition::from_icon_code(33), WeatherCondition::ClearNight);
        assert_eq!(WeatherCondition::from_icon_code(36), WeatherCondition::PartlyCloudyNight);
    }

    #[test]
    fn test_unmapped_icon_codes_use_default_asset() {
        for code in [0, 9, 10, 27, 28, 45, 999] {
            let condition = WeatherCondition::from_icon_code(code);
            assert_eq!(condition, WeatherCondition::Unknown, "code {code}");
            assert_eq!(condition.icon_asset(), "default.svg");
        }
    }

    #[test]
    fn test_condition_description() {
        assert_eq!(WeatherCondition::Cloudy.description(), "Cloudy");
        assert_eq!(WeatherCondition::Thunderstorm.description(), "Thunderstorms");
    }

    #[test]
    fn test_location_key_normalizes() {
        let key = LocationKey::new("  New York ");
        assert_eq!(key.as_str(), "new york");
        assert_eq!(key, LocationKey::from("new york"));
    }

    #[test]
    fn test_location_key_counts_chars() {
        assert_eq!(LocationKey::new("zü").char_len(), 2);
        assert!(LocationKey::new("   ").is_empty());
    }

    #[test]
    fn test_us_locations_are_imperial() {
        assert_eq!(location("US", Some("NY")).unit_system(), UnitSystem::Imperial);
        assert_eq!(location("CA", Some("ON")).unit_system(), UnitSystem::Metric);
    }

    #[test]
    fn test_temperature_unit_override() {
        let ny = location("US", Some("NY"));
        assert_eq!(TemperatureUnit::Auto.resolve(&ny), UnitSystem::Imperial);
        assert_eq!(TemperatureUnit::Celsius.resolve(&ny), UnitSystem::Metric);
    }

    #[test]
    fn test_display_name_includes_admin_area() {
        assert_eq!(location("US", Some("NY")).display_name(), "New York, NY");
        assert_eq!(location("US", None).display_name(), "New York");
    }

    #[test]
    fn test_coordinates_rounding() {
        let coords = Coordinates::new(43.6532, -79.3832).rounded();
        assert!((coords.latitude - 43.7).abs() < 1e-9);
        assert!((coords.longitude - -79.4).abs() < 1e-9);
        assert_eq!(Coordinates::new(43.6532, -79.3832).query_string(), "43.7,-79.4");
    }

    #[test]
    fn test_utc_offset_fractional() {
        let mut loc = location("IN", None);
        loc.gmt_offset_hours = 5.5;
        assert_eq!(loc.utc_offset().local_minus_utc(), 5 * 3600 + 1800);
    }

    #[test]
    fn test_local_time_follows_daylight_saving() {
        // Provider reports the standard offset year-round
        let loc = location("US", Some("NY"));
        let summer = "2020-07-13T18:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let winter = "2020-11-16T19:28:00Z".parse::<DateTime<Utc>>().unwrap();

        assert_eq!(loc.local_time(summer).format("%A %-I:%M %p").to_string(), "Monday 2:00 PM");
        assert_eq!(loc.local_time(summer).offset().local_minus_utc(), -4 * 3600);
        assert_eq!(loc.local_time(winter).format("%-I:%M %p").to_string(), "2:28 PM");
    }

    #[test]
    fn test_local_time_falls_back_to_offset() {
        let summer = "2020-07-13T18:00:00Z".parse::<DateTime<Utc>>().unwrap();

        let mut unknown = location("US", Some("NY"));
        unknown.time_zone = Some("Atlantis/Capital".to_string());
        assert_eq!(unknown.local_time(summer).format("%-I:%M %p").to_string(), "1:00 PM");

        let mut missing = location("IN", None);
        missing.time_zone = None;
        missing.gmt_offset_hours = 5.5;
        assert_eq!(missing.local_time(summer).format("%-I:%M %p").to_string(), "11:30 PM");
    }

    #[test]
    fn test_entry_expiry_boundary() {
        let now = Utc::now();
        let entry = CachedWeatherEntry {
            weather: WeatherSnapshot {
                text: "Cloudy".to_string(),
                icon: 7,
                metric: Reading { value: 3.9, unit: "C".to_string() },
                imperial: Reading { value: 39.0, unit: "F".to_string() },
                observed_at: now,
                link: String::new(),
            },
            forecast: None,
            location: location("US", Some("NY")),
            expires_at: now,
        };
        assert!(!entry.is_expired_at(now));
        assert!(entry.is_expired_at(now + chrono::Duration::milliseconds(1)));
    }
}
