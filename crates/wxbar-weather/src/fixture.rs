//! Canned provider payloads, served without touching the network.
//!
//! Every query resolves to the same place. Payloads go through the same
//! parsers as live responses, so a malformed fixture fails the same way a
//! malformed upstream answer would.

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

use crate::provider::{parse_current, parse_forecast, parse_location, WeatherApi};
use crate::types::{
    Coordinates, CurrentConditions, Forecast, LocationRecord, UnitSystem, WeatherError,
};

const SAMPLE_LOCATION: &str = r#"{"Version":1,"Key":"3393497","Type":"City","Rank":55,"LocalizedName":"Waterfront Communities","EnglishName":"Waterfront Communities","PrimaryPostalCode":"M5J","Country":{"ID":"CA","LocalizedName":"Canada"},"AdministrativeArea":{"ID":"ON","LocalizedName":"Ontario","Level":1,"CountryID":"CA"},"TimeZone":{"Code":"EST","Name":"America/Toronto","GmtOffset":-5,"IsDaylightSaving":false},"GeoPosition":{"Latitude":43.645,"Longitude":-79.379}}"#;

const SAMPLE_CURRENT: &str = r#"[{"LocalObservationDateTime":"2020-11-16T14:28:00-05:00","EpochTime":1605554880,"WeatherText":"Cloudy","WeatherIcon":7,"HasPrecipitation":false,"IsDayTime":true,"Temperature":{"Metric":{"Value":3.9,"Unit":"C","UnitType":17},"Imperial":{"Value":39,"Unit":"F","UnitType":18}},"MobileLink":"http://m.accuweather.com/en/ca/waterfront-communities/m5j/current-weather/3393497?lang=en-us","Link":"http://www.accuweather.com/en/ca/waterfront-communities/m5j/current-weather/3393497?lang=en-us"}]"#;

const SAMPLE_FORECAST: &str = r#"{"DailyForecasts":[
{"EpochDate":1605528000,"Temperature":{"Minimum":{"Value":1.7,"Unit":"C"},"Maximum":{"Value":5.3,"Unit":"C"}},"Day":{"Icon":32,"IconPhrase":"Windy"}},
{"EpochDate":1605614400,"Temperature":{"Minimum":{"Value":-2.8,"Unit":"C"},"Maximum":{"Value":3.7,"Unit":"C"}},"Day":{"Icon":21,"IconPhrase":"Partly sunny w/ flurries"}},
{"EpochDate":1605700800,"Temperature":{"Minimum":{"Value":0.8,"Unit":"C"},"Maximum":{"Value":2.9,"Unit":"C"}},"Day":{"Icon":4,"IconPhrase":"Intermittent clouds"}},
{"EpochDate":1605787200,"Temperature":{"Minimum":{"Value":8.8,"Unit":"C"},"Maximum":{"Value":10.5,"Unit":"C"}},"Day":{"Icon":4,"IconPhrase":"Intermittent clouds"}},
{"EpochDate":1605873600,"Temperature":{"Minimum":{"Value":6.7,"Unit":"C"},"Maximum":{"Value":13.4,"Unit":"C"}},"Day":{"Icon":4,"IconPhrase":"Intermittent clouds"}}]}"#;

/// Provider that answers from in-memory JSON payloads.
#[derive(Debug, Clone)]
pub struct FixtureApi {
    location: Value,
    current: Value,
    forecast: Value,
}

impl FixtureApi {
    /// The built-in Toronto sample.
    pub fn sample() -> Result<Self, WeatherError> {
        Ok(Self {
            location: decode("location", SAMPLE_LOCATION)?,
            current: decode("current", SAMPLE_CURRENT)?,
            forecast: decode("forecast", SAMPLE_FORECAST)?,
        })
    }

    /// Load `location.json`, `current.json` and `forecast.json` from `dir`.
    /// Missing files fall back to the built-in sample.
    pub fn from_dir(dir: &Path) -> Result<Self, WeatherError> {
        let mut fixture = Self::sample()?;
        for (name, slot) in [
            ("location", &mut fixture.location),
            ("current", &mut fixture.current),
            ("forecast", &mut fixture.forecast),
        ] {
            let path = dir.join(format!("{}.json", name));
            if !path.exists() {
                continue;
            }
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| WeatherError::Fixture(format!("{}: {}", path.display(), e)))?;
            *slot = decode(name, &raw)?;
            tracing::debug!("Loaded {} fixture from {}", name, path.display());
        }
        Ok(fixture)
    }

    pub fn with_location(mut self, location: Value) -> Self {
        self.location = location;
        self
    }

    pub fn with_current(mut self, current: Value) -> Self {
        self.current = current;
        self
    }

    pub fn with_forecast(mut self, forecast: Value) -> Self {
        self.forecast = forecast;
        self
    }
}

fn decode(name: &str, raw: &str) -> Result<Value, WeatherError> {
    serde_json::from_str(raw).map_err(|e| WeatherError::Fixture(format!("{} fixture: {}", name, e)))
}

#[async_trait]
impl WeatherApi for FixtureApi {
    fn name(&self) -> &str {
        "AccuWeather"
    }

    async fn search_location(&self, _query: &str) -> Result<LocationRecord, WeatherError> {
        parse_location(self.location.clone())
    }

    async fn locate(&self, _coordinates: Coordinates) -> Result<LocationRecord, WeatherError> {
        parse_location(self.location.clone())
    }

    async fn current_conditions(
        &self,
        _location_key: &str,
    ) -> Result<CurrentConditions, WeatherError> {
        Ok(CurrentConditions {
            snapshot: parse_current(self.current.clone())?,
            expires_at: None,
        })
    }

    async fn daily_forecast(
        &self,
        _location_key: &str,
        units: UnitSystem,
    ) -> Result<Forecast, WeatherError> {
        parse_forecast(self.forecast.clone(), units)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[tokio::test]
    async fn test_sample_resolves_toronto() {
        let api = FixtureApi::sample().unwrap();
        let location = api.search_location("anything").await.unwrap();
        assert_eq!(location.display_name(), "Waterfront Communities, ON");
        assert_eq!(location.unit_system(), UnitSystem::Metric);

        let current = api.current_conditions(&location.key).await.unwrap();
        assert_eq!(current.snapshot.icon, 7);
        assert!(current.expires_at.is_none());

        let forecast = api.daily_forecast(&location.key, UnitSystem::Metric).await.unwrap();
        assert_eq!(forecast.days.len(), 5);
    }

    #[tokio::test]
    async fn test_empty_location_fixture_fails() {
        let api = FixtureApi::sample()
            .unwrap()
            .with_location(serde_json::json!([]));
        assert!(api.search_location("new york").await.is_err());
    }

    #[tokio::test]
    async fn test_from_dir_overrides_present_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("location.json"),
            r#"[{"Key":"349727","LocalizedName":"New York","Country":{"ID":"US"},"AdministrativeArea":{"ID":"NY"}}]"#,
        )
        .unwrap();

        let api = FixtureApi::from_dir(dir.path()).unwrap();
        let location = api.search_location("new york").await.unwrap();
        assert_eq!(location.display_name(), "New York, NY");

        // current.json was absent, so the sample is still served
        let current = api.current_conditions("349727").await.unwrap();
        assert_eq!(current.snapshot.text, "Cloudy");
    }

    #[test]
    fn test_from_dir_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("current.json"), "{not json").unwrap();
        let err = FixtureApi::from_dir(dir.path()).unwrap_err();
        assert!(matches!(err, WeatherError::Fixture(_)));
    }
}
