//! Upstream weather data: the `WeatherApi` seam and the AccuWeather client.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

use crate::types::{
    Coordinates, CurrentConditions, DayForecast, Forecast, LocationRecord, Reading, UnitSystem,
    WeatherError, WeatherSnapshot,
};

pub const ACCUWEATHER_API_BASE: &str = "https://dataservice.accuweather.com";
const USER_AGENT: &str = concat!("wxbar/", env!("CARGO_PKG_VERSION"));
const EXPIRY_HEADER: &str = "Expiry";

/// Location search and weather endpoints the resolution pipeline depends on.
#[async_trait]
pub trait WeatherApi: Send + Sync {
    /// Attribution shown next to the data
    fn name(&self) -> &str;

    /// First (highest-ranked) match for free text.
    async fn search_location(&self, query: &str) -> Result<LocationRecord, WeatherError>;

    /// First match for a coordinate pair.
    async fn locate(&self, coordinates: Coordinates) -> Result<LocationRecord, WeatherError>;

    async fn current_conditions(&self, location_key: &str)
        -> Result<CurrentConditions, WeatherError>;

    /// Five-day daily forecast in the requested units.
    async fn daily_forecast(
        &self,
        location_key: &str,
        units: UnitSystem,
    ) -> Result<Forecast, WeatherError>;
}

/// AccuWeather REST client.
#[derive(Debug, Clone)]
pub struct AccuWeatherClient {
    client: Arc<Client>,
    base_url: String,
    api_key: String,
}

impl AccuWeatherClient {
    /// Client for `base_url`: normally `ACCUWEATHER_API_BASE`, or a proxy,
    /// or a mock server in tests.
    pub fn with_base_url(
        base_url: &str,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client: Arc::new(client),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    async fn get(
        &self,
        endpoint: &'static str,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<Response, WeatherError> {
        let url = format!("{}/{}", self.base_url, path);

        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("apikey", self.api_key.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::warn!("{} returned status {}", endpoint, response.status());
            return Err(WeatherError::Status {
                endpoint,
                status: response.status().as_u16(),
            });
        }

        Ok(response)
    }

    async fn json(response: Response) -> Result<Value, WeatherError> {
        response
            .json::<Value>()
            .await
            .map_err(|e| WeatherError::Parse(e.to_string()))
    }
}

#[async_trait]
impl WeatherApi for AccuWeatherClient {
    fn name(&self) -> &str {
        "AccuWeather"
    }

    #[instrument(skip(self), level = "debug")]
    async fn search_location(&self, query: &str) -> Result<LocationRecord, WeatherError> {
        let response = self
            .get("location search", "locations/v1/search.json", &[("q", query)])
            .await?;
        // TODO: rank by distance from the user instead of taking the provider's first match.
        parse_location(Self::json(response).await?)
    }

    #[instrument(skip(self), level = "debug")]
    async fn locate(&self, coordinates: Coordinates) -> Result<LocationRecord, WeatherError> {
        let q = coordinates.query_string();
        let response = self
            .get(
                "geoposition search",
                "locations/v1/cities/geoposition/search.json",
                &[("q", q.as_str())],
            )
            .await?;
        parse_location(Self::json(response).await?)
    }

    #[instrument(skip(self), level = "debug")]
    async fn current_conditions(
        &self,
        location_key: &str,
    ) -> Result<CurrentConditions, WeatherError> {
        let path = format!("currentconditions/v1/{}.json", location_key);
        let response = self.get("current conditions", &path, &[]).await?;

        let expires_at = response
            .headers()
            .get(EXPIRY_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_expiry);

        let snapshot = parse_current(Self::json(response).await?)?;
        Ok(CurrentConditions {
            snapshot,
            expires_at,
        })
    }

    #[instrument(skip(self), level = "debug")]
    async fn daily_forecast(
        &self,
        location_key: &str,
        units: UnitSystem,
    ) -> Result<Forecast, WeatherError> {
        let path = format!("forecasts/v1/daily/5day/{}", location_key);
        let metric = if units.is_metric() { "true" } else { "false" };
        let response = self
            .get("daily forecast", &path, &[("metric", metric)])
            .await?;
        parse_forecast(Self::json(response).await?, units)
    }
}

/// Parse an `Expiry` header. AccuWeather sends RFC 2822 dates; RFC 3339 is
/// accepted too. Anything else is ignored.
pub fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiLocation {
    key: String,
    localized_name: String,
    country: ApiArea,
    administrative_area: Option<ApiArea>,
    time_zone: Option<ApiTimeZone>,
}

#[derive(Debug, Deserialize)]
struct ApiArea {
    #[serde(rename = "ID")]
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiTimeZone {
    name: Option<String>,
    #[serde(default)]
    gmt_offset: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiCurrent {
    epoch_time: i64,
    weather_text: String,
    weather_icon: Option<u32>,
    temperature: ApiMetricImperial,
    link: Option<String>,
    mobile_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiMetricImperial {
    metric: ApiValue,
    imperial: ApiValue,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiValue {
    value: f64,
    unit: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiForecast {
    daily_forecasts: Vec<ApiDay>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiDay {
    epoch_date: i64,
    temperature: ApiRange,
    day: ApiDayPart,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiRange {
    minimum: ApiValue,
    maximum: ApiValue,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiDayPart {
    icon: u32,
    icon_phrase: String,
}

/// Search endpoints answer with an array; geoposition sometimes with a bare object.
fn first_item(body: Value, what: &'static str) -> Result<Value, WeatherError> {
    match body {
        Value::Array(items) => items.into_iter().next().ok_or(WeatherError::Empty(what)),
        Value::Object(_) => Ok(body),
        Value::Null => Err(WeatherError::Empty(what)),
        other => Err(WeatherError::Parse(format!("unexpected {} payload: {}", what, other))),
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, WeatherError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| WeatherError::Parse(format!("timestamp out of range: {}", secs)))
}

pub(crate) fn parse_location(body: Value) -> Result<LocationRecord, WeatherError> {
    let item = first_item(body, "location search")?;
    let api: ApiLocation =
        serde_json::from_value(item).map_err(|e| WeatherError::Parse(e.to_string()))?;

    if api.key.is_empty() {
        return Err(WeatherError::Empty("location search"));
    }

    let (time_zone, gmt_offset_hours) = match api.time_zone {
        Some(tz) => (tz.name, tz.gmt_offset),
        None => (None, 0.0),
    };

    Ok(LocationRecord {
        key: api.key,
        name: api.localized_name,
        admin_area: api.administrative_area.map(|a| a.id),
        country: api.country.id,
        time_zone,
        gmt_offset_hours,
    })
}

pub(crate) fn parse_current(body: Value) -> Result<WeatherSnapshot, WeatherError> {
    let item = first_item(body, "current conditions")?;
    let api: ApiCurrent =
        serde_json::from_value(item).map_err(|e| WeatherError::Parse(e.to_string()))?;

    Ok(WeatherSnapshot {
        text: api.weather_text,
        icon: api.weather_icon.unwrap_or(0),
        metric: Reading {
            value: api.temperature.metric.value,
            unit: api.temperature.metric.unit,
        },
        imperial: Reading {
            value: api.temperature.imperial.value,
            unit: api.temperature.imperial.unit,
        },
        observed_at: timestamp(api.epoch_time)?,
        link: api.link.or(api.mobile_link).unwrap_or_default(),
    })
}

pub(crate) fn parse_forecast(body: Value, units: UnitSystem) -> Result<Forecast, WeatherError> {
    let api: ApiForecast =
        serde_json::from_value(body).map_err(|e| WeatherError::Parse(e.to_string()))?;

    if api.daily_forecasts.is_empty() {
        return Err(WeatherError::Empty("daily forecast"));
    }

    let days = api
        .daily_forecasts
        .into_iter()
        .map(|day| {
            Ok(DayForecast {
                date: timestamp(day.epoch_date)?,
                icon: day.day.icon,
                phrase: day.day.icon_phrase,
                high: day.temperature.maximum.value,
                low: day.temperature.minimum.value,
            })
        })
        .collect::<Result<Vec<_>, WeatherError>>()?;

    Ok(Forecast { units, days })
}
