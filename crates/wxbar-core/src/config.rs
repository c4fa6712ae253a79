use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Environment variable consulted when no API key is configured.
pub const API_KEY_ENV: &str = "WXBAR_ACCUWEATHER_KEY";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,

    /// Weather suggestion settings
    #[serde(default)]
    pub weather: WeatherConfig,
}

/// Which upstream serves location and weather data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Live AccuWeather endpoints (requires an API key)
    Accuweather,
    /// Canned payloads, never touches the network
    #[default]
    Fixture,
}

/// Temperature unit preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Auto,
    Celsius,
    Fahrenheit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub provider: ProviderKind,

    /// AccuWeather API key. Falls back to `WXBAR_ACCUWEATHER_KEY`.
    pub api_key: Option<String>,

    pub api_base_url: String,

    /// Directory or URL prefix that icon assets are served from
    pub icon_base_url: String,

    /// Lifetime of a cached weather result, in seconds
    pub cache_ttl_secs: u64,

    /// How long a failed location stays suppressed, in seconds
    pub negative_cooldown_secs: u64,

    /// Deadline the host gives each query revision, in milliseconds
    pub query_timeout_ms: u64,

    /// Per-request HTTP timeout, in seconds
    pub request_timeout_secs: u64,

    /// Explicit location keys shorter than this are never looked up
    pub min_key_len: usize,

    pub temperature_unit: TemperatureUnit,

    /// Fetch the 5-day forecast alongside current conditions
    pub forecast: bool,

    /// Answer bare "weather" queries with the device location
    pub implicit_location: bool,

    /// Fixed device coordinates used for implicit-location queries
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    /// Directory of `location.json`/`current.json`/`forecast.json`
    /// overrides for the fixture provider
    pub fixture_dir: Option<PathBuf>,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Fixture,
            api_key: None,
            // Kept in step with wxbar_weather::{ACCUWEATHER_API_BASE,
            // DEFAULT_ICON_BASE_URL, DEFAULT_TTL_SECS, DEFAULT_COOLDOWN_SECS,
            // DEFAULT_MIN_KEY_LEN}; the wxbar binary tests that they agree.
            api_base_url: "https://dataservice.accuweather.com".to_string(),
            icon_base_url: "icons".to_string(),
            cache_ttl_secs: 600,
            negative_cooldown_secs: 600,
            query_timeout_ms: 5000,
            request_timeout_secs: 10,
            min_key_len: 3,
            temperature_unit: TemperatureUnit::Auto,
            forecast: true,
            implicit_location: false,
            latitude: None,
            longitude: None,
            fixture_dir: None,
        }
    }
}

impl WeatherConfig {
    /// The configured API key, or the one from the environment.
    pub fn effective_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()))
    }

    /// Fixed coordinates, if both halves are configured.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            weather: WeatherConfig::default(),
        }
    }
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wxbar")
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = Self::default();
            config.save_to(&config_path)?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.is_file() {
            anyhow::bail!(crate::ConfigError::NotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Validate a loaded configuration, logging warnings.
    ///
    /// Returns an error if validation fails with critical errors.
    pub fn into_validated(self) -> Result<(Self, ValidationResult)> {
        let validation = self.validate();

        if !validation.is_valid() {
            anyhow::bail!(crate::ConfigError::Invalid(validation.error_summary()));
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((self, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();
        let weather = &self.weather;

        Self::validate_url(&weather.api_base_url, "weather.api_base_url", &mut result);

        if weather.provider == ProviderKind::Accuweather && weather.effective_api_key().is_none() {
            result.add_error(
                "weather.api_key",
                format!("AccuWeather provider needs an API key (or set {})", API_KEY_ENV),
            );
        }

        if weather.cache_ttl_secs == 0 {
            result.add_warning(
                "weather.cache_ttl_secs",
                "Cached weather expires immediately (0 seconds)",
            );
        }

        if weather.negative_cooldown_secs == 0 {
            result.add_warning(
                "weather.negative_cooldown_secs",
                "Failed locations are retried on every keystroke (0 seconds)",
            );
        }

        if weather.query_timeout_ms == 0 {
            result.add_error("weather.query_timeout_ms", "Query timeout must be greater than 0");
        }

        if weather.request_timeout_secs == 0 {
            result.add_error(
                "weather.request_timeout_secs",
                "Request timeout must be greater than 0",
            );
        }

        if weather.min_key_len == 0 {
            result.add_warning("weather.min_key_len", "Every keystroke may hit the network");
        }

        if let Some(lat) = weather.latitude {
            if !(-90.0..=90.0).contains(&lat) {
                result.add_error("weather.latitude", format!("Latitude out of range: {}", lat));
            }
        }
        if let Some(lon) = weather.longitude {
            if !(-180.0..=180.0).contains(&lon) {
                result.add_error("weather.longitude", format!("Longitude out of range: {}", lon));
            }
        }

        if weather.implicit_location && weather.coordinates().is_none() {
            result.add_warning(
                "weather.implicit_location",
                "No coordinates configured - bare weather queries will show nothing",
            );
        }

        if let Some(dir) = &weather.fixture_dir {
            if weather.provider == ProviderKind::Fixture && !dir.is_dir() {
                result.add_warning(
                    "weather.fixture_dir",
                    format!("{} is not a directory - using the built-in sample", dir.display()),
                );
            }
        }

        result
    }

    /// Validate a URL field
    fn validate_url(url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to the given file
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("wxbar");

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
    }

    #[test]
    fn test_default_durations() {
        let weather = WeatherConfig::default();
        assert_eq!(weather.cache_ttl_secs, 600);
        assert_eq!(weather.negative_cooldown_secs, 600);
        assert_eq!(weather.min_key_len, 3);
    }

    #[test]
    fn test_invalid_base_url() {
        let mut config = Config::default();
        config.weather.api_base_url = "not-a-url".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "weather.api_base_url"));
    }

    #[test]
    fn test_invalid_url_scheme() {
        let mut config = Config::default();
        config.weather.api_base_url = "ftp://localhost:8080".to_string();
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_live_provider_with_key_is_valid() {
        let mut config = Config::default();
        config.weather.provider = ProviderKind::Accuweather;
        config.weather.api_key = Some("secret".to_string());
        assert!(config.validate().is_valid());
    }

    #[test]
    fn test_zero_query_timeout_is_error() {
        let mut config = Config::default();
        config.weather.query_timeout_ms = 0;
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "weather.query_timeout_ms"));
    }

    #[test]
    fn test_zero_ttl_is_warning() {
        let mut config = Config::default();
        config.weather.cache_ttl_secs = 0;
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "weather.cache_ttl_secs"));
    }

    #[test]
    fn test_latitude_out_of_range() {
        let mut config = Config::default();
        config.weather.latitude = Some(123.0);
        config.weather.longitude = Some(10.0);
        assert!(!config.validate().is_valid());
    }

    #[test]
    fn test_implicit_location_without_coordinates_warns() {
        let mut config = Config::default();
        config.weather.implicit_location = true;
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "weather.implicit_location"));
    }

    #[test]
    fn test_missing_fixture_dir_warns() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();

        config.weather.fixture_dir = Some(dir.path().to_path_buf());
        assert!(config.validate().warnings.is_empty());

        config.weather.fixture_dir = Some(dir.path().join("missing"));
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "weather.fixture_dir"));
    }

    #[test]
    fn test_save_and_load_round_trip_keeps_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.weather.cache_ttl_secs = 1;
        config.weather.temperature_unit = TemperatureUnit::Celsius;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.weather.cache_ttl_secs, 1);
        assert_eq!(loaded.weather.temperature_unit, TemperatureUnit::Celsius);
    }

    #[test]
    fn test_partial_weather_section_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "config_dir = \"/tmp/wxbar\"\n[weather]\nprovider = \"accuweather\"\napi_key = \"k\"\n",
        )
        .unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.weather.provider, ProviderKind::Accuweather);
        assert_eq!(loaded.weather.negative_cooldown_secs, 600);
        assert!(loaded.weather.forecast);
    }

    #[test]
    fn test_weather_only_file_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[weather]\ncache_ttl_secs = 30\n").unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.weather.cache_ttl_secs, 30);
        assert_eq!(loaded.config_dir, default_config_dir());
        assert!(loaded.validate().is_valid());
    }

    #[test]
    fn test_empty_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.weather.query_timeout_ms, 5000);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<crate::ConfigError>(),
            Some(crate::ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn test_into_validated_rejects_errors() {
        let mut config = Config::default();
        config.weather.request_timeout_secs = 0;
        assert!(config.into_validated().is_err());
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }
}
