use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

use wxbar_core::{AppError, Config, ConfigError, ProviderKind, ReqwestErrorExt, WeatherConfig};
use wxbar_weather::{
    AccuWeatherClient, CachedCoordinates, CoordinateSource, Coordinates, FixedCoordinates,
    FixtureApi, GateSettings, NegativeCache, NoCoordinates, Resolver, ResolverSettings,
    SuggestionBuilder, WeatherApi, WeatherCache, WeatherGate, WeatherSuggester,
};

/// Longest TTL or cooldown accepted from configuration.
const MAX_WINDOW_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Parser)]
#[command(name = "wxbar", version, about = "Weather suggestions for address-bar queries")]
struct Cli {
    /// Config file (defaults to <config dir>/wxbar/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    /// Query revisions, in typing order. Read line by line from stdin when omitted.
    queries: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = wxbar_core::init() {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("{}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .map_err(config_error)?;
    let (config, _) = config.into_validated().map_err(config_error)?;

    tracing::info!(
        "wxbar started (provider: {:?}, config: {})",
        config.weather.provider,
        config.config_dir.display()
    );

    let suggester = build_suggester(&config.weather)?;

    if cli.queries.is_empty() {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            answer(&suggester, &line, cli.pretty).await?;
        }
    } else {
        for query in &cli.queries {
            answer(&suggester, query, cli.pretty).await?;
        }
    }

    Ok(())
}

async fn answer(suggester: &WeatherSuggester, query: &str, pretty: bool) -> Result<(), AppError> {
    let output = match suggester.query(query).await {
        Ok(suggestion) => serde_json::json!({ "query": query, "suggestion": suggestion }),
        Err(reason) => {
            tracing::debug!("No suggestion for {:?}: {}", query, reason);
            serde_json::json!({ "query": query, "inactive": reason.to_string() })
        }
    };

    let rendered = if pretty {
        serde_json::to_string_pretty(&output)
    } else {
        serde_json::to_string(&output)
    }
    .context("Failed to render suggestion")?;
    println!("{}", rendered);
    Ok(())
}

fn build_suggester(config: &WeatherConfig) -> Result<WeatherSuggester, AppError> {
    let api = build_api(config, config.effective_api_key())?;
    let temperature_unit = temperature_unit(config.temperature_unit);

    let coordinates: Arc<dyn CoordinateSource> = match config.coordinates() {
        Some((latitude, longitude)) => Arc::new(CachedCoordinates::new(FixedCoordinates(
            Coordinates::new(latitude, longitude),
        ))),
        None => Arc::new(NoCoordinates),
    };

    let builder = SuggestionBuilder::new(&config.icon_base_url, temperature_unit)
        .with_provider_name(api.name());

    let resolver = Resolver::new(
        api,
        coordinates,
        ResolverSettings {
            ttl: window(config.cache_ttl_secs),
            fetch_forecast: config.forecast,
            temperature_unit,
        },
    );

    let gate = WeatherGate::new(
        resolver,
        Arc::new(WeatherCache::new()),
        Arc::new(NegativeCache::new(window(config.negative_cooldown_secs))),
        GateSettings {
            min_key_len: config.min_key_len,
            implicit_location: config.implicit_location,
        },
    );

    Ok(WeatherSuggester::new(
        Arc::new(gate),
        builder,
        Duration::from_millis(config.query_timeout_ms),
    ))
}

fn build_api(
    config: &WeatherConfig,
    api_key: Option<String>,
) -> Result<Arc<dyn WeatherApi>, AppError> {
    match config.provider {
        ProviderKind::Fixture => {
            let fixture = match &config.fixture_dir {
                Some(dir) if dir.is_dir() => FixtureApi::from_dir(dir),
                _ => FixtureApi::sample(),
            }
            .map_err(|e| wxbar_core::WeatherError::Fixture(e.to_string()))?;
            Ok(Arc::new(fixture))
        }
        ProviderKind::Accuweather => {
            let api_key = api_key.ok_or(wxbar_core::WeatherError::InvalidApiKey)?;
            let client = AccuWeatherClient::with_base_url(
                &config.api_base_url,
                api_key,
                Duration::from_secs(config.request_timeout_secs),
            )
            .map_err(|e| match e {
                wxbar_weather::WeatherError::Network(e) => {
                    AppError::Network(e.into_network_error())
                }
                other => wxbar_core::WeatherError::ApiError(other.to_string()).into(),
            })?;
            Ok(Arc::new(client))
        }
    }
}

fn temperature_unit(unit: wxbar_core::TemperatureUnit) -> wxbar_weather::TemperatureUnit {
    match unit {
        wxbar_core::TemperatureUnit::Auto => wxbar_weather::TemperatureUnit::Auto,
        wxbar_core::TemperatureUnit::Celsius => wxbar_weather::TemperatureUnit::Celsius,
        wxbar_core::TemperatureUnit::Fahrenheit => wxbar_weather::TemperatureUnit::Fahrenheit,
    }
}

fn window(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(secs.min(MAX_WINDOW_SECS) as i64)
}

fn config_error(e: anyhow::Error) -> AppError {
    match e.downcast::<ConfigError>() {
        Ok(e) => AppError::Config(e),
        Err(e) => AppError::Other(e),
    }
}
