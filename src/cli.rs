//! Command-line interface definitions.
//!
//! Uses clap derive API for argument parsing. Collaborator settings fall
//! back to environment variables so the server can be configured without
//! flags.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::config::{
    AppConfig, City, GeoPoint, MAX_RADIUS_METERS, OPEN_METEO_URL, OPENAQ_BASE_URL, OpenAqConfig,
    WeatherConfig, default_cities,
};
use crate::output::Format;

/// Merged air-quality view from satellite, ground stations and weather.
#[derive(Parser, Debug)]
#[command(name = "airmerge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to run
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub sources: SourceArgs,

    /// Enable verbose debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    pub quiet: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the dashboard and JSON API
    Serve(ServeArgs),

    /// Print the merged view once and exit
    Merged(MergedArgs),

    /// Print the AQI trend for a city/station
    Forecast(ForecastArgs),

    /// Print current weather conditions
    Weather,
}

/// Upstream settings shared by every command.
#[derive(Args, Debug)]
pub struct SourceArgs {
    /// OpenAQ API key (ground stations are skipped without one)
    #[arg(long, env = "OPENAQ_API_KEY", global = true, hide_env_values = true)]
    pub openaq_api_key: Option<String>,

    /// OpenAQ API base URL
    #[arg(long, env = "OPENAQ_BASE_URL", global = true, default_value = OPENAQ_BASE_URL)]
    pub openaq_base_url: String,

    /// Station search radius in meters (capped at 25000)
    #[arg(long, env = "OPENAQ_RADIUS_METERS", global = true, default_value_t = MAX_RADIUS_METERS)]
    pub radius_meters: u32,

    /// Attempts per city before giving up on it
    #[arg(long, env = "OPENAQ_MAX_RETRIES", global = true, default_value = "5")]
    pub max_retries: u32,

    /// OpenAQ request timeout in seconds
    #[arg(long, env = "OPENAQ_TIMEOUT_SECONDS", global = true, default_value = "12")]
    pub timeout_seconds: u64,

    /// Query point as Name:lat,lon (repeatable; defaults to New York, Los Angeles, London)
    #[arg(long = "city", global = true, value_parser = parse_city)]
    pub cities: Vec<City>,

    /// Directory holding satellite grid snapshots
    #[arg(long, env = "AIRMERGE_DATA_DIR", global = true, default_value = "./data")]
    pub data_dir: PathBuf,

    /// Open-Meteo forecast endpoint
    #[arg(long, env = "OPEN_METEO_URL", global = true, default_value = OPEN_METEO_URL)]
    pub open_meteo_url: String,

    /// Weather point as lat,lon
    #[arg(long, global = true, default_value = "40.7128,-74.0060", value_parser = parse_point)]
    pub weather_at: GeoPoint,
}

impl SourceArgs {
    /// Assemble the collaborator configuration.
    #[must_use]
    pub fn to_config(&self) -> AppConfig {
        let radius_meters = self.radius_meters.min(MAX_RADIUS_METERS);
        if radius_meters != self.radius_meters {
            tracing::warn!("radius clamped to maximum of {} meters", MAX_RADIUS_METERS);
        }

        let cities = if self.cities.is_empty() {
            default_cities()
        } else {
            self.cities.clone()
        };

        AppConfig {
            openaq: OpenAqConfig {
                api_key: self.openaq_api_key.clone().filter(|k| !k.is_empty()),
                base_url: self.openaq_base_url.clone(),
                cities,
                radius_meters,
                max_retries: self.max_retries.max(1),
                timeout: Duration::from_secs(self.timeout_seconds),
                ..OpenAqConfig::default()
            },
            weather: WeatherConfig {
                base_url: self.open_meteo_url.clone(),
                point: self.weather_at,
                ..WeatherConfig::default()
            },
            satellite_dir: self.data_dir.clone(),
        }
    }
}

/// Arguments for the `serve` command.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(long, short = 'p', default_value = "5000")]
    pub port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Open browser automatically
    #[arg(long)]
    pub open: bool,
}

/// Arguments for the `merged` command.
#[derive(Parser, Debug)]
pub struct MergedArgs {
    /// Replay a saved JSON array of raw station records instead of calling OpenAQ
    #[arg(long)]
    pub records: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', default_value = "human", value_parser = parse_format)]
    pub format: Format,
}

/// Arguments for the `forecast` command.
#[derive(Parser, Debug)]
pub struct ForecastArgs {
    /// Only readings from this city
    #[arg(long = "for-city")]
    pub city: Option<String>,

    /// Only readings from this station
    #[arg(long)]
    pub location: Option<String>,

    /// Replay a saved JSON array of raw station records instead of calling OpenAQ
    #[arg(long)]
    pub records: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', default_value = "human", value_parser = parse_format)]
    pub format: Format,
}

/// Parse an output format from string.
fn parse_format(s: &str) -> Result<Format, String> {
    s.parse()
}

/// Parse a query city from string.
fn parse_city(s: &str) -> Result<City, String> {
    s.parse()
}

/// Parse a coordinate pair from string.
fn parse_point(s: &str) -> Result<GeoPoint, String> {
    s.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::try_parse_from(["airmerge", "serve"]).unwrap();
        match cli.command {
            Command::Serve(args) => {
                assert_eq!(args.port, 5000);
                assert_eq!(args.host, "127.0.0.1");
                assert!(!args.open);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_config_from_flags() {
        let cli = Cli::try_parse_from([
            "airmerge",
            "merged",
            "--city",
            "Paris:48.8566,2.3522",
            "--city",
            "Delhi:28.61,77.21",
            "--radius-meters",
            "90000",
            "--openaq-api-key",
            "secret",
            "--data-dir",
            "/tmp/tempo",
            "--format",
            "json",
        ])
        .unwrap();

        let config = cli.sources.to_config();
        assert_eq!(config.openaq.cities.len(), 2);
        assert_eq!(config.openaq.cities[1].name, "Delhi");
        assert_eq!(config.openaq.radius_meters, MAX_RADIUS_METERS);
        assert_eq!(config.openaq.api_key.as_deref(), Some("secret"));
        assert_eq!(config.satellite_dir, PathBuf::from("/tmp/tempo"));

        match cli.command {
            Command::Merged(args) => assert_eq!(args.format, Format::Json),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_forecast_args() {
        let cli = Cli::try_parse_from([
            "airmerge",
            "forecast",
            "--for-city",
            "London",
            "--location",
            "Camden",
        ])
        .unwrap();
        match cli.command {
            Command::Forecast(args) => {
                assert_eq!(args.city.as_deref(), Some("London"));
                assert_eq!(args.location.as_deref(), Some("Camden"));
                assert!(args.records.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_bad_city_rejected() {
        assert!(Cli::try_parse_from(["airmerge", "weather", "--city", "Nowhere"]).is_err());
    }
}
