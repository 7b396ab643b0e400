//! airmerge - Merged air-quality view from satellite, ground stations and weather.
//!
//! Serves a dashboard and JSON API that combine satellite NO2 grid
//! summaries, OpenAQ station readings (scored on the US EPA AQI scale) and
//! Open-Meteo conditions. The same views are available as one-shot commands.

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::error;

mod aggregate;
mod aqi;
mod cli;
mod client;
mod config;
mod errors;
mod models;
mod output;
mod satellite;
mod server;
mod sources;
mod trend;
mod units;
mod weather;

use cli::{Cli, Command};
use models::RawRecord;
use sources::{DataSources, LiveSources};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    let config = cli.sources.to_config();
    if config.openaq.api_key.is_none() {
        tracing::warn!("OPENAQ_API_KEY not set, ground-station data will be empty");
    }

    match cli.command {
        Command::Serve(args) => cmd_serve(args, LiveSources::new(config)),
        Command::Merged(args) => {
            let sources = with_records(LiveSources::new(config), args.records.as_deref())?;
            cmd_merged(&sources, args.format)
        }
        Command::Forecast(args) => {
            let sources = with_records(LiveSources::new(config), args.records.as_deref())?;
            cmd_forecast(&sources, &args)
        }
        Command::Weather => cmd_weather(&LiveSources::new(config)),
    }
}

/// Initialize tracing subscriber.
fn init_tracing(verbose: bool, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Swap the OpenAQ fetch for a saved dump when one is given.
fn with_records(sources: LiveSources, path: Option<&std::path::Path>) -> Result<LiveSources> {
    let Some(path) = path else {
        return Ok(sources);
    };
    let records: Vec<RawRecord> = sources::load_records(path)
        .with_context(|| format!("failed to load station records from {}", path.display()))?;
    tracing::info!("replaying {} station records from {}", records.len(), path.display());
    Ok(sources.with_recorded_stations(records))
}

/// Execute the `merged` command - one fetch-aggregate-print cycle.
fn cmd_merged(sources: &dyn DataSources, format: output::Format) -> Result<()> {
    let view = aggregate::merge(sources.satellite(), sources.ground_stations());

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    output::write_merged(&mut handle, &view, format).context("failed to write merged view")?;

    Ok(())
}

/// Execute the `forecast` command - trend for one city/station.
fn cmd_forecast(sources: &dyn DataSources, args: &cli::ForecastArgs) -> Result<()> {
    let raw = sources.ground_stations();
    let points = trend::forecast(
        &raw,
        args.city.as_deref().filter(|c| !c.is_empty()),
        args.location.as_deref().filter(|l| !l.is_empty()),
        Utc::now(),
    );

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    output::write_forecast(&mut handle, &points, args.format).context("failed to write forecast")?;

    Ok(())
}

/// Execute the `weather` command.
fn cmd_weather(sources: &dyn DataSources) -> Result<()> {
    let report = sources.weather();

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    output::write_weather_human(&mut handle, report.as_ref()).context("failed to write weather")?;

    Ok(())
}

/// Execute the `serve` command - start web server.
fn cmd_serve(args: cli::ServeArgs, sources: LiveSources) -> Result<()> {
    let config = server::ServerConfig {
        port: args.port,
        host: args.host.clone(),
    };

    // Print startup message
    let url = format!("http://{}:{}", args.host, args.port);
    println!("\x1b[1m🌫  airmerge dashboard\x1b[0m");
    println!("\x1b[2m───────────────────────────────────────\x1b[0m");
    println!("  Local:   \x1b[96m{}\x1b[0m", url);
    println!("  API:     {}/api/merged", url);
    println!("\x1b[2m───────────────────────────────────────\x1b[0m");
    println!("\x1b[2mPress Ctrl+C to stop\x1b[0m\n");

    // Open browser if requested (using xdg-open/open command)
    if args.open {
        #[cfg(target_os = "linux")]
        let _ = std::process::Command::new("xdg-open").arg(&url).spawn();
        #[cfg(target_os = "macos")]
        let _ = std::process::Command::new("open").arg(&url).spawn();
        #[cfg(target_os = "windows")]
        let _ = std::process::Command::new("cmd").args(["/c", "start", &url]).spawn();
    }

    // Run the async server on tokio runtime
    tokio::runtime::Runtime::new()
        .context("failed to create tokio runtime")?
        .block_on(server::run_server(config, Arc::new(sources)))
}
