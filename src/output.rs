//! Output formatters for the one-shot commands.
//!
//! Supports human-readable (with colors) and pretty JSON formats.

use std::io::{self, Write};

use serde::Serialize;

use crate::aqi::AqiCategory;
use crate::models::{ForecastPoint, LocationSummary, MergedView};
use crate::weather::WeatherReport;

// ANSI color codes
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GRAY: &str = "\x1b[90m";

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Human-readable terminal output (default)
    #[default]
    Human,
    /// Pretty-printed JSON
    Json,
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            _ => Err(format!("unknown format: {s} (expected: human, json)")),
        }
    }
}

/// AQI with its category color, or a gray placeholder.
fn format_aqi(aqi: Option<u16>) -> String {
    match aqi {
        Some(value) => {
            let category = AqiCategory::from_aqi(value);
            let color = category.ansi_color();
            format!("{color}{BOLD}{value:>4}{RESET} {color}{}{RESET}", category.label())
        }
        None => format!("{GRAY}   –  N/A{RESET}"),
    }
}

fn write_location<W: Write>(writer: &mut W, loc: &LocationSummary) -> io::Result<()> {
    let dominant = loc.dominant_pollutant.map_or("–", |p| p.as_str());
    writeln!(
        writer,
        "{:<16} │ {:<32} │ {:<5} │ {}",
        loc.city,
        loc.location,
        dominant,
        format_aqi(loc.aqi)
    )?;
    for reading in &loc.measurements {
        writeln!(
            writer,
            "{DIM}{:<16}   {:<6} {:>10} {:<8} {}{RESET}",
            "",
            reading.parameter.as_str(),
            reading.value,
            reading.unit,
            reading.date_utc
        )?;
    }
    Ok(())
}

/// Write the merged view as a colored station table.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_merged_human<W: Write>(writer: &mut W, view: &MergedView) -> io::Result<()> {
    let overall = AqiCategory::from_aqi(view.overall_aqi);
    writeln!(
        writer,
        "{BOLD}Overall AQI:{RESET} {}{BOLD}{}{RESET} ({})",
        overall.ansi_color(),
        view.overall_aqi,
        overall.label()
    )?;
    writeln!(
        writer,
        "{DIM}Satellite NO₂ mean {:.3e} │ max {:.3e} │ min {:.3e} │ grid {}×{}{RESET}",
        view.tempo.no2_mean,
        view.tempo.no2_max,
        view.tempo.no2_min,
        view.tempo.lat.len(),
        view.tempo.lon.len()
    )?;
    writeln!(
        writer,
        "{DIM}─────────────────────────────────────────────────────────────────────────────{RESET}"
    )?;

    if view.openaq.is_empty() {
        writeln!(writer, "{GRAY}no ground-station data{RESET}")?;
    }
    for loc in &view.openaq {
        write_location(writer, loc)?;
    }
    Ok(())
}

/// Write trend points one per line.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_forecast_human<W: Write>(writer: &mut W, points: &[ForecastPoint]) -> io::Result<()> {
    for point in points {
        let pollutant = point.parameter_name.map_or("", |p| p.as_str());
        writeln!(writer, "{} │ {:>6.1} │ {pollutant}", point.ds, point.yhat)?;
    }
    Ok(())
}

/// Write current conditions.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_weather_human<W: Write>(writer: &mut W, report: Option<&WeatherReport>) -> io::Result<()> {
    let Some(report) = report else {
        return writeln!(writer, "{GRAY}weather unavailable{RESET}");
    };

    let show = |v: Option<f64>, unit: &str| v.map_or_else(|| "?".to_string(), |v| format!("{v}{unit}"));
    writeln!(
        writer,
        "{BOLD}{}{RESET} │ {} │ wind {} from {} │ humidity {} │ pressure {}",
        report.time.as_deref().unwrap_or("unknown time"),
        show(report.temperature, " °C"),
        show(report.windspeed, " km/h"),
        show(report.winddirection, "°"),
        show(report.humidity, " %"),
        show(report.pressure, " hPa")
    )
}

/// Write any serializable value as pretty JSON.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_json<W: Write, T: Serialize + ?Sized>(writer: &mut W, value: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{json}")
}

/// Write the merged view in the specified format.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_merged<W: Write>(writer: &mut W, view: &MergedView, format: Format) -> io::Result<()> {
    match format {
        Format::Human => write_merged_human(writer, view),
        Format::Json => write_json(writer, view),
    }
}

/// Write trend points in the specified format.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_forecast<W: Write>(writer: &mut W, points: &[ForecastPoint], format: Format) -> io::Result<()> {
    match format {
        Format::Human => write_forecast_human(writer, points),
        Format::Json => write_json(writer, points),
    }
}
