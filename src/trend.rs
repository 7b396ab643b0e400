//! AQI trend projection.
//!
//! This is a placeholder, not a forecasting model: the projection echoes its
//! input series point for point. When there is nothing to echo it returns a
//! synthetic 24-hour ramp (`50, 51, … 73`) starting at the call time, so the
//! dashboard chart always has something to draw. Callers must not read
//! predictive meaning into either output.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::aqi;
use crate::errors::AirError;
use crate::models::{ForecastPoint, Measurement, Pollutant, RawRecord, measurements_from};

/// Number of points in the synthetic series.
pub const FALLBACK_HOURS: u16 = 24;

/// First value of the synthetic series.
pub const FALLBACK_BASE: u16 = 50;

/// One AQI observation in a trend series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendSample {
    pub observed_at: DateTime<Utc>,
    pub value: f64,
    pub pollutant: Pollutant,
}

/// Build a chronologically sorted AQI series for an optional city/station.
///
/// Readings without a timestamp or without a computable AQI are dropped.
#[must_use]
pub fn trend_series(
    measurements: &[Measurement],
    city: Option<&str>,
    station: Option<&str>,
) -> Vec<TrendSample> {
    let mut series: Vec<TrendSample> = measurements
        .iter()
        .filter(|m| city.is_none_or(|c| m.city == c))
        .filter(|m| station.is_none_or(|s| m.station == s))
        .filter_map(|m| {
            let observed_at = m.observed_at?;
            let index = aqi::aqi_for(m.pollutant, m.value, &m.unit)?;
            Some(TrendSample {
                observed_at,
                value: f64::from(index),
                pollutant: m.pollutant,
            })
        })
        .collect();

    // Stable, so readings at the same instant keep fetch order.
    series.sort_by_key(|s| s.observed_at);
    series
}

/// The synthetic ramp: one point per hour from `now`.
#[must_use]
pub fn fallback(now: DateTime<Utc>) -> Vec<ForecastPoint> {
    (0..FALLBACK_HOURS)
        .map(|i| ForecastPoint {
            ds: (now + Duration::hours(i64::from(i))).to_rfc3339(),
            yhat: f64::from(FALLBACK_BASE + i),
            parameter_name: None,
        })
        .collect()
}

fn echo(series: &[TrendSample]) -> Result<Vec<ForecastPoint>, AirError> {
    series
        .iter()
        .map(|s| {
            if !s.value.is_finite() {
                return Err(AirError::Projection(format!(
                    "non-finite value {} at {}",
                    s.value, s.observed_at
                )));
            }
            Ok(ForecastPoint {
                ds: s.observed_at.to_rfc3339(),
                yhat: s.value,
                parameter_name: Some(s.pollutant),
            })
        })
        .collect()
}

/// Project a trend series. Never fails: an empty series or an unusable
/// input falls back to the synthetic ramp.
#[must_use]
pub fn project(series: &[TrendSample], now: DateTime<Utc>) -> Vec<ForecastPoint> {
    if series.is_empty() {
        info!("no usable AQI readings for trend, returning demo series");
        return fallback(now);
    }

    match echo(series) {
        Ok(points) => {
            debug!("trend ready with {} points", points.len());
            points
        }
        Err(e) => {
            warn!("trend projection failed, returning demo series: {}", e);
            fallback(now)
        }
    }
}

/// Trend for the raw station records, optionally narrowed to one city and
/// station.
#[must_use]
pub fn forecast(
    raw: &[RawRecord],
    city: Option<&str>,
    station: Option<&str>,
    now: DateTime<Utc>,
) -> Vec<ForecastPoint> {
    let measurements = measurements_from(raw);
    let series = trend_series(&measurements, city, station);
    info!(
        "using {} data points for trend (city={:?}, location={:?})",
        series.len(),
        city,
        station
    );
    project(&series, now)
}
