//! Open-Meteo current-conditions client.
//!
//! Humidity and pressure are not part of Open-Meteo's `current_weather`
//! block, so they are read from the hourly arrays at the current hour.

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::client::USER_AGENT;
use crate::config::WeatherConfig;
use crate::errors::AirError;

/// Current conditions at the configured point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherReport {
    pub temperature: Option<f64>,
    pub windspeed: Option<f64>,
    pub winddirection: Option<f64>,
    pub time: Option<String>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    /// Upstream `current` and `hourly` blocks, untouched
    pub raw: Value,
}

#[derive(Debug, Default, Deserialize)]
struct CurrentWeather {
    temperature: Option<f64>,
    windspeed: Option<f64>,
    winddirection: Option<f64>,
    time: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct HourlyBlock {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    relativehumidity_2m: Vec<Option<f64>>,
    #[serde(default)]
    surface_pressure: Vec<Option<f64>>,
}

/// Build a report from an Open-Meteo forecast payload.
#[must_use]
pub fn parse_report(payload: &Value) -> WeatherReport {
    let current_raw = payload.get("current_weather").cloned().unwrap_or_else(|| json!({}));
    let hourly_raw = payload.get("hourly").cloned().unwrap_or_else(|| json!({}));

    let current: CurrentWeather = serde_json::from_value(current_raw.clone()).unwrap_or_default();
    let hourly: HourlyBlock = serde_json::from_value(hourly_raw.clone()).unwrap_or_default();

    // Hour matching the current observation, else the last one.
    let idx = current
        .time
        .as_ref()
        .and_then(|t| hourly.time.iter().position(|h| h == t))
        .or_else(|| hourly.time.len().checked_sub(1));

    let pick = |series: &[Option<f64>]| idx.and_then(|i| series.get(i).copied().flatten());

    WeatherReport {
        temperature: current.temperature,
        windspeed: current.windspeed,
        winddirection: current.winddirection,
        humidity: pick(&hourly.relativehumidity_2m),
        pressure: pick(&hourly.surface_pressure),
        time: current.time,
        raw: json!({
            "current": current_raw,
            "hourly": hourly_raw,
        }),
    }
}

/// Client for the Open-Meteo forecast API.
pub struct WeatherClient {
    client: Client,
    config: WeatherConfig,
}

impl WeatherClient {
    /// Create a new weather client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(config: WeatherConfig) -> Result<Self, AirError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client, config })
    }

    /// Fetch current conditions, or `None` if anything goes wrong.
    #[instrument(skip(self), fields(lat = self.config.point.lat, lon = self.config.point.lon))]
    pub fn fetch_current(&self) -> Option<WeatherReport> {
        match self.try_fetch() {
            Ok(report) => {
                info!("weather data fetched");
                Some(report)
            }
            Err(e) => {
                warn!("weather fetch failed: {}", e);
                None
            }
        }
    }

    fn try_fetch(&self) -> Result<WeatherReport, AirError> {
        let point = self.config.point;
        debug!("requesting {}", self.config.base_url);

        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[
                ("latitude", point.lat.to_string()),
                ("longitude", point.lon.to_string()),
                ("current_weather", "true".to_string()),
                ("hourly", "relativehumidity_2m,surface_pressure".to_string()),
                ("timezone", "UTC".to_string()),
            ])
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AirError::Api {
                service: "Open-Meteo",
                status: status.as_u16(),
                message: body,
                retry_after: None,
            });
        }

        let payload: Value = serde_json::from_str(&response.text()?)?;
        if !payload.is_object() {
            return Err(AirError::InvalidResponse("expected a JSON object".into()));
        }
        Ok(parse_report(&payload))
    }
}
