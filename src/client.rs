//! OpenAQ ground-station client.
//!
//! Provides blocking HTTP access to the OpenAQ v3 API. Uses reqwest with
//! rustls for TLS. Failures never escape `fetch_ground_stations`: a city that
//! keeps failing is retried a bounded number of times and then skipped.

use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::RETRY_AFTER;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::config::{City, GeoPoint, OpenAqConfig};
use crate::errors::AirError;
use crate::models::{ParameterField, RawRecord};

/// User agent string for API requests.
pub const USER_AGENT: &str = concat!("airmerge/", env!("CARGO_PKG_VERSION"));

/// Latest readings requested per station.
const LATEST_LIMIT: u32 = 10;

// ============================================================================
// OpenAQ v3 wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    results: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAqCoordinates {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAqParameter {
    name: String,
    #[serde(default)]
    units: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAqSensor {
    id: i64,
    parameter: OpenAqParameter,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAqLocation {
    id: i64,
    name: Option<String>,
    coordinates: Option<OpenAqCoordinates>,
    #[serde(default)]
    sensors: Vec<OpenAqSensor>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAqDatetime {
    utc: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenAqLatest {
    datetime: Option<OpenAqDatetime>,
    value: Option<f64>,
    sensors_id: i64,
}

/// Deserialize each page entry on its own so one bad entry costs only itself.
fn lenient_results<T: DeserializeOwned>(page: Page, what: &str) -> Vec<T> {
    page.results
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(v) => Some(v),
            Err(e) => {
                debug!("skipping malformed {}: {}", what, e);
                None
            }
        })
        .collect()
}

/// Find a wait hint like "try again in 30 seconds" in an error message.
#[must_use]
pub fn parse_rate_limit_message(msg: &str) -> Option<u64> {
    msg.match_indices("second").find_map(|(idx, _)| {
        let head = msg[..idx].trim_end();
        let mut digits: Vec<char> = head.chars().rev().take_while(char::is_ascii_digit).collect();
        digits.reverse();
        digits.into_iter().collect::<String>().parse().ok()
    })
}

/// Client for the OpenAQ v3 API.
pub struct OpenAqClient {
    client: Client,
    config: OpenAqConfig,
    /// Base unit for retry backoff
    backoff: Duration,
}

impl OpenAqClient {
    /// Create a new OpenAQ client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(config: OpenAqConfig) -> Result<Self, AirError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            config,
            backoff: Duration::from_secs(1),
        })
    }

    /// Override the retry backoff unit.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Fetch recent measurements around every configured city.
    ///
    /// Always returns; cities that fail after all retries contribute nothing.
    #[instrument(skip(self), fields(cities = self.config.cities.len()))]
    pub fn fetch_ground_stations(&self) -> Vec<RawRecord> {
        if self.config.api_key.is_none() {
            warn!("no OpenAQ API key configured, skipping ground-station fetch");
            return Vec::new();
        }

        let mut all = Vec::new();
        for city in &self.config.cities {
            info!("fetching city: {} ({}, {})", city.name, city.point.lat, city.point.lon);
            all.extend(self.fetch_city_with_retries(city));
            thread::sleep(self.config.request_pause);
        }

        info!("total measurements fetched: {}", all.len());
        all
    }

    fn fetch_city_with_retries(&self, city: &City) -> Vec<RawRecord> {
        let attempts = self.config.max_retries.max(1);
        for attempt in 1..=attempts {
            match self.fetch_city(city) {
                Ok(records) => return records,
                Err(e) => {
                    warn!("error fetching city {} (attempt {}/{}): {}", city.name, attempt, attempts, e);
                    if attempt < attempts {
                        thread::sleep(self.retry_wait(&e, attempt));
                    }
                }
            }
        }
        warn!("giving up on city {} after {} attempts", city.name, attempts);
        Vec::new()
    }

    /// Rate-limit hints win; otherwise back off linearly.
    fn retry_wait(&self, error: &AirError, attempt: u32) -> Duration {
        let hinted = match error {
            AirError::Api {
                retry_after: Some(secs),
                ..
            } => Some(*secs),
            other => parse_rate_limit_message(&other.to_string()),
        };
        match hinted {
            Some(secs) => {
                info!("rate limit detected; sleeping for {} seconds", secs + 1);
                Duration::from_secs(secs + 1)
            }
            None => self.backoff * (attempt + 1),
        }
    }

    fn fetch_city(&self, city: &City) -> Result<Vec<RawRecord>, AirError> {
        let locations = self.list_locations(city.point)?;
        info!("{}: {} locations found", city.name, locations.len());

        let mut records = Vec::new();
        for (i, location) in locations.iter().enumerate() {
            if i > 0 {
                thread::sleep(self.config.request_pause);
            }
            match self.latest(location.id) {
                Ok(latest) => records.extend(to_records(&city.name, location, &latest)),
                Err(e) => {
                    warn!(
                        "error fetching measurements for {}: {}",
                        location.name.as_deref().unwrap_or("?"),
                        e
                    );
                }
            }
        }
        Ok(records)
    }

    fn list_locations(&self, point: GeoPoint) -> Result<Vec<OpenAqLocation>, AirError> {
        let page = self.get_page(
            "/locations",
            &[
                ("coordinates", format!("{},{}", point.lat, point.lon)),
                ("radius", self.config.radius_meters.to_string()),
                ("limit", self.config.locations_per_city.to_string()),
            ],
        )?;
        Ok(lenient_results(page, "location"))
    }

    fn latest(&self, location_id: i64) -> Result<Vec<OpenAqLatest>, AirError> {
        let page = self.get_page(
            &format!("/locations/{location_id}/latest"),
            &[("limit", LATEST_LIMIT.to_string())],
        )?;
        Ok(lenient_results(page, "latest measurement"))
    }

    fn get_page(&self, path: &str, query: &[(&str, String)]) -> Result<Page, AirError> {
        let url = format!("{}{}", self.config.base_url, path);
        debug!("requesting {}", url);

        let mut request = self.client.get(&url).query(query);
        if let Some(key) = &self.config.api_key {
            request = request.header("X-API-Key", key);
        }
        let response = request.send()?;

        // Check status before parsing
        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok());
            let body = response.text().unwrap_or_default();
            return Err(AirError::Api {
                service: "OpenAQ",
                status: status.as_u16(),
                message: body,
                retry_after,
            });
        }

        let text = response.text()?;
        let page: Page = serde_json::from_str(&text)?;
        Ok(page)
    }
}

/// Pair latest readings with the station's sensor list to recover parameters.
fn to_records(city: &str, location: &OpenAqLocation, latest: &[OpenAqLatest]) -> Vec<RawRecord> {
    let coords = location.coordinates.as_ref();

    latest
        .iter()
        .filter_map(|reading| {
            let Some(sensor) = location.sensors.iter().find(|s| s.id == reading.sensors_id) else {
                debug!("no sensor {} at location {}, skipping", reading.sensors_id, location.id);
                return None;
            };
            let Some(value) = reading.value else {
                warn!(
                    "skipping malformed measurement: value=None, parameter={}",
                    sensor.parameter.name
                );
                return None;
            };

            Some(RawRecord {
                city: Some(city.to_string()),
                location: location.name.clone(),
                parameter: Some(ParameterField::Object {
                    name: Some(sensor.parameter.name.clone()),
                    units: Some(sensor.parameter.units.clone()),
                }),
                value: Some(Value::from(value)),
                unit: Some(sensor.parameter.units.clone()),
                lat: coords.and_then(|c| c.latitude),
                lon: coords.and_then(|c| c.longitude),
                date_utc: reading.datetime.as_ref().and_then(|d| d.utc.clone()),
            })
        })
        .collect()
}
