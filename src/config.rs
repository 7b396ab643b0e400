//! Runtime configuration for the collaborators.
//!
//! Everything the fetchers need (coordinates, keys, endpoints, retry limits)
//! is carried here and handed to them explicitly.

use std::path::PathBuf;
use std::time::Duration;

/// Default OpenAQ v3 endpoint.
pub const OPENAQ_BASE_URL: &str = "https://api.openaq.org/v3";

/// Default Open-Meteo forecast endpoint.
pub const OPEN_METEO_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Maximum search radius accepted by OpenAQ (meters).
pub const MAX_RADIUS_METERS: u32 = 25_000;

/// A latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    fn validate(self) -> Result<Self, String> {
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(format!("latitude {} out of range [-90, 90]", self.lat));
        }
        if !(-180.0..=180.0).contains(&self.lon) {
            return Err(format!("longitude {} out of range [-180, 180]", self.lon));
        }
        Ok(self)
    }
}

impl std::str::FromStr for GeoPoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() != 2 {
            return Err(format!(
                "coordinates require 2 values (lat,lon), got {}",
                parts.len()
            ));
        }

        let vals: Result<Vec<f64>, _> = parts.iter().map(|p| p.trim().parse::<f64>()).collect();
        let vals = vals.map_err(|e| format!("invalid number in coordinates: {e}"))?;

        Self {
            lat: vals[0],
            lon: vals[1],
        }
        .validate()
    }
}

/// A named query point for the ground-station search.
#[derive(Debug, Clone, PartialEq)]
pub struct City {
    pub name: String,
    pub point: GeoPoint,
}

impl std::str::FromStr for City {
    type Err = String;

    /// Parses `Name:lat,lon`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, coords) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("city requires Name:lat,lon, got '{s}'"))?;
        let name = name.trim();
        if name.is_empty() {
            return Err("city name must not be empty".to_string());
        }

        Ok(Self {
            name: name.to_string(),
            point: coords.parse()?,
        })
    }
}

/// The fixed query points used when none are configured.
#[must_use]
pub fn default_cities() -> Vec<City> {
    [
        ("New York", 40.7128, -74.0060),
        ("Los Angeles", 34.0522, -118.2437),
        ("London", 51.5074, -0.1278),
    ]
    .into_iter()
    .map(|(name, lat, lon)| City {
        name: name.to_string(),
        point: GeoPoint { lat, lon },
    })
    .collect()
}

/// Settings for the OpenAQ ground-station fetcher.
#[derive(Debug, Clone)]
pub struct OpenAqConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub cities: Vec<City>,
    pub radius_meters: u32,
    /// Stations requested per city
    pub locations_per_city: u32,
    /// Attempts per city before giving up on it
    pub max_retries: u32,
    /// Pause between station requests
    pub request_pause: Duration,
    pub timeout: Duration,
}

impl Default for OpenAqConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: OPENAQ_BASE_URL.to_string(),
            cities: default_cities(),
            radius_meters: MAX_RADIUS_METERS,
            locations_per_city: 5,
            max_retries: 5,
            request_pause: Duration::from_secs(2),
            timeout: Duration::from_secs(12),
        }
    }
}

/// Settings for the weather fetcher.
#[derive(Debug, Clone)]
pub struct WeatherConfig {
    pub base_url: String,
    pub point: GeoPoint,
    pub timeout: Duration,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: OPEN_METEO_URL.to_string(),
            point: GeoPoint {
                lat: 40.7128,
                lon: -74.0060,
            },
            timeout: Duration::from_secs(10),
        }
    }
}

/// Complete collaborator configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub openaq: OpenAqConfig,
    pub weather: WeatherConfig,
    /// Directory holding satellite grid snapshots
    pub satellite_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openaq: OpenAqConfig::default(),
            weather: WeatherConfig::default(),
            satellite_dir: PathBuf::from("./data"),
        }
    }
}
