//! Collaborator wiring.
//!
//! `DataSources` is the seam between the HTTP layer and the fetchers. Every
//! call fetches afresh; nothing is cached between requests.

use std::fs;
use std::path::Path;

use tracing::warn;

use crate::client::OpenAqClient;
use crate::config::AppConfig;
use crate::errors::AirError;
use crate::models::{RawRecord, SatelliteSummary};
use crate::satellite;
use crate::weather::{WeatherClient, WeatherReport};

/// The three upstream feeds. Implementations block and must not fail.
pub trait DataSources: Send + Sync + 'static {
    /// Latest satellite NO2 summary, if any.
    fn satellite(&self) -> Option<SatelliteSummary>;

    /// Raw ground-station records; empty on failure.
    fn ground_stations(&self) -> Vec<RawRecord>;

    /// Current weather, if available.
    fn weather(&self) -> Option<WeatherReport>;
}

/// Sources backed by the real fetchers.
pub struct LiveSources {
    config: AppConfig,
    /// Replaces the OpenAQ fetch when set
    recorded: Option<Vec<RawRecord>>,
}

impl LiveSources {
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            recorded: None,
        }
    }

    /// Serve a saved station dump instead of calling OpenAQ.
    #[must_use]
    pub fn with_recorded_stations(mut self, records: Vec<RawRecord>) -> Self {
        self.recorded = Some(records);
        self
    }
}

impl DataSources for LiveSources {
    fn satellite(&self) -> Option<SatelliteSummary> {
        satellite::fetch_latest(&self.config.satellite_dir)
    }

    fn ground_stations(&self) -> Vec<RawRecord> {
        if let Some(records) = &self.recorded {
            return records.clone();
        }
        match OpenAqClient::new(self.config.openaq.clone()) {
            Ok(client) => client.fetch_ground_stations(),
            Err(e) => {
                warn!("failed to create OpenAQ client: {}", e);
                Vec::new()
            }
        }
    }

    fn weather(&self) -> Option<WeatherReport> {
        match WeatherClient::new(self.config.weather.clone()) {
            Ok(client) => client.fetch_current(),
            Err(e) => {
                warn!("failed to create weather client: {}", e);
                None
            }
        }
    }
}

/// Load a saved JSON array of raw station records.
///
/// Malformed elements are skipped; only an unreadable file or invalid JSON
/// is an error.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed as JSON.
pub fn load_records(path: &Path) -> Result<Vec<RawRecord>, AirError> {
    let text = fs::read_to_string(path)?;
    let batch: serde_json::Value = serde_json::from_str(&text)?;
    Ok(RawRecord::parse_batch(batch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_load_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stations.json");
        fs::write(
            &path,
            json!([
                {"city": "London", "location": "Camden", "parameter": {"name": "no2", "units": "µg/m³"}, "value": 41.0},
                "garbage"
            ])
            .to_string(),
        )
        .unwrap();

        let records = load_records(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert!(load_records(&dir.path().join("nope.json")).is_err());
    }

    #[test]
    fn test_recorded_stations_replace_fetch() {
        let records = RawRecord::parse_batch(json!([
            {"city": "London", "parameter": "pm25", "value": 3.0}
        ]));
        let sources = LiveSources::new(AppConfig::default()).with_recorded_stations(records.clone());
        assert_eq!(sources.ground_stations(), records);
    }
}
