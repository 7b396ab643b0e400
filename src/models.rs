//! Data models shared by the collaborators and the AQI pipeline.
//!
//! `RawRecord` is the wire shape of a ground-station measurement as the
//! fetcher hands it over (and as `/api/openaq` echoes it). It is converted
//! once into a `Measurement`; nothing downstream looks at the raw shape.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Placeholder for a missing city or station name.
pub const UNKNOWN: &str = "Unknown";

/// Pollutants with an AQI breakpoint table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pollutant {
    Pm25,
    No2,
    Co,
    Pm10,
    O3,
}

impl Pollutant {
    pub const ALL: [Self; 5] = [Self::Pm25, Self::No2, Self::Co, Self::Pm10, Self::O3];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pm25 => "pm25",
            Self::No2 => "no2",
            Self::Co => "co",
            Self::Pm10 => "pm10",
            Self::O3 => "o3",
        }
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Pollutant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pm25" => Ok(Self::Pm25),
            "no2" => Ok(Self::No2),
            "co" => Ok(Self::Co),
            "pm10" => Ok(Self::Pm10),
            "o3" => Ok(Self::O3),
            _ => Err(format!("unsupported pollutant: {s}")),
        }
    }
}

/// Parse the timestamp spellings seen in station data.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]+HH:MM`, and naive ISO-8601
/// (taken as UTC).
#[must_use]
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

// ============================================================================
// Raw ground-station records
// ============================================================================

/// The `parameter` field of a raw record.
///
/// Either a `{name, units}` object or a text rendering such as
/// `ParameterBase(id=2, name='pm25', units='µg/m³')` or plain `pm25`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterField {
    Object {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        units: Option<String>,
    },
    Text(String),
}

impl ParameterField {
    /// Lowercased parameter name, if one can be recovered.
    #[must_use]
    pub fn name(&self) -> Option<String> {
        match self {
            Self::Object { name, .. } => name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_lowercase),
            Self::Text(text) => name_from_text(text),
        }
    }

    fn units(&self) -> Option<&str> {
        match self {
            Self::Object { units, .. } => units.as_deref().filter(|u| !u.is_empty()),
            Self::Text(_) => None,
        }
    }
}

fn is_name_token(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '.')
}

/// Extract `name='…'` from a rendered parameter object, or accept a bare token.
fn name_from_text(text: &str) -> Option<String> {
    const KEY: &str = "name='";

    for (start, _) in text.match_indices(KEY) {
        // Skip `display_name='…'` and similar.
        let preceded_by_ident = text[..start]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
        if preceded_by_ident {
            continue;
        }
        let rest = &text[start + KEY.len()..];
        let name = &rest[..rest.find('\'')?];
        return is_name_token(name).then(|| name.to_lowercase());
    }

    let bare = text.trim();
    is_name_token(bare).then(|| bare.to_lowercase())
}

/// Accept numbers or numeric strings; anything else becomes `None`.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// One ground-station measurement as delivered by the fetcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub parameter: Option<ParameterField>,
    /// Kept untyped so a non-numeric value only disqualifies this record.
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub lon: Option<f64>,
    #[serde(default)]
    pub date_utc: Option<String>,
}

impl RawRecord {
    /// Parse a JSON array of records, skipping elements that do not fit.
    #[must_use]
    pub fn parse_batch(batch: Value) -> Vec<Self> {
        let Value::Array(items) = batch else {
            warn!("expected a JSON array of station records, ignoring input");
            return Vec::new();
        };

        items
            .into_iter()
            .enumerate()
            .filter_map(|(idx, item)| match serde_json::from_value::<Self>(item) {
                Ok(record) => Some(record),
                Err(e) => {
                    debug!("skipping malformed station record #{}: {}", idx, e);
                    None
                }
            })
            .collect()
    }

    /// Lowercased parameter name, if present.
    #[must_use]
    pub fn parameter_name(&self) -> Option<String> {
        self.parameter.as_ref().and_then(ParameterField::name)
    }

    /// Unit label: the parameter's `units`, else the record's `unit`.
    #[must_use]
    pub fn unit_label(&self) -> &str {
        self.parameter
            .as_ref()
            .and_then(ParameterField::units)
            .or(self.unit.as_deref())
            .unwrap_or("")
    }

    /// Numeric value; strings, booleans and nulls are rejected.
    #[must_use]
    pub fn numeric_value(&self) -> Option<f64> {
        match &self.value {
            Some(Value::Number(n)) => n.as_f64(),
            _ => None,
        }
    }

    #[must_use]
    pub fn city_name(&self) -> &str {
        self.city.as_deref().unwrap_or(UNKNOWN)
    }

    #[must_use]
    pub fn station_name(&self) -> &str {
        self.location.as_deref().unwrap_or(UNKNOWN)
    }

    /// Convert into a `Measurement`.
    ///
    /// Returns `None` when the pollutant is unsupported or missing, or the
    /// value is absent or non-numeric.
    #[must_use]
    pub fn to_measurement(&self) -> Option<Measurement> {
        let pollutant: Pollutant = self.parameter_name()?.parse().ok()?;
        let value = self.numeric_value()?;
        let date_utc = self.date_utc.clone().unwrap_or_default();

        Some(Measurement {
            pollutant,
            value,
            unit: self.unit_label().to_string(),
            observed_at: parse_timestamp(&date_utc),
            date_utc,
            city: self.city_name().to_string(),
            station: self.station_name().to_string(),
            coordinates: match (self.lat, self.lon) {
                (Some(latitude), Some(longitude)) => Some(Coordinates {
                    latitude,
                    longitude,
                }),
                _ => None,
            },
        })
    }
}

/// Convert a batch of raw records, dropping the ones that cannot carry an AQI.
#[must_use]
pub fn measurements_from(records: &[RawRecord]) -> Vec<Measurement> {
    records
        .iter()
        .filter_map(|record| {
            let m = record.to_measurement();
            if m.is_none() {
                debug!(
                    "ignoring record at {}/{}: parameter={:?} value={:?}",
                    record.city_name(),
                    record.station_name(),
                    record.parameter_name(),
                    record.value
                );
            }
            m
        })
        .collect()
}

// ============================================================================
// Normalized measurements and aggregation output
// ============================================================================

/// Geographic position of a station.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// A supported pollutant reading with a numeric value.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub pollutant: Pollutant,
    pub value: f64,
    pub unit: String,
    /// Parsed `date_utc`; `None` keeps the reading out of AQI selection and trends
    pub observed_at: Option<DateTime<Utc>>,
    /// Timestamp text as received
    pub date_utc: String,
    pub city: String,
    pub station: String,
    pub coordinates: Option<Coordinates>,
}

/// A measurement as listed under its location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementView {
    pub parameter: Pollutant,
    pub value: f64,
    pub unit: String,
    pub date_utc: String,
}

impl From<&Measurement> for MeasurementView {
    fn from(m: &Measurement) -> Self {
        Self {
            parameter: m.pollutant,
            value: m.value,
            unit: m.unit.clone(),
            date_utc: m.date_utc.clone(),
        }
    }
}

/// One aggregated station.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationSummary {
    pub city: String,
    pub location: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub measurements: Vec<MeasurementView>,
    pub aqi: Option<u16>,
    pub dominant_pollutant: Option<Pollutant>,
    /// Last value seen per pollutant
    pub raw_values: BTreeMap<Pollutant, f64>,
}

/// Satellite NO2 column summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SatelliteSummary {
    pub no2_mean: f64,
    pub no2_max: f64,
    pub no2_min: f64,
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
}

/// Response of `/api/merged`.
#[derive(Debug, Clone, Serialize)]
pub struct MergedView {
    pub tempo: SatelliteSummary,
    pub openaq: Vec<LocationSummary>,
    pub overall_aqi: u16,
    pub raw_openaq: Vec<RawRecord>,
}

/// One point of the trend response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    /// ISO-8601 timestamp
    pub ds: String,
    pub yhat: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter_name: Option<Pollutant>,
}
