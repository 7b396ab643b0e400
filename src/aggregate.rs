//! Location and region aggregation.
//!
//! Measurements are grouped by `city_station` key in first-seen order. Each
//! location reports the AQI of its most recent reading, with severity only
//! breaking ties between readings observed at the same instant. This differs
//! from the regulatory "max across pollutants" convention and is kept as-is.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::aqi;
use crate::models::{
    LocationSummary, Measurement, MeasurementView, MergedView, Pollutant, RawRecord,
    SatelliteSummary, measurements_from,
};
use crate::units;

/// A computed AQI eligible to represent its location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub aqi: u16,
    pub pollutant: Pollutant,
    pub observed_at: DateTime<Utc>,
}

/// Pick the most recent candidate; equal timestamps prefer the higher AQI,
/// and exact ties keep the earliest inserted.
#[must_use]
pub fn select_dominant(candidates: &[Candidate]) -> Option<Candidate> {
    let mut best: Option<Candidate> = None;
    for c in candidates {
        let replace = best.is_none_or(|b| (c.observed_at, c.aqi) > (b.observed_at, b.aqi));
        if replace {
            best = Some(*c);
        }
    }
    best
}

/// Group measurements into locations and select each location's AQI.
#[must_use]
pub fn aggregate(measurements: &[Measurement]) -> Vec<LocationSummary> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<&Measurement>> = Vec::new();

    for m in measurements {
        let key = format!("{}_{}", m.city, m.station);
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(m);
    }

    groups.iter().map(|group| summarize_location(group)).collect()
}

fn summarize_location(group: &[&Measurement]) -> LocationSummary {
    // Groups are only created on a push, so there is always a first element.
    let first = group[0];

    let mut raw_values = BTreeMap::new();
    let mut candidates = Vec::new();

    for m in group {
        raw_values.insert(m.pollutant, m.value);

        let converted = units::normalize(m.value, m.pollutant, &m.unit);
        let Some(index) = aqi::calc_aqi(converted, m.pollutant.breakpoints()) else {
            continue;
        };
        debug!(
            "{}: {} {} -> {} -> AQI {}",
            m.pollutant, m.value, m.unit, converted, index
        );

        if let Some(observed_at) = m.observed_at {
            candidates.push(Candidate {
                aqi: index,
                pollutant: m.pollutant,
                observed_at,
            });
        }
    }

    let dominant = select_dominant(&candidates);

    LocationSummary {
        city: first.city.clone(),
        location: first.station.clone(),
        lat: first.coordinates.map(|c| c.latitude),
        lon: first.coordinates.map(|c| c.longitude),
        measurements: group.iter().map(|m| MeasurementView::from(*m)).collect(),
        aqi: dominant.map(|d| d.aqi),
        dominant_pollutant: dominant.map(|d| d.pollutant),
        raw_values,
    }
}

/// Overall region AQI: the highest location AQI, or 0 when none is known.
///
/// A result of 0 is ambiguous on its own; check the locations to tell
/// "no data" from a genuinely clean reading.
#[must_use]
pub fn summarize(locations: &[LocationSummary]) -> u16 {
    locations.iter().filter_map(|l| l.aqi).max().unwrap_or(0)
}

/// Build the merged view from collaborator outputs.
#[must_use]
pub fn merge(tempo: Option<SatelliteSummary>, raw: Vec<RawRecord>) -> MergedView {
    let measurements = measurements_from(&raw);
    let openaq = aggregate(&measurements);
    let overall_aqi = summarize(&openaq);

    tracing::info!(
        "merged view ready (tempo: {}, locations: {}, overall AQI: {})",
        if tempo.is_some() { "present" } else { "none" },
        openaq.len(),
        overall_aqi
    );

    MergedView {
        tempo: tempo.unwrap_or_default(),
        openaq,
        overall_aqi,
        raw_openaq: raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Coordinates;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, hour, 0, 0).unwrap()
    }

    fn reading(city: &str, station: &str, pollutant: Pollutant, value: f64, hour: Option<u32>) -> Measurement {
        Measurement {
            pollutant,
            value,
            unit: "µg/m³".into(),
            observed_at: hour.map(at),
            date_utc: hour.map(|h| at(h).to_rfc3339()).unwrap_or_default(),
            city: city.into(),
            station: station.into(),
            coordinates: Some(Coordinates {
                latitude: 40.7,
                longitude: -74.0,
            }),
        }
    }

    #[test]
    fn test_recency_beats_severity() {
        let candidates = [
            Candidate { aqi: 180, pollutant: Pollutant::Pm25, observed_at: at(9) },
            Candidate { aqi: 20, pollutant: Pollutant::No2, observed_at: at(10) },
        ];
        let d = select_dominant(&candidates).unwrap();
        assert_eq!(d.pollutant, Pollutant::No2);
        assert_eq!(d.aqi, 20);
    }

    #[test]
    fn test_equal_time_prefers_higher_aqi() {
        let candidates = [
            Candidate { aqi: 40, pollutant: Pollutant::No2, observed_at: at(10) },
            Candidate { aqi: 75, pollutant: Pollutant::Pm25, observed_at: at(10) },
        ];
        assert_eq!(select_dominant(&candidates).unwrap().aqi, 75);
    }

    #[test]
    fn test_exact_tie_keeps_first() {
        let candidates = [
            Candidate { aqi: 50, pollutant: Pollutant::Pm10, observed_at: at(10) },
            Candidate { aqi: 50, pollutant: Pollutant::Pm25, observed_at: at(10) },
        ];
        assert_eq!(select_dominant(&candidates).unwrap().pollutant, Pollutant::Pm10);
        assert!(select_dominant(&[]).is_none());
    }

    #[test]
    fn test_groups_in_first_seen_order() {
        let input = vec![
            reading("New York", "Queens", Pollutant::Pm25, 10.0, Some(8)),
            reading("London", "Camden", Pollutant::No2, 30.0, Some(8)),
            reading("New York", "Queens", Pollutant::No2, 60.0, Some(9)),
        ];
        let locations = aggregate(&input);
        assert_eq!(locations.len(), 2);
        assert_eq!(locations[0].location, "Queens");
        assert_eq!(locations[0].measurements.len(), 2);
        assert_eq!(locations[0].measurements[1].parameter, Pollutant::No2);
        assert_eq!(locations[1].city, "London");
    }

    #[test]
    fn test_location_without_computable_aqi_is_kept() {
        // 600 µg/m³ PM2.5 is off the table
        let input = vec![reading("Los Angeles", "Compton", Pollutant::Pm25, 600.0, Some(8))];
        let locations = aggregate(&input);
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].aqi, None);
        assert_eq!(locations[0].dominant_pollutant, None);
        assert_eq!(locations[0].raw_values.get(&Pollutant::Pm25), Some(&600.0));
    }

    #[test]
    fn test_undated_readings_are_not_candidates() {
        let input = vec![
            reading("London", "Camden", Pollutant::Pm25, 40.0, None),
            reading("London", "Camden", Pollutant::No2, 20.0, Some(7)),
        ];
        let locations = aggregate(&input);
        assert_eq!(locations[0].dominant_pollutant, Some(Pollutant::No2));
        assert_eq!(locations[0].aqi, Some(19));
        assert_eq!(locations[0].measurements.len(), 2);
    }

    #[test]
    fn test_raw_values_keep_last_seen() {
        let input = vec![
            reading("London", "Camden", Pollutant::Pm25, 5.0, Some(7)),
            reading("London", "Camden", Pollutant::Pm25, 9.0, Some(8)),
        ];
        let locations = aggregate(&input);
        assert_eq!(locations[0].raw_values[&Pollutant::Pm25], 9.0);
    }

    #[test]
    fn test_summarize() {
        let template = aggregate(&[reading("A", "a", Pollutant::Pm25, 1.0, Some(1))]).remove(0);
        let with_aqi = |aqi| LocationSummary {
            aqi,
            ..template.clone()
        };

        assert_eq!(summarize(&[with_aqi(Some(30)), with_aqi(Some(85)), with_aqi(None)]), 85);
        assert_eq!(summarize(&[with_aqi(None), with_aqi(None)]), 0);
        assert_eq!(summarize(&[]), 0);
    }

    #[test]
    fn test_empty_input() {
        let view = merge(None, Vec::new());
        assert!(view.openaq.is_empty());
        assert_eq!(view.overall_aqi, 0);
        assert_eq!(view.tempo, SatelliteSummary::default());
    }

    #[test]
    fn test_merge_from_raw_records() {
        let raw = RawRecord::parse_batch(json!([
            {"city": "New York", "location": "Queens", "parameter": {"name": "pm25", "units": "µg/m³"},
             "value": 35.5, "lat": 40.7, "lon": -73.8, "date_utc": "2025-03-01T09:00:00Z"},
            {"city": "New York", "location": "Queens", "parameter": {"name": "co", "units": "µg/m³"},
             "value": 1150, "date_utc": "2025-03-01T10:00:00Z"},
            {"city": "New York", "location": "Bronx", "parameter": {"name": "so2"}, "value": 3.0},
            {"city": "London", "location": "Camden", "parameter": {"name": "no2"}, "value": "n/a"}
        ]));
        let view = merge(None, raw);

        // Unsupported or non-numeric records never create a location.
        assert_eq!(view.openaq.len(), 1);
        let queens = &view.openaq[0];
        // CO at 1 ppm is newer than the PM2.5 reading
        assert_eq!(queens.dominant_pollutant, Some(Pollutant::Co));
        assert_eq!(queens.aqi, Some(11));
        assert_eq!(view.overall_aqi, 11);
        assert_eq!(view.raw_openaq.len(), 4);
    }
}
