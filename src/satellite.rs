//! Satellite NO2 grid summaries.
//!
//! Reads the newest grid snapshot from a local directory. Snapshots are JSON
//! exports of a gridded NO2 product:
//!
//! ```json
//! {"latitude": [..], "longitude": [..], "NO2": [[..], ..]}
//! ```
//!
//! `NO2` may be absent, in which case a `weight` grid is used, and failing
//! both a zero grid. Null cells are ignored in the statistics.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::errors::AirError;
use crate::models::SatelliteSummary;

/// File extension of grid snapshots.
pub const SNAPSHOT_EXTENSION: &str = "json";

#[derive(Debug, Deserialize)]
struct GridSnapshot {
    latitude: Vec<f64>,
    longitude: Vec<f64>,
    #[serde(default, rename = "NO2")]
    no2: Option<Vec<Vec<Option<f64>>>>,
    #[serde(default)]
    weight: Option<Vec<Vec<Option<f64>>>>,
}

/// Newest snapshot in `dir` by file name.
fn latest_snapshot(dir: &Path) -> Result<Option<PathBuf>, AirError> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == SNAPSHOT_EXTENSION))
        .collect();
    files.sort();
    Ok(files.pop())
}

/// NaN-aware `(mean, max, min)` over finite cells; zeros if there are none.
fn grid_stats(grid: &[Vec<Option<f64>>]) -> (f64, f64, f64) {
    let mut count = 0_u32;
    let mut sum = 0.0;
    let mut max = f64::NEG_INFINITY;
    let mut min = f64::INFINITY;

    for cell in grid.iter().flatten().filter_map(|c| *c).filter(|c| c.is_finite()) {
        count += 1;
        sum += cell;
        max = max.max(cell);
        min = min.min(cell);
    }

    if count == 0 {
        return (0.0, 0.0, 0.0);
    }
    (sum / f64::from(count), max, min)
}

/// Summarize one snapshot file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a grid snapshot.
pub fn summarize_file(path: &Path) -> Result<SatelliteSummary, AirError> {
    let text = fs::read_to_string(path)?;
    let snapshot: GridSnapshot = serde_json::from_str(&text)?;

    let grid = match (snapshot.no2, snapshot.weight) {
        (Some(no2), _) => no2,
        (None, Some(weight)) => {
            debug!("no NO2 grid, using weight");
            weight
        }
        (None, None) => {
            warn!("no NO2/weight grid found, using zeros");
            Vec::new()
        }
    };

    let (no2_mean, no2_max, no2_min) = grid_stats(&grid);
    Ok(SatelliteSummary {
        no2_mean,
        no2_max,
        no2_min,
        lat: snapshot.latitude,
        lon: snapshot.longitude,
    })
}

/// Summary of the newest snapshot in `dir`, or `None` if there is none or
/// it cannot be read.
#[instrument]
pub fn fetch_latest(dir: &Path) -> Option<SatelliteSummary> {
    let path = match latest_snapshot(dir) {
        Ok(Some(path)) => path,
        Ok(None) => {
            warn!("no satellite snapshots found in {}", dir.display());
            return None;
        }
        Err(e) => {
            warn!("cannot list satellite directory {}: {}", dir.display(), e);
            return None;
        }
    };

    info!("latest satellite snapshot: {}", path.display());
    match summarize_file(&path) {
        Ok(summary) => Some(summary),
        Err(e) => {
            warn!("error reading {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(dir: &Path, name: &str, body: &serde_json::Value) {
        fs::write(dir.join(name), body.to_string()).unwrap();
    }

    #[test]
    fn test_picks_newest_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "TEMPO_NO2_20250301T10.json",
            &json!({"latitude": [1.0], "longitude": [2.0], "NO2": [[1.0]]}),
        );
        write(
            dir.path(),
            "TEMPO_NO2_20250301T11.json",
            &json!({"latitude": [40.0, 41.0], "longitude": [-74.0], "NO2": [[2.0, null], [4.0, 6.0]]}),
        );
        fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

        let summary = fetch_latest(dir.path()).unwrap();
        assert!((summary.no2_mean - 4.0).abs() < 1e-9);
        assert_eq!(summary.no2_max, 6.0);
        assert_eq!(summary.no2_min, 2.0);
        assert_eq!(summary.lat, vec![40.0, 41.0]);
    }

    #[test]
    fn test_weight_fallback_and_zero_grid() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "a.json",
            &json!({"latitude": [], "longitude": [], "weight": [[0.5, 1.5]]}),
        );
        let summary = summarize_file(&dir.path().join("a.json")).unwrap();
        assert_eq!(summary.no2_max, 1.5);

        write(dir.path(), "b.json", &json!({"latitude": [1.0], "longitude": [1.0]}));
        let summary = summarize_file(&dir.path().join("b.json")).unwrap();
        assert_eq!(summary.no2_mean, 0.0);
    }

    #[test]
    fn test_unusable_inputs_give_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(fetch_latest(dir.path()).is_none());
        assert!(fetch_latest(&dir.path().join("missing")).is_none());

        fs::write(dir.path().join("z.json"), "{not json").unwrap();
        assert!(fetch_latest(dir.path()).is_none());
    }
}
