//! Web server for the airmerge dashboard and JSON API.
//!
//! Provides:
//! - Axum for HTTP server
//! - JSON endpoints for the merged view, raw feeds and trend
//! - An embedded dashboard page with a Leaflet station map
//!
//! Each request runs one fetch-aggregate-respond cycle on the blocking pool.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tokio::task::JoinError;

use crate::aggregate;
use crate::sources::DataSources;
use crate::trend;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            host: "127.0.0.1".to_string(),
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    sources: Arc<dyn DataSources>,
}

impl AppState {
    #[must_use]
    pub fn new(sources: Arc<dyn DataSources>) -> Self {
        Self { sources }
    }
}

/// A blocking task died before producing a response.
#[derive(Debug)]
pub struct HandlerError(JoinError);

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        tracing::error!("request task failed: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "internal error"})),
        )
            .into_response()
    }
}

/// Run collaborator I/O off the async workers.
async fn run_blocking<T, F>(f: F) -> Result<T, HandlerError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(HandlerError)
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/tempo", get(tempo_handler))
        .route("/api/openaq", get(openaq_handler))
        .route("/api/merged", get(merged_handler))
        .route("/api/weather", get(weather_handler))
        .route("/api/forecast", get(forecast_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Start the web server.
pub async fn run_server(config: ServerConfig, sources: Arc<dyn DataSources>) -> anyhow::Result<()> {
    let app = create_router(AppState::new(sources));

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("airmerge dashboard starting at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Main page handler - serves the dashboard.
async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Health check endpoint.
async fn health_handler() -> &'static str {
    "OK"
}

async fn tempo_handler(State(state): State<AppState>) -> Result<Response, HandlerError> {
    tracing::info!("/api/tempo called");
    let sources = state.sources.clone();
    let tempo = run_blocking(move || sources.satellite()).await?;

    Ok(match tempo {
        Some(summary) => Json(summary).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "No TEMPO data"})),
        )
            .into_response(),
    })
}

async fn openaq_handler(State(state): State<AppState>) -> Result<Response, HandlerError> {
    tracing::info!("/api/openaq called");
    let sources = state.sources.clone();
    let records = run_blocking(move || sources.ground_stations()).await?;
    tracing::info!("OpenAQ returned {} records", records.len());
    Ok(Json(records).into_response())
}

async fn merged_handler(State(state): State<AppState>) -> Result<Response, HandlerError> {
    tracing::info!("/api/merged called");
    let sources = state.sources.clone();
    let view = run_blocking(move || {
        let tempo = sources.satellite();
        let raw = sources.ground_stations();
        aggregate::merge(tempo, raw)
    })
    .await?;
    Ok(Json(view).into_response())
}

async fn weather_handler(State(state): State<AppState>) -> Result<Response, HandlerError> {
    tracing::info!("/api/weather called");
    let sources = state.sources.clone();
    let report = run_blocking(move || sources.weather()).await?;

    Ok(match report {
        Some(report) => Json(report).into_response(),
        None => Json(json!({})).into_response(),
    })
}

/// Query parameters for `/api/forecast`. Empty values mean "any".
#[derive(Debug, Default, Deserialize)]
pub struct ForecastQuery {
    pub city: Option<String>,
    pub location: Option<String>,
}

async fn forecast_handler(
    State(state): State<AppState>,
    Query(query): Query<ForecastQuery>,
) -> Result<Response, HandlerError> {
    tracing::info!("/api/forecast called (city={:?}, location={:?})", query.city, query.location);
    let sources = state.sources.clone();
    let now = Utc::now();

    let points = run_blocking(move || {
        let raw = sources.ground_stations();
        let city = query.city.as_deref().filter(|c| !c.is_empty());
        let location = query.location.as_deref().filter(|l| !l.is_empty());
        trend::forecast(&raw, city, location, now)
    })
    .await?;

    tracing::info!("forecast ready with {} points", points.len());
    Ok(Json(points).into_response())
}

// ============================================================================
// HTML Template (embedded for single-binary deployment)
// ============================================================================

const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en" data-theme="dark">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>airmerge · Air Quality Dashboard</title>

    <link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css" />
    <script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>

    <style>
        :root {
            --font: 'Inter', -apple-system, BlinkMacSystemFont, sans-serif;
            --bg-primary: #09090b;
            --bg-elevated: #1c1c1f;
            --text-primary: #fafafa;
            --text-secondary: #a1a1aa;
            --border: #27272a;
            --radius-md: 10px;
        }
        body { margin: 0; font-family: var(--font); background: var(--bg-primary); color: var(--text-primary); }
        header, main { max-width: 1100px; margin: 0 auto; padding: 16px 24px; }
        .cards { display: grid; grid-template-columns: repeat(auto-fit, minmax(220px, 1fr)); gap: 12px; }
        .card { background: var(--bg-elevated); border: 1px solid var(--border); border-radius: var(--radius-md); padding: 16px; }
        .card .label { color: var(--text-secondary); font-size: 13px; }
        .card .value { font-size: 28px; font-weight: 600; margin-top: 4px; }
        #map { height: 360px; border-radius: var(--radius-md); margin: 16px 0; }
        table { width: 100%; border-collapse: collapse; }
        th, td { text-align: left; padding: 8px; border-bottom: 1px solid var(--border); }
        tr.station { cursor: pointer; }
        tr.station:hover { background: var(--bg-elevated); }
        #trend { font-family: monospace; font-size: 12px; color: var(--text-secondary); white-space: pre; }
    </style>
</head>
<body>
    <header>
        <h1>airmerge</h1>
        <p style="color: var(--text-secondary)">Satellite NO₂, ground stations and weather in one view</p>
    </header>
    <main>
        <div class="cards">
            <div class="card"><div class="label">Overall AQI</div><div class="value" id="overall">–</div></div>
            <div class="card"><div class="label">Satellite NO₂ mean</div><div class="value" id="no2">–</div></div>
            <div class="card"><div class="label">Temperature</div><div class="value" id="temp">–</div></div>
            <div class="card"><div class="label">Humidity</div><div class="value" id="humidity">–</div></div>
        </div>
        <div id="map"></div>
        <table>
            <thead><tr><th>City</th><th>Station</th><th>AQI</th><th>Status</th><th>Dominant</th></tr></thead>
            <tbody id="stations"><tr><td colspan="5">Loading air quality data…</td></tr></tbody>
        </table>
        <h3 id="trend-title">Trend</h3>
        <div id="trend">Select a station to load its AQI trend.</div>
    </main>

    <script>
        const bands = [
            [50, 'Good', '#48BB78'],
            [100, 'Moderate', '#ECC94B'],
            [150, 'Unhealthy for Sensitive Groups', '#ED8936'],
            [200, 'Unhealthy', '#F56565'],
            [300, 'Very Unhealthy', '#9F7AEA'],
            [Infinity, 'Hazardous', '#702459'],
        ];
        const band = (aqi) => aqi === null ? ['N/A', '#4A5568'] : bands.find(b => aqi <= b[0]).slice(1);

        const map = L.map('map').setView([40, -40], 2);
        L.tileLayer('https://{s}.basemaps.cartocdn.com/dark_all/{z}/{x}/{y}{r}.png').addTo(map);

        async function loadTrend(city, location) {
            document.getElementById('trend-title').textContent = `AQI trend for ${location}, ${city}`;
            const res = await fetch(`/api/forecast?city=${encodeURIComponent(city)}&location=${encodeURIComponent(location)}`);
            const points = await res.json();
            document.getElementById('trend').textContent = points
                .map(p => `${p.ds}  ${String(p.yhat).padStart(5)}  ${p.parameter_name || ''}`)
                .join('\n');
        }

        async function loadMerged() {
            const data = await (await fetch('/api/merged')).json();
            document.getElementById('overall').textContent = data.overall_aqi;
            document.getElementById('no2').textContent = data.tempo.no2_mean.toExponential(2);

            const rows = data.openaq.map(loc => {
                const [status, color] = band(loc.aqi);
                if (loc.lat !== null && loc.lon !== null) {
                    L.circleMarker([loc.lat, loc.lon], { radius: 7, fillColor: color, color: '#fff', weight: 1, fillOpacity: 0.9 })
                        .bindPopup(`${loc.location}<br>AQI: ${loc.aqi ?? 'N/A'} (${status})`)
                        .addTo(map);
                }
                return `<tr class="station" data-city="${loc.city}" data-location="${loc.location}">
                    <td>${loc.city}</td><td>${loc.location}</td>
                    <td style="color:${color}">${loc.aqi ?? 'N/A'}</td><td>${status}</td>
                    <td>${loc.dominant_pollutant ?? '–'}</td></tr>`;
            });
            const body = document.getElementById('stations');
            body.innerHTML = rows.length ? rows.join('') : '<tr><td colspan="5">No station data</td></tr>';
            body.querySelectorAll('tr.station').forEach(tr =>
                tr.addEventListener('click', () => loadTrend(tr.dataset.city, tr.dataset.location)));
        }

        async function loadWeather() {
            const w = await (await fetch('/api/weather')).json();
            if (w.temperature != null) document.getElementById('temp').textContent = `${w.temperature} °C`;
            if (w.humidity != null) document.getElementById('humidity').textContent = `${w.humidity} %`;
        }

        loadMerged();
        loadWeather();
    </script>
</body>
</html>
"##;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::models::{RawRecord, SatelliteSummary};
    use crate::weather::WeatherReport;

    struct FixedSources {
        tempo: Option<SatelliteSummary>,
        records: Vec<RawRecord>,
        weather: Option<WeatherReport>,
    }

    impl DataSources for FixedSources {
        fn satellite(&self) -> Option<SatelliteSummary> {
            self.tempo.clone()
        }

        fn ground_stations(&self) -> Vec<RawRecord> {
            self.records.clone()
        }

        fn weather(&self) -> Option<WeatherReport> {
            self.weather.clone()
        }
    }

    fn empty() -> FixedSources {
        FixedSources {
            tempo: None,
            records: Vec::new(),
            weather: None,
        }
    }

    fn stations() -> Vec<RawRecord> {
        RawRecord::parse_batch(json!([
            {"city": "New York", "location": "Queens", "parameter": {"name": "pm25", "units": "µg/m³"},
             "value": 12.0, "lat": 40.7, "lon": -73.8, "date_utc": "2025-03-01T09:00:00Z"},
            {"city": "London", "location": "Camden", "parameter": {"name": "no2", "units": "µg/m³"},
             "value": 100.0, "lat": 51.5, "lon": -0.1, "date_utc": "2025-03-01T09:00:00Z"},
            {"city": "London", "location": "Camden", "parameter": {"name": "pm10", "units": "µg/m³"},
             "value": 9000.0, "date_utc": "2025-03-01T10:00:00Z"}
        ]))
    }

    async fn get(sources: FixedSources, uri: &str) -> (StatusCode, Value) {
        let app = create_router(AppState::new(Arc::new(sources)));
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_merged_view() {
        let sources = FixedSources {
            records: stations(),
            ..empty()
        };
        let (status, body) = get(sources, "/api/merged").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["overall_aqi"], json!(100));
        assert_eq!(body["openaq"].as_array().unwrap().len(), 2);
        assert_eq!(body["openaq"][1]["dominant_pollutant"], json!("no2"));
        assert_eq!(body["raw_openaq"].as_array().unwrap().len(), 3);
        assert_eq!(body["tempo"]["no2_mean"], json!(0.0));
        assert_eq!(body["tempo"]["lat"], json!([]));
    }

    #[tokio::test]
    async fn test_merged_view_without_data() {
        let (status, body) = get(empty(), "/api/merged").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["overall_aqi"], json!(0));
        assert_eq!(body["openaq"], json!([]));
    }

    #[tokio::test]
    async fn test_tempo_missing_is_404() {
        let (status, body) = get(empty(), "/api/tempo").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], json!("No TEMPO data"));
    }

    #[tokio::test]
    async fn test_tempo_present() {
        let sources = FixedSources {
            tempo: Some(SatelliteSummary {
                no2_mean: 1.5,
                no2_max: 3.0,
                no2_min: 0.5,
                lat: vec![40.0],
                lon: vec![-74.0],
            }),
            ..empty()
        };
        let (status, body) = get(sources, "/api/tempo").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["no2_max"], json!(3.0));
    }

    #[tokio::test]
    async fn test_weather_failure_is_empty_object() {
        let (status, body) = get(empty(), "/api/weather").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({}));
    }

    #[tokio::test]
    async fn test_forecast_for_station() {
        let sources = FixedSources {
            records: stations(),
            ..empty()
        };
        let (status, body) = get(sources, "/api/forecast?city=London&location=Camden").await;
        assert_eq!(status, StatusCode::OK);
        let points = body.as_array().unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0]["yhat"], json!(100.0));
        assert_eq!(points[0]["parameter_name"], json!("no2"));
    }

    #[tokio::test]
    async fn test_forecast_fallback() {
        let (status, body) = get(empty(), "/api/forecast?city=&location=").await;
        assert_eq!(status, StatusCode::OK);
        let points = body.as_array().unwrap();
        assert_eq!(points.len(), 24);
        assert_eq!(points[0]["yhat"], json!(50.0));
        assert_eq!(points[23]["yhat"], json!(73.0));
        assert!(points[0].get("parameter_name").is_none());
    }

    #[tokio::test]
    async fn test_openaq_passthrough_and_health() {
        let sources = FixedSources {
            records: stations(),
            ..empty()
        };
        let (status, body) = get(sources, "/api/openaq").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["parameter"]["name"], json!("pm25"));

        let app = create_router(AppState::new(Arc::new(empty())));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
