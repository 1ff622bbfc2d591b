//! HTTP API for the dashboard.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::info;

use skywatch_core::types::{emergency_squawk, Error};
use skywatch_core::TrackedAircraft;

use crate::app::App;
use crate::store::DailyStatistics;

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct AircraftView {
    icao: String,
    callsign: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    altitude: Option<i32>,
    speed: Option<f64>,
    heading: Option<f64>,
    vertical_rate: Option<i32>,
    squawk: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    emergency: Option<&'static str>,
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
}

impl From<TrackedAircraft> for AircraftView {
    fn from(a: TrackedAircraft) -> Self {
        let r = &a.report;
        AircraftView {
            icao: r.icao_hex(),
            callsign: r.callsign.clone(),
            latitude: r.latitude(),
            longitude: r.longitude(),
            altitude: r.altitude,
            speed: r.ground_speed,
            heading: r.heading,
            vertical_rate: r.vertical_rate,
            emergency: r.squawk.as_deref().and_then(emergency_squawk),
            squawk: r.squawk.clone(),
            first_seen: a.first_seen,
            last_seen: a.last_seen,
        }
    }
}

#[derive(Debug, Serialize)]
struct PositionView {
    icao: String,
    callsign: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    altitude: Option<i32>,
    speed: Option<f64>,
    heading: Option<f64>,
    timestamp: DateTime<Utc>,
}

impl From<skywatch_core::PositionReport> for PositionView {
    fn from(r: skywatch_core::PositionReport) -> Self {
        PositionView {
            icao: r.icao_hex(),
            callsign: r.callsign.clone(),
            latitude: r.latitude(),
            longitude: r.longitude(),
            altitude: r.altitude,
            speed: r.ground_speed,
            heading: r.heading,
            timestamp: r.observed_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct StatisticsView {
    date: String,
    total_aircraft: i64,
    total_positions: i64,
    unique_callsigns: i64,
    avg_altitude: Option<f64>,
    max_altitude: Option<i32>,
}

impl From<DailyStatistics> for StatisticsView {
    fn from(s: DailyStatistics) -> Self {
        StatisticsView {
            date: s.date.date_naive().to_string(),
            total_aircraft: s.total_aircraft,
            total_positions: s.total_positions,
            unique_callsigns: s.unique_callsigns,
            avg_altitude: s.avg_altitude,
            max_altitude: s.max_altitude,
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiError {
    error: String,
}

enum WebError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl From<Error> for WebError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidIcao(_) | Error::InvalidBounds(_) => WebError::BadRequest(err.to_string()),
            Error::NoData => WebError::NotFound(err.to_string()),
            other => WebError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            WebError::NotFound(e) => (StatusCode::NOT_FOUND, e),
            WebError::BadRequest(e) => (StatusCode::BAD_REQUEST, e),
            WebError::Internal(e) => (StatusCode::INTERNAL_SERVER_ERROR, e),
        };
        (status, Json(ApiError { error })).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CurrentParams {
    /// Override the active window, seconds.
    max_age: Option<i64>,
}

async fn list_aircraft(
    State(app): State<Arc<App>>,
    Query(params): Query<CurrentParams>,
) -> Result<Json<Vec<AircraftView>>, WebError> {
    let max_age = TimeDelta::seconds(
        params
            .max_age
            .unwrap_or(app.config.ingest.active_window_seconds as i64),
    );
    let aircraft = app.get_current(max_age)?;
    Ok(Json(aircraft.into_iter().map(AircraftView::from).collect()))
}

async fn show_aircraft(
    State(app): State<Arc<App>>,
    Path(icao): Path<String>,
) -> Result<Json<AircraftView>, WebError> {
    match app.get_aircraft(&icao)? {
        Some(aircraft) => Ok(Json(aircraft.into())),
        None => Err(WebError::NotFound(format!("no active aircraft {icao}"))),
    }
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    /// Hours of history to return.
    hours: Option<i64>,
    limit: Option<i64>,
}

async fn show_history(
    State(app): State<Arc<App>>,
    Path(icao): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<PositionView>>, WebError> {
    let since = Utc::now() - TimeDelta::hours(params.hours.unwrap_or(24));
    let limit = params.limit.unwrap_or(1_000).clamp(1, 10_000);
    let positions = app.get_history(&icao, Some(since), limit)?;
    Ok(Json(positions.into_iter().map(PositionView::from).collect()))
}

#[derive(Debug, Deserialize)]
struct StatsParams {
    days: Option<i64>,
}

async fn show_statistics(
    State(app): State<Arc<App>>,
    Query(params): Query<StatsParams>,
) -> Result<Json<Vec<StatisticsView>>, WebError> {
    let rows = app.get_statistics(params.days.unwrap_or(7))?;
    Ok(Json(rows.into_iter().map(StatisticsView::from).collect()))
}

async fn show_health(State(app): State<Arc<App>>) -> Response {
    let health = app.health();
    let status = match health.overall {
        crate::app::HealthStatus::Healthy => StatusCode::OK,
        crate::app::HealthStatus::Degraded => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(health)).into_response()
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(app: Arc<App>) -> Router {
    Router::new()
        .route("/api/aircraft", get(list_aircraft))
        .route("/api/current", get(list_aircraft))
        .route("/api/aircraft/:icao", get(show_aircraft))
        .route("/api/aircraft/:icao/history", get(show_history))
        .route("/api/stats", get(show_statistics))
        .route("/api/health", get(show_health))
        .layer(CorsLayer::permissive())
        .with_state(app)
}

/// Serve the API until the task is cancelled.
pub async fn serve(app: Arc<App>, host: &str, port: u16) -> std::io::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "dashboard API listening");
    axum::serve(listener, router(app)).await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
