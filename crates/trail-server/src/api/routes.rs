//! REST API routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use trail_core::{
    normalize_batch, smooth_samples, GapConnector, PositionSample, RawSample, SmoothReport,
    TrailSnapshot, TrailState, TrailSummary,
};

use crate::feed::LiveAircraft;
use crate::loader::{self, HistoryRequest, LoadReport};
use crate::state::store::SettingsUpdate;
use crate::state::{AppState, SettingsView, StatusReport};

/// Create the API router.
pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/aircraft", get(list_aircraft))
        .route("/v1/trails", get(list_trails))
        .route("/v1/trails/recent", post(load_recent))
        .route("/v1/trails/:hex", get(get_trail))
        .route("/v1/trails/:hex/history", post(load_history))
        .route("/v1/gaps", get(list_gaps))
        .route("/v1/settings", get(get_settings).put(update_settings))
        .route("/v1/smooth", post(smooth))
        .route("/v1/status", get(get_status))
}

async fn list_aircraft(State(state): State<Arc<AppState>>) -> Json<Vec<LiveAircraft>> {
    Json(state.live_aircraft())
}

#[derive(Debug, Deserialize)]
struct ListTrailsQuery {
    state: Option<TrailState>,
}

async fn list_trails(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListTrailsQuery>,
) -> Json<Vec<TrailSummary>> {
    Json(state.trail_summaries(query.state))
}

async fn get_trail(
    State(state): State<Arc<AppState>>,
    Path(hex): Path<String>,
) -> Result<Json<TrailSnapshot>, StatusCode> {
    state
        .trail_snapshot(&hex)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

#[derive(Debug, Deserialize)]
struct GapsQuery {
    #[serde(default)]
    drain: bool,
}

async fn list_gaps(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GapsQuery>,
) -> Json<Vec<GapConnector>> {
    Json(state.gap_connectors(query.drain))
}

#[derive(Debug, Default, Deserialize)]
struct RecentRequest {
    minutes: Option<i64>,
}

async fn load_recent(
    State(state): State<Arc<AppState>>,
    body: Option<Json<RecentRequest>>,
) -> Result<Json<LoadReport>, StatusCode> {
    let request = body.map(|Json(body)| body).unwrap_or_default();
    loader::load_recent(&state, request.minutes)
        .await
        .map(Json)
        .map_err(|err| {
            tracing::warn!("Recent trail load failed: {}", err);
            StatusCode::BAD_GATEWAY
        })
}

async fn load_history(
    State(state): State<Arc<AppState>>,
    Path(hex): Path<String>,
    body: Option<Json<HistoryRequest>>,
) -> Result<Json<LoadReport>, StatusCode> {
    let request = body.map(|Json(body)| body).unwrap_or_default();
    if let (Some(start), Some(end)) = (request.start, request.end) {
        if start >= end {
            return Err(StatusCode::BAD_REQUEST);
        }
    }

    loader::load_history(&state, &hex, request)
        .await
        .map(Json)
        .map_err(|err| {
            tracing::warn!("History load for {} failed: {}", hex, err);
            StatusCode::BAD_GATEWAY
        })
}

async fn get_settings(State(state): State<Arc<AppState>>) -> Json<SettingsView> {
    Json(state.settings_view())
}

async fn update_settings(
    State(state): State<Arc<AppState>>,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<SettingsView>, StatusCode> {
    if !update.is_valid() {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(Json(state.apply_settings(update)))
}

#[derive(Debug, Deserialize)]
struct SmoothRequest {
    positions: Vec<RawSample>,
}

#[derive(Debug, Serialize)]
struct SmoothResponse {
    positions: Vec<PositionSample>,
    dropped: usize,
    report: SmoothReport,
}

/// Run the altitude smoother over a posted track without storing it.
async fn smooth(Json(request): Json<SmoothRequest>) -> Json<SmoothResponse> {
    let mut samples = normalize_batch(&request.positions, Utc::now());
    let dropped = request.positions.len() - samples.len();
    samples.sort_by_key(|sample| sample.timestamp);

    let smoothed = smooth_samples(&samples);
    Json(SmoothResponse {
        positions: smoothed.samples,
        dropped,
        report: smoothed.report,
    })
}

async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusReport> {
    Json(state.status())
}
