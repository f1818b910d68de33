//! Historical trail loads from the track service.
//!
//! Each load takes a ticket from a `LoadGeneration` before fetching. When
//! the response arrives the batch is committed only if no newer load of the
//! same kind started meanwhile; otherwise it is dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use trail_core::normalize_hex;

use crate::history::Resolution;
use crate::http::FetchError;
use crate::state::store::LoadCommit;
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadReport {
    pub generation: u64,
    pub tracks: usize,
    pub committed: usize,
    pub discarded: usize,
    /// A newer load started before this one finished; nothing was stored
    pub superseded: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryRequest {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resolution: Resolution,
}

/// Rebuild every trail seen in the recent window (`minutes` overrides it).
pub async fn load_recent(state: &AppState, minutes: Option<i64>) -> Result<LoadReport, FetchError> {
    let guard = state.recent_loads();
    let ticket = guard.begin();

    let window = minutes
        .filter(|m| *m > 0)
        .map(chrono::Duration::minutes)
        .unwrap_or_else(|| state.recent_window());
    let end = Utc::now();
    let start = end - window;
    tracing::info!(
        "Loading recent trails ({} min, generation {})",
        window.num_minutes(),
        ticket.generation()
    );

    let response = match state
        .track_service()
        .fetch_bulk(start, end, Resolution::Full, state.max_recent_tracks())
        .await
    {
        Ok(response) => response,
        Err(err) => {
            guard.finish(ticket);
            return Err(err);
        }
    };

    let tracks = response.into_tracks(end);
    let count = tracks.len();
    let commit = state.commit_tracks(guard, ticket, tracks);
    Ok(report(ticket.generation(), count, commit))
}

/// Rebuild one aircraft's trail from its stored history.
pub async fn load_history(
    state: &AppState,
    hex: &str,
    request: HistoryRequest,
) -> Result<LoadReport, FetchError> {
    let hex = normalize_hex(hex);
    let guard = state.history_guard(&hex);
    let ticket = guard.begin();

    let response = match state
        .track_service()
        .fetch_track(&hex, request.start, request.end, request.resolution)
        .await
    {
        Ok(response) => response,
        Err(err) => {
            guard.finish(ticket);
            return Err(err);
        }
    };

    let samples = response.samples(Utc::now());
    let commit = state.commit_tracks(&guard, ticket, vec![(hex.clone(), samples)]);
    if let Some(commit) = &commit {
        if commit.discarded > 0 {
            tracing::debug!("History for {} had too few usable points", hex);
        }
    }
    Ok(report(ticket.generation(), 1, commit))
}

fn report(generation: u64, tracks: usize, commit: Option<LoadCommit>) -> LoadReport {
    match commit {
        Some(commit) => LoadReport {
            generation,
            tracks,
            committed: commit.committed,
            discarded: commit.discarded,
            superseded: false,
        },
        None => {
            tracing::info!("Load generation {} superseded, results dropped", generation);
            LoadReport {
                generation,
                tracks,
                committed: 0,
                discarded: 0,
                superseded: true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn offline_state() -> AppState {
        let mut config = Config::from_env();
        // Nothing listens on the discard port
        config.track_service_url = "http://127.0.0.1:9".to_string();
        config.request_timeout_secs = 2;
        AppState::new(&config)
    }

    #[tokio::test]
    async fn failed_fetch_clears_in_flight() {
        let state = offline_state();
        let result = load_recent(&state, Some(5)).await;
        assert!(result.is_err());
        assert!(!state.recent_loads().in_flight());
        assert_eq!(state.recent_loads().generation(), 1);
    }

    #[tokio::test]
    async fn failed_history_fetch_leaves_no_trail() {
        let state = offline_state();
        let result = load_history(&state, "ABC123", HistoryRequest::default()).await;
        assert!(result.is_err());
        assert!(!state.history_guard("abc123").in_flight());
        assert!(state.trail_snapshot("abc123").is_none());
    }

    #[test]
    fn superseded_report_has_no_commits() {
        let report = report(7, 3, None);
        assert!(report.superseded);
        assert_eq!(report.committed, 0);
        assert_eq!(report.tracks, 3);
    }
}
