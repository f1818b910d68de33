//! Track service client: historical positions for one aircraft or in bulk.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use trail_core::{normalize_batch, normalize_hex, PositionSample, RawSample};

use crate::http::{build_client, get_json, FetchError};

/// Storage resolution served by the track service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    #[default]
    #[serde(rename = "full")]
    Full,
    #[serde(rename = "1min")]
    OneMinute,
    #[serde(rename = "5min")]
    FiveMinutes,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Full => "full",
            Resolution::OneMinute => "1min",
            Resolution::FiveMinutes => "5min",
        }
    }
}

/// `GET /tracks/{icao}` body. Positions use `alt_baro`.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackResponse {
    pub icao: String,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub positions: Vec<RawSample>,
}

impl TrackResponse {
    pub fn samples(&self, fallback_time: DateTime<Utc>) -> Vec<PositionSample> {
        normalize_batch(&self.positions, fallback_time)
    }
}

/// One aircraft in a bulk response. Positions use `alt`.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkTrack {
    pub icao: String,
    #[serde(default)]
    pub flight: Option<String>,
    #[serde(default)]
    pub aircraft_type: Option<String>,
    #[serde(default)]
    pub registration: Option<String>,
    #[serde(default)]
    pub is_military: bool,
    #[serde(default)]
    pub positions: Vec<RawSample>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkTracksResponse {
    #[serde(default)]
    pub tracks: Vec<BulkTrack>,
}

impl BulkTracksResponse {
    /// Normalized `(hex, samples)` pairs, skipping tracks with nothing usable.
    pub fn into_tracks(self, fallback_time: DateTime<Utc>) -> Vec<(String, Vec<PositionSample>)> {
        self.tracks
            .into_iter()
            .filter_map(|track| {
                let samples = normalize_batch(&track.positions, fallback_time);
                (!samples.is_empty()).then(|| (normalize_hex(&track.icao), samples))
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct TrackServiceClient {
    client: Client,
    base_url: String,
}

impl TrackServiceClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Omitted bounds fall back to the service defaults (last 24 hours).
    pub async fn fetch_track(
        &self,
        icao: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        resolution: Resolution,
    ) -> Result<TrackResponse, FetchError> {
        let url = format!("{}/tracks/{}", self.base_url, normalize_hex(icao));
        let mut query = vec![("resolution", resolution.as_str().to_string())];
        if let Some(start) = start {
            query.push(("start", start.to_rfc3339()));
        }
        if let Some(end) = end {
            query.push(("end", end.to_rfc3339()));
        }
        get_json(&self.client, &url, &query).await
    }

    pub async fn fetch_bulk(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        resolution: Resolution,
        max_tracks: u32,
    ) -> Result<BulkTracksResponse, FetchError> {
        let url = format!("{}/tracks/bulk/timelapse", self.base_url);
        let query = [
            ("start", start.to_rfc3339()),
            ("end", end.to_rfc3339()),
            ("resolution", resolution.as_str().to_string()),
            ("max_tracks", max_tracks.to_string()),
        ];
        let response: BulkTracksResponse = get_json(&self.client, &url, &query).await?;
        tracing::debug!(
            "Track service returned {} track(s) for {} .. {}",
            response.tracks.len(),
            start,
            end
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_track_uses_alt_baro_and_iso_times() {
        let response: TrackResponse = serde_json::from_value(json!({
            "icao": "a1b2c3",
            "start": "2024-06-01T11:00:00+00:00",
            "end": "2024-06-01T12:00:00+00:00",
            "resolution": "full",
            "positions": [
                {"time": "2024-06-01T11:00:00+00:00", "lat": 39.9, "lon": -104.8, "alt_baro": 12000, "gs": 300.0, "track": 90.0, "flight": "SWA1"},
                {"time": "2024-06-01T11:00:05.250000", "lat": 39.91, "lon": -104.8, "alt_baro": null, "gs": null, "track": null, "flight": null}
            ]
        }))
        .unwrap();

        let samples = response.samples(Utc::now());
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].altitude_ft, 12000.0);
        assert_eq!(samples[1].altitude_ft, 0.0);
        assert_eq!(samples[1].ground_speed_kts, 0.0);
        assert_eq!(samples[1].timestamp.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn bulk_tracks_use_alt_alias() {
        let response: BulkTracksResponse = serde_json::from_value(json!({
            "time_range": {"start": "2024-06-01T11:00:00+00:00", "end": "2024-06-01T12:00:00+00:00", "resolution": "full"},
            "stats": {"unique_aircraft": 2, "total_positions": 3},
            "tracks": [
                {"icao": "AE1234", "flight": "RCH01", "aircraft_type": "C17", "registration": null, "is_military": true,
                 "positions": [
                    {"time": "2024-06-01T11:00:00+00:00", "lat": 39.9, "lon": -104.8, "alt": 24000, "gs": 400.0},
                    {"time": "2024-06-01T11:00:10+00:00", "lat": 39.95, "lon": -104.8, "alt": 24100, "gs": 401.0}
                 ]},
                {"icao": "bad001", "positions": [{"time": "2024-06-01T11:00:00+00:00", "lat": null, "lon": null, "alt": 1000}]}
            ]
        }))
        .unwrap();

        assert!(response.tracks[0].is_military);
        let tracks = response.into_tracks(Utc::now());
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].0, "ae1234");
        assert_eq!(tracks[0].1[1].altitude_ft, 24100.0);
    }

    #[test]
    fn resolution_wire_names() {
        assert_eq!(serde_json::to_string(&Resolution::OneMinute).unwrap(), "\"1min\"");
        let parsed: Resolution = serde_json::from_str("\"5min\"").unwrap();
        assert_eq!(parsed, Resolution::FiveMinutes);
        assert_eq!(Resolution::default().as_str(), "full");
    }
}
