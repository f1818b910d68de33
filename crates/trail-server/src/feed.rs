//! Live aircraft feed client (readsb / ultrafeeder `aircraft.json`).

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use trail_core::{normalize_hex, PositionSample, RawSample};

use crate::http::{build_client, get_json, FetchError};

/// One entry of the `aircraft` array. Unknown readsb fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedAircraft {
    #[serde(flatten)]
    pub sample: RawSample,
    /// Seconds since the position was last updated
    #[serde(default)]
    pub seen_pos: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedSnapshot {
    /// Receiver clock, epoch seconds
    #[serde(default)]
    pub now: Option<f64>,
    #[serde(default)]
    pub aircraft: Vec<FeedAircraft>,
}

/// Position report for an aircraft currently in the live feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveAircraft {
    pub hex: String,
    pub flight: Option<String>,
    pub track_deg: Option<f64>,
    pub sample: PositionSample,
}

impl FeedSnapshot {
    pub fn receiver_time(&self) -> Option<DateTime<Utc>> {
        let secs = self.now.filter(|s| s.is_finite() && *s > 0.0)?;
        Utc.timestamp_millis_opt((secs * 1000.0) as i64).single()
    }

    /// Aircraft with a hex and a usable position. Capture time is
    /// `now - seen_pos` on the receiver clock.
    pub fn positions(&self, fallback_now: DateTime<Utc>) -> Vec<LiveAircraft> {
        let now = self.receiver_time().unwrap_or(fallback_now);
        let mut live = Vec::with_capacity(self.aircraft.len());

        for entry in &self.aircraft {
            let Some(hex) = entry.sample.hex.as_deref().map(normalize_hex) else {
                continue;
            };
            if hex.is_empty() {
                continue;
            }

            let seen_ms = entry
                .seen_pos
                .filter(|s| s.is_finite() && *s >= 0.0)
                .map(|s| (s * 1000.0) as i64)
                .unwrap_or(0);
            let captured = now - ChronoDuration::milliseconds(seen_ms);

            match entry.sample.normalize(captured) {
                Ok(sample) => live.push(LiveAircraft {
                    flight: entry
                        .sample
                        .flight
                        .as_deref()
                        .map(str::trim)
                        .filter(|f| !f.is_empty())
                        .map(str::to_string),
                    track_deg: entry.sample.track,
                    hex,
                    sample,
                }),
                Err(err) => tracing::trace!("Feed entry {} skipped: {}", hex, err),
            }
        }
        live
    }
}

/// Polls `{base}/data/aircraft.json`.
#[derive(Debug, Clone)]
pub struct FeedClient {
    client: Client,
    url: String,
}

impl FeedClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            url: format!("{}/data/aircraft.json", base_url.trim_end_matches('/')),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn fetch(&self) -> Result<FeedSnapshot, FetchError> {
        get_json(&self.client, &self.url, &[] as &[(&str, &str)]).await
    }
}
