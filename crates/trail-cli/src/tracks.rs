//! Track documents as served by the track service, plus bare sample arrays.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use trail_core::{
    normalize_batch, normalize_hex, smooth_samples, PositionSample, RawSample, SmoothReport,
};

#[derive(Debug, Deserialize)]
struct BulkEntry {
    icao: String,
    #[serde(default)]
    positions: Vec<RawSample>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TrackDocument {
    Bulk { tracks: Vec<BulkEntry> },
    Single { icao: String, positions: Vec<RawSample> },
    Samples(Vec<RawSample>),
}

/// One track ready for smoothing.
#[derive(Debug, Clone)]
pub struct InputTrack {
    pub hex: Option<String>,
    pub samples: Vec<PositionSample>,
    /// Samples rejected during normalization
    pub dropped: usize,
}

impl InputTrack {
    fn from_raw(hex: Option<&str>, raw: &[RawSample], fallback: DateTime<Utc>) -> Self {
        let mut samples = normalize_batch(raw, fallback);
        samples.sort_by_key(|sample| sample.timestamp);
        Self {
            hex: hex.map(normalize_hex),
            dropped: raw.len() - samples.len(),
            samples,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SmoothedTrackOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hex: Option<String>,
    pub positions: Vec<PositionSample>,
    #[serde(skip)]
    pub report: SmoothReport,
    #[serde(skip)]
    pub dropped: usize,
}

/// Parse single-track, bulk or bare-array JSON.
pub fn parse_document(text: &str) -> Result<Vec<InputTrack>> {
    let document: TrackDocument =
        serde_json::from_str(text).context("Input is not a track, bulk track or sample array")?;
    let now = Utc::now();

    let tracks = match document {
        TrackDocument::Bulk { tracks } => tracks
            .iter()
            .map(|entry| InputTrack::from_raw(Some(&entry.icao), &entry.positions, now))
            .collect(),
        TrackDocument::Single { icao, positions } => {
            vec![InputTrack::from_raw(Some(&icao), &positions, now)]
        }
        TrackDocument::Samples(samples) => vec![InputTrack::from_raw(None, &samples, now)],
    };
    Ok(tracks)
}

pub fn smooth_tracks(tracks: Vec<InputTrack>) -> Vec<SmoothedTrackOutput> {
    tracks
        .into_iter()
        .map(|track| {
            let smoothed = smooth_samples(&track.samples);
            SmoothedTrackOutput {
                hex: track.hex,
                positions: smoothed.samples,
                report: smoothed.report,
                dropped: track.dropped,
            }
        })
        .collect()
}

/// Fetch `hours` of history for one aircraft from the track service.
pub fn fetch_track(base_url: &str, icao: &str, hours: i64) -> Result<String> {
    let end = Utc::now();
    let start = end - Duration::hours(hours.max(1));
    let url = format!(
        "{}/tracks/{}",
        base_url.trim_end_matches('/'),
        normalize_hex(icao)
    );

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .context("Failed to create HTTP client")?;
    let response = client
        .get(&url)
        .query(&[
            ("start", start.to_rfc3339()),
            ("end", end.to_rfc3339()),
            ("resolution", "full".to_string()),
        ])
        .send()
        .with_context(|| format!("Failed to fetch {}", url))?
        .error_for_status()
        .with_context(|| format!("Track service rejected {}", url))?;

    response.text().context("Failed to read track response")
}
