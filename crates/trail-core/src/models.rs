//! Core data models for the trail pipeline.
//!
//! `RawSample` is the permissive wire shape (several historical API
//! spellings of the same field). Everything past the ingestion boundary
//! works on the strict `PositionSample`.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Altitude below which a sample is considered suspect.
pub const MIN_VALID_ALTITUDE_FT: f64 = 500.0;

/// Why a raw sample was rejected at the ingestion boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SampleError {
    #[error("sample has no position")]
    MissingCoordinates,

    #[error("non-finite coordinate ({lat}, {lon})")]
    NonFiniteCoordinate { lat: f64, lon: f64 },

    #[error("coordinate out of range ({lat}, {lon})")]
    OutOfRange { lat: f64, lon: f64 },

    #[error("unparseable timestamp {0:?}")]
    BadTimestamp(String),
}

/// Altitude as delivered by readsb-style feeds: usually feet, sometimes the literal "ground".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAltitude {
    Feet(f64),
    Label(String),
}

impl RawAltitude {
    pub fn feet(&self) -> f64 {
        match self {
            RawAltitude::Feet(ft) => *ft,
            RawAltitude::Label(label) => label.trim().parse::<f64>().unwrap_or(0.0),
        }
    }
}

/// Capture time: epoch milliseconds or an RFC 3339 string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTime {
    Millis(f64),
    Text(String),
}

impl RawTime {
    pub fn to_utc(&self) -> Result<DateTime<Utc>, SampleError> {
        match self {
            RawTime::Millis(ms) => {
                if !ms.is_finite() {
                    return Err(SampleError::BadTimestamp(ms.to_string()));
                }
                Utc.timestamp_millis_opt(*ms as i64)
                    .single()
                    .ok_or_else(|| SampleError::BadTimestamp(ms.to_string()))
            }
            RawTime::Text(text) => {
                if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
                    return Ok(dt.with_timezone(&Utc));
                }
                // Track service may emit naive ISO strings; those are UTC.
                NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                    .map(|naive| naive.and_utc())
                    .map_err(|_| SampleError::BadTimestamp(text.clone()))
            }
        }
    }
}

/// One telemetry observation as received from any upstream API shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSample {
    #[serde(default, alias = "icao")]
    pub hex: Option<String>,
    #[serde(default, alias = "latitude")]
    pub lat: Option<f64>,
    #[serde(default, alias = "longitude")]
    pub lon: Option<f64>,
    #[serde(default, alias = "alt", alias = "altitude")]
    pub alt_baro: Option<RawAltitude>,
    #[serde(default, alias = "speed")]
    pub gs: Option<f64>,
    #[serde(default, alias = "time")]
    pub timestamp: Option<RawTime>,
    #[serde(default)]
    pub track: Option<f64>,
    #[serde(default)]
    pub flight: Option<String>,
}

impl RawSample {
    /// Convert into the canonical sample, validating position and time.
    ///
    /// A missing altitude becomes 0 ft and is left for the smoother to repair.
    pub fn normalize(&self, fallback_time: DateTime<Utc>) -> Result<PositionSample, SampleError> {
        let (Some(lat), Some(lon)) = (self.lat, self.lon) else {
            return Err(SampleError::MissingCoordinates);
        };
        if !lat.is_finite() || !lon.is_finite() {
            return Err(SampleError::NonFiniteCoordinate { lat, lon });
        }
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(SampleError::OutOfRange { lat, lon });
        }

        let timestamp = match &self.timestamp {
            Some(raw) => raw.to_utc()?,
            None => fallback_time,
        };

        let altitude_ft = self
            .alt_baro
            .as_ref()
            .map(RawAltitude::feet)
            .filter(|ft| ft.is_finite())
            .unwrap_or(0.0);
        let ground_speed_kts = self.gs.filter(|gs| gs.is_finite()).unwrap_or(0.0);

        Ok(PositionSample {
            lat,
            lon,
            altitude_ft,
            ground_speed_kts,
            timestamp,
        })
    }
}

/// Canonical aircraft key: trimmed, lowercase ICAO hex.
pub fn normalize_hex(hex: &str) -> String {
    hex.trim().to_lowercase()
}

/// Normalize a batch, dropping malformed samples one at a time.
pub fn normalize_batch(raw: &[RawSample], fallback_time: DateTime<Utc>) -> Vec<PositionSample> {
    let mut samples = Vec::with_capacity(raw.len());
    for (idx, sample) in raw.iter().enumerate() {
        match sample.normalize(fallback_time) {
            Ok(sample) => samples.push(sample),
            Err(err) => tracing::debug!("Dropping sample {}: {}", idx, err),
        }
    }
    samples
}

/// Canonical telemetry observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub lat: f64,
    pub lon: f64,
    pub altitude_ft: f64,
    #[serde(default)]
    pub ground_speed_kts: f64,
    pub timestamp: DateTime<Utc>,
}

impl PositionSample {
    pub fn new(lat: f64, lon: f64, altitude_ft: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            lat,
            lon,
            altitude_ft,
            ground_speed_kts: 0.0,
            timestamp,
        }
    }

    pub fn with_speed(mut self, ground_speed_kts: f64) -> Self {
        self.ground_speed_kts = ground_speed_kts;
        self
    }

    /// True if the altitude must be repaired before it drives color or geometry.
    pub fn altitude_suspect(&self) -> bool {
        !(self.altitude_ft >= MIN_VALID_ALTITUDE_FT)
    }
}

/// Time-ordered samples for one aircraft.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub hex: String,
    pub samples: Vec<PositionSample>,
}

impl Track {
    /// Build a track, sorting samples by capture time.
    pub fn new(hex: impl Into<String>, mut samples: Vec<PositionSample>) -> Self {
        samples.sort_by_key(|s| s.timestamp);
        Self {
            hex: normalize_hex(&hex.into()),
            samples,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Indices `i` where the segment `samples[i-1] -> samples[i]` is a discontinuity.
    pub fn gap_indices(&self, policy: &crate::spatial::GapPolicy) -> Vec<usize> {
        self.samples
            .windows(2)
            .enumerate()
            .filter(|(_, pair)| crate::spatial::is_sample_gap(&pair[0], &pair[1], policy))
            .map(|(idx, _)| idx + 1)
            .collect()
    }
}

/// Render-ready point in scene space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub altitude_ft: f64,
    pub ground_speed_kts: f64,
    pub timestamp: DateTime<Utc>,
}

impl TrailPoint {
    pub fn new(
        x: f64,
        y: f64,
        z: f64,
        altitude_ft: f64,
        ground_speed_kts: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            x,
            y,
            z,
            altitude_ft,
            ground_speed_kts,
            timestamp,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrailState {
    /// Telemetry is arriving
    #[default]
    Active,
    /// Aircraft left the live feed; trail retained
    Stale,
    /// Removed
    Expired,
}

/// Which derived quantity drives point colors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Altitude,
    Speed,
}

impl ColorMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "altitude" | "alt" => Some(Self::Altitude),
            "speed" | "gs" => Some(Self::Speed),
            _ => None,
        }
    }
}
