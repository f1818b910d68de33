//! Spatial math: distances, scene projection and trail discontinuities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::models::{PositionSample, TrailPoint};

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;
const FEET_TO_KM: f64 = 0.000_304_8;

/// Great-circle distance in meters (Haversine).
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Meters per degree of latitude at a given latitude (WGS84 approximation).
pub fn meters_per_deg_lat(lat_deg: f64) -> f64 {
    let lat_rad = lat_deg.to_radians();
    111_132.954 - 559.822 * (2.0 * lat_rad).cos() + 1.175 * (4.0 * lat_rad).cos()
        - 0.0023 * (6.0 * lat_rad).cos()
}

/// Meters per degree of longitude at a given latitude (WGS84 approximation).
pub fn meters_per_deg_lon(lat_deg: f64) -> f64 {
    let lat_rad = lat_deg.to_radians();
    111_412.84 * lat_rad.cos() - 93.5 * (3.0 * lat_rad).cos() + 0.118 * (5.0 * lat_rad).cos()
}

/// Local tangent-plane projection around a home location.
///
/// Scene axes: `x` east, `y` up, `z` south (north is `-z`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SceneProjection {
    pub origin_lat: f64,
    pub origin_lon: f64,
    /// Scene units per horizontal kilometer
    pub units_per_km: f64,
    /// Multiplier applied to altitude before scaling
    pub vertical_exaggeration: f64,
}

impl Default for SceneProjection {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl SceneProjection {
    pub fn new(origin_lat: f64, origin_lon: f64) -> Self {
        Self {
            origin_lat,
            origin_lon,
            units_per_km: 1.0,
            vertical_exaggeration: 1.0,
        }
    }

    /// Project to scene space. `None` if the result is not finite.
    pub fn project(&self, lat: f64, lon: f64, altitude_ft: f64) -> Option<(f64, f64, f64)> {
        let north_m = (lat - self.origin_lat) * meters_per_deg_lat(self.origin_lat);
        let east_m = (lon - self.origin_lon) * meters_per_deg_lon(self.origin_lat);

        let x = east_m / 1000.0 * self.units_per_km;
        let z = -north_m / 1000.0 * self.units_per_km;
        let y = altitude_ft * FEET_TO_KM * self.vertical_exaggeration * self.units_per_km;

        (x.is_finite() && y.is_finite() && z.is_finite()).then_some((x, y, z))
    }

    pub fn project_sample(&self, sample: &PositionSample) -> Option<TrailPoint> {
        if !(-90.0..=90.0).contains(&sample.lat) || !(-180.0..=180.0).contains(&sample.lon) {
            return None;
        }
        let (x, y, z) = self.project(sample.lat, sample.lon, sample.altitude_ft)?;
        Some(TrailPoint {
            x,
            y,
            z,
            altitude_ft: sample.altitude_ft,
            ground_speed_kts: sample.ground_speed_kts,
            timestamp: sample.timestamp,
        })
    }

    /// Inverse of the horizontal projection: scene `(x, z)` back to `(lat, lon)`.
    pub fn unproject(&self, x: f64, z: f64) -> (f64, f64) {
        let north_m = -z / self.units_per_km * 1000.0;
        let east_m = x / self.units_per_km * 1000.0;
        let lat = self.origin_lat + north_m / meters_per_deg_lat(self.origin_lat);
        let lon = self.origin_lon + east_m / meters_per_deg_lon(self.origin_lat);
        (lat, lon)
    }

    /// Great-circle distance between two scene points, in kilometers.
    ///
    /// The tangent plane is only true near the origin, so points are mapped
    /// back to geographic coordinates before measuring.
    pub fn horizontal_km(&self, a: &TrailPoint, b: &TrailPoint) -> f64 {
        let (lat1, lon1) = self.unproject(a.x, a.z);
        let (lat2, lon2) = self.unproject(b.x, b.z);
        haversine_distance(lat1, lon1, lat2, lon2) / 1000.0
    }
}

/// Thresholds beyond which consecutive points are not drawn as connected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GapPolicy {
    pub max_distance_km: f64,
    pub max_time_gap_secs: i64,
}

impl Default for GapPolicy {
    fn default() -> Self {
        Self {
            max_distance_km: 10.0,
            max_time_gap_secs: 300,
        }
    }
}

impl GapPolicy {
    fn exceeds(&self, distance_km: f64, a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
        let dt = (b - a).num_milliseconds().abs();
        distance_km > self.max_distance_km || dt > self.max_time_gap_secs * 1000
    }
}

/// True if the segment between two trail points is a tracking discontinuity.
pub fn is_gap(
    a: &TrailPoint,
    b: &TrailPoint,
    projection: &SceneProjection,
    policy: &GapPolicy,
) -> bool {
    policy.exceeds(projection.horizontal_km(a, b), a.timestamp, b.timestamp)
}

/// Same predicate on raw samples, using great-circle distance.
pub fn is_sample_gap(a: &PositionSample, b: &PositionSample, policy: &GapPolicy) -> bool {
    let distance_km = haversine_distance(a.lat, a.lon, b.lat, b.lon) / 1000.0;
    policy.exceeds(distance_km, a.timestamp, b.timestamp)
}

/// Index ranges of connected runs with at least two points.
///
/// Single points between gaps are left out; a curtain or ribbon needs a segment.
pub fn continuous_runs(
    points: &[TrailPoint],
    projection: &SceneProjection,
    policy: &GapPolicy,
) -> Vec<Range<usize>> {
    let mut runs = Vec::new();
    if points.len() < 2 {
        return runs;
    }

    let mut start = 0;
    for i in 1..points.len() {
        if is_gap(&points[i - 1], &points[i], projection, policy) {
            if i - start >= 2 {
                runs.push(start..i);
            }
            start = i;
        }
    }
    if points.len() - start >= 2 {
        runs.push(start..points.len());
    }
    runs
}
