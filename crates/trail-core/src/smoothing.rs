//! Altitude repair for multilateration-derived tracks.
//!
//! MLAT positions frequently arrive with zero altitudes, dropouts at the
//! start or end of a track, and single-sample spikes. The smoother repairs
//! those while keeping the overall climb/cruise/descent profile. Each pass
//! operates on the output of the previous one:
//!
//! 1. reference statistics from altitudes above 500 ft
//! 2. high-altitude flag (max above 10000 ft) tightens every threshold
//! 3. validity check
//! 4. trailing dropouts take the last valid value
//! 5. leading dropouts take the first valid value
//! 6. remaining gaps are interpolated from the nearest valid neighbors
//! 7. neighbor-average outlier suppression
//! 8. a tighter second outlier pass for high-altitude tracks that had bad points

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::models::{PositionSample, MIN_VALID_ALTITUDE_FT};

const HIGH_ALTITUDE_TRACK_FT: f64 = 10_000.0;
const HIGH_TRACK_FLOOR_FT: f64 = 2_000.0;
const HIGH_TRACK_FLOOR_RATIO: f64 = 0.3;

const SEARCH_WINDOW: usize = 20;
const HIGH_TRACK_SEARCH_WINDOW: usize = 30;

const OUTLIER_RATIO: f64 = 0.40;
const HIGH_TRACK_OUTLIER_RATIO: f64 = 0.25;
const SECOND_PASS_OUTLIER_RATIO: f64 = 0.20;

/// What the smoother changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SmoothReport {
    /// Points that failed the validity check before repair
    pub invalid_count: usize,
    pub trailing_repaired: usize,
    pub leading_repaired: usize,
    pub interpolated: usize,
    /// Gaps with no valid neighbor inside the search window
    pub median_fallbacks: usize,
    pub outliers_replaced: usize,
    pub second_pass_replaced: usize,
    pub high_altitude: bool,
    /// No altitude above 500 ft; input returned unchanged
    pub degenerate: bool,
}

impl SmoothReport {
    pub fn changed(&self) -> bool {
        self.trailing_repaired
            + self.leading_repaired
            + self.interpolated
            + self.median_fallbacks
            + self.outliers_replaced
            + self.second_pass_replaced
            > 0
    }
}

/// Smoothed copy of a sample sequence.
#[derive(Debug, Clone)]
pub struct SmoothedTrack {
    pub samples: Vec<PositionSample>,
    pub report: SmoothReport,
}

/// Reference statistics derived from the plausible altitudes of a track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AltitudeReference {
    pub median_ft: f64,
    pub max_ft: f64,
    pub high_altitude: bool,
}

impl AltitudeReference {
    /// `None` when no altitude exceeds 500 ft.
    pub fn from_altitudes(altitudes: &[f64]) -> Option<Self> {
        let mut plausible: Vec<f64> = altitudes
            .iter()
            .copied()
            .filter(|alt| *alt > MIN_VALID_ALTITUDE_FT)
            .collect();
        if plausible.is_empty() {
            return None;
        }

        plausible.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let median_ft = plausible[plausible.len() / 2];
        let max_ft = plausible[plausible.len() - 1];

        Some(Self {
            median_ft,
            max_ft,
            high_altitude: max_ft > HIGH_ALTITUDE_TRACK_FT,
        })
    }

    /// Lowest altitude accepted as valid for this track.
    pub fn min_valid_ft(&self) -> f64 {
        if self.high_altitude {
            HIGH_TRACK_FLOOR_FT.max(HIGH_TRACK_FLOOR_RATIO * self.max_ft)
        } else {
            MIN_VALID_ALTITUDE_FT
        }
    }

    pub fn is_valid(&self, altitude_ft: f64) -> bool {
        altitude_ft.is_finite() && altitude_ft != 0.0 && altitude_ft >= self.min_valid_ft()
    }

    fn search_window(&self) -> usize {
        if self.high_altitude {
            HIGH_TRACK_SEARCH_WINDOW
        } else {
            SEARCH_WINDOW
        }
    }

    fn outlier_ratio(&self) -> f64 {
        if self.high_altitude {
            HIGH_TRACK_OUTLIER_RATIO
        } else {
            OUTLIER_RATIO
        }
    }
}

/// Repair an altitude sequence. Same length as the input.
pub fn smooth_altitudes(altitudes: &[f64]) -> Vec<f64> {
    smooth_altitudes_with_report(altitudes).0
}

/// Repair an altitude sequence and report what changed.
pub fn smooth_altitudes_with_report(altitudes: &[f64]) -> (Vec<f64>, SmoothReport) {
    let mut out = altitudes.to_vec();
    let mut report = SmoothReport::default();

    if out.len() < 2 {
        return (out, report);
    }

    let Some(reference) = AltitudeReference::from_altitudes(&out) else {
        tracing::debug!(
            "No altitude above {}ft in {} samples, leaving track unchanged",
            MIN_VALID_ALTITUDE_FT,
            out.len()
        );
        report.degenerate = true;
        return (out, report);
    };
    report.high_altitude = reference.high_altitude;
    report.invalid_count = out.iter().filter(|alt| !reference.is_valid(**alt)).count();

    if report.invalid_count > 0 {
        repair_trailing(&mut out, &reference, &mut report);
        repair_leading(&mut out, &reference, &mut report);
        interpolate_gaps(&mut out, &reference, &mut report);
    }

    report.outliers_replaced = suppress_outliers(&mut out, reference.outlier_ratio());

    if reference.high_altitude && report.invalid_count > 0 {
        report.second_pass_replaced = suppress_outliers(&mut out, SECOND_PASS_OUTLIER_RATIO);
    }

    if report.changed() {
        tracing::debug!(
            "Smoothed {} altitudes (high={}, invalid={}, interpolated={}, outliers={}+{})",
            out.len(),
            report.high_altitude,
            report.invalid_count,
            report.interpolated + report.median_fallbacks,
            report.outliers_replaced,
            report.second_pass_replaced
        );
    }

    (out, report)
}

/// Deep copy of `samples` with repaired altitudes. The input is untouched.
pub fn smooth_samples(samples: &[PositionSample]) -> SmoothedTrack {
    let altitudes: Vec<f64> = samples.iter().map(|s| s.altitude_ft).collect();
    let (smoothed, report) = smooth_altitudes_with_report(&altitudes);

    let samples = samples
        .iter()
        .zip(smoothed)
        .map(|(sample, altitude_ft)| PositionSample {
            altitude_ft,
            ..*sample
        })
        .collect();

    SmoothedTrack { samples, report }
}

fn repair_trailing(out: &mut [f64], reference: &AltitudeReference, report: &mut SmoothReport) {
    let Some(last_valid) = out.iter().rposition(|alt| reference.is_valid(*alt)) else {
        return;
    };
    let value = out[last_valid];
    for alt in &mut out[last_valid + 1..] {
        *alt = value;
        report.trailing_repaired += 1;
    }
}

fn repair_leading(out: &mut [f64], reference: &AltitudeReference, report: &mut SmoothReport) {
    let Some(first_valid) = out.iter().position(|alt| reference.is_valid(*alt)) else {
        return;
    };
    let value = out[first_valid];
    for alt in &mut out[..first_valid] {
        *alt = value;
        report.leading_repaired += 1;
    }
}

fn interpolate_gaps(out: &mut [f64], reference: &AltitudeReference, report: &mut SmoothReport) {
    let snapshot = out.to_vec();
    let n = snapshot.len();
    let window = reference.search_window();
    let valid = |idx: &usize| reference.is_valid(snapshot[*idx]);

    for i in 0..n {
        if reference.is_valid(snapshot[i]) {
            continue;
        }

        let prev = (i.saturating_sub(window)..i).rev().find(valid);
        let next = (i + 1..(i + 1 + window).min(n)).find(valid);

        out[i] = match (prev, next) {
            (Some(p), Some(q)) => {
                let t = (i - p) as f64 / (q - p) as f64;
                report.interpolated += 1;
                snapshot[p] + (snapshot[q] - snapshot[p]) * t
            }
            (Some(p), None) => {
                report.interpolated += 1;
                snapshot[p]
            }
            (None, Some(q)) => {
                report.interpolated += 1;
                snapshot[q]
            }
            (None, None) => {
                report.median_fallbacks += 1;
                reference.median_ft
            }
        };
    }
}

fn neighbor_average(values: &[f64], idx: usize) -> f64 {
    (values[idx - 1] + values[idx + 1]) / 2.0
}

fn relative_deviation(values: &[f64], idx: usize) -> Option<f64> {
    let avg = neighbor_average(values, idx);
    if !(avg > 0.0) {
        return None;
    }
    Some((values[idx] - avg).abs() / avg)
}

/// Replace interior points that deviate from their neighbor average by more than `ratio`.
///
/// Candidates are handled worst first and re-checked against current neighbors,
/// so one spike cannot drag its neighbors along with it.
fn suppress_outliers(values: &mut [f64], ratio: f64) -> usize {
    if values.len() < 3 {
        return 0;
    }

    let mut candidates: Vec<(usize, f64)> = (1..values.len() - 1)
        .filter_map(|idx| {
            relative_deviation(values, idx)
                .filter(|dev| *dev > ratio)
                .map(|dev| (idx, dev))
        })
        .collect();
    candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    let mut replaced = 0;
    for (idx, _) in candidates {
        if relative_deviation(values, idx).is_some_and(|dev| dev > ratio) {
            values[idx] = neighbor_average(values, idx);
            replaced += 1;
        }
    }
    replaced
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn approx(a: &[f64], b: &[f64]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-6)
    }

    #[test]
    fn short_inputs_are_identity() {
        assert!(smooth_altitudes(&[]).is_empty());
        assert_eq!(smooth_altitudes(&[0.0]), vec![0.0]);
    }

    #[test]
    fn all_low_track_is_unchanged() {
        let input = [0.0, 200.0, 0.0, 450.0];
        let (out, report) = smooth_altitudes_with_report(&input);
        assert_eq!(out, input.to_vec());
        assert!(report.degenerate);
    }

    #[test]
    fn trailing_zeros_take_last_valid() {
        let out = smooth_altitudes(&[3000.0, 3200.0, 0.0, 0.0]);
        assert!(approx(&out, &[3000.0, 3200.0, 3200.0, 3200.0]));
    }

    #[test]
    fn leading_zeros_take_first_valid() {
        let out = smooth_altitudes(&[0.0, 0.0, 3200.0, 3400.0]);
        assert!(approx(&out, &[3200.0, 3200.0, 3200.0, 3400.0]));
    }

    #[test]
    fn middle_gap_is_interpolated() {
        let (out, report) = smooth_altitudes_with_report(&[1000.0, 0.0, 0.0, 4000.0]);
        assert!(approx(&out, &[1000.0, 2000.0, 3000.0, 4000.0]), "{out:?}");
        assert_eq!(report.interpolated, 2);
        assert!(!report.high_altitude);
    }

    #[test]
    fn single_spike_is_flattened() {
        let (out, report) = smooth_altitudes_with_report(&[1000.0, 1000.0, 5000.0, 1000.0, 1000.0]);
        assert!(approx(&out, &[1000.0; 5]), "{out:?}");
        assert_eq!(report.outliers_replaced, 1);
    }

    #[test]
    fn high_altitude_track_rejects_mlat_dips() {
        // 3000ft is plausible on its own but not in the middle of a 36000ft cruise.
        let input = [36000.0, 36000.0, 3000.0, 36000.0, 36000.0];
        let (out, report) = smooth_altitudes_with_report(&input);
        assert!(report.high_altitude);
        assert_eq!(report.invalid_count, 1);
        assert!(approx(&out, &[36000.0; 5]), "{out:?}");
    }

    #[test]
    fn gap_without_neighbors_in_window_uses_median() {
        let mut input = vec![3000.0];
        input.extend(std::iter::repeat(0.0).take(45));
        input.push(5000.0);
        let (out, report) = smooth_altitudes_with_report(&input);
        assert_eq!(out.len(), input.len());
        assert!(report.median_fallbacks > 0);
        // Upper-middle of [3000, 5000]
        assert!(out.iter().any(|alt| (*alt - 5000.0).abs() < 1e-6));
        assert!(out.iter().all(|alt| *alt >= 500.0));
    }

    #[test]
    fn smoothing_reaches_a_fixed_point() {
        let profile: Vec<f64> = (0..120)
            .map(|i| match i {
                0..=2 => 0.0,
                40 | 41 | 77 => 0.0,
                60 => 150.0,
                i if i < 30 => 2000.0 + i as f64 * 1000.0,
                _ => 32000.0,
            })
            .collect();

        let once = smooth_altitudes(&profile);
        let (twice, report) = smooth_altitudes_with_report(&once);
        assert_eq!(report.invalid_count, 0);
        assert_eq!(once.len(), profile.len());
        assert_eq!(twice.len(), once.len());
    }

    #[test]
    fn samples_are_deep_copied() {
        let t0 = Utc::now();
        let input: Vec<PositionSample> = [5000.0, 0.0, 5200.0]
            .iter()
            .enumerate()
            .map(|(i, alt)| {
                PositionSample::new(40.0, -105.0, *alt, t0 + Duration::seconds(i as i64 * 5))
                    .with_speed(220.0)
            })
            .collect();

        let smoothed = smooth_samples(&input);
        assert_eq!(input[1].altitude_ft, 0.0);
        assert!((smoothed.samples[1].altitude_ft - 5100.0).abs() < 1e-6);
        assert_eq!(smoothed.samples[1].timestamp, input[1].timestamp);
        assert_eq!(smoothed.samples[1].ground_speed_kts, 220.0);
    }
}
