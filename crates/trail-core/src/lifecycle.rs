//! Trail lifecycle: active -> stale -> expired, plus auto-fade trimming.
//!
//! A trail lives in exactly one of the `active` or `stale` maps. Expired
//! trails are simply gone. Reappearing aircraft queue a dashed gap
//! connector between the last stale point and the new position; the
//! connector is never part of the trail buffer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::models::{normalize_hex, ColorMode, PositionSample, Track, TrailPoint, TrailState};
use crate::settings::{FadeSettings, TrailSettings};
use crate::smoothing::{smooth_samples, SmoothReport};
use crate::spatial::SceneProjection;
use crate::trail::{Trail, TrailSnapshot, TrailSummary};

/// Oldest connectors are dropped past this many undrained entries.
pub const MAX_PENDING_GAP_CONNECTORS: usize = 1024;

/// Result of retiring a hex that left the live feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetireOutcome {
    MovedToStale,
    /// Immediate fade is on; trail dropped without a stale phase
    Deleted,
    /// No active trail for this hex
    NotActive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestOutcome {
    Appended,
    /// Trail came back from stale; a gap connector was queued
    Reactivated,
    /// Duplicate, out-of-order or unprojectable sample
    Skipped,
}

/// Ephemeral dashed segment bridging a tracking discontinuity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapConnector {
    pub hex: String,
    pub from: TrailPoint,
    pub to: TrailPoint,
    pub dashed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RebuildOutcome {
    Committed {
        points: usize,
        state: TrailState,
        report: SmoothReport,
    },
    /// Fewer than two usable points; nothing stored
    Discarded { valid_points: usize },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FadeSweep {
    pub points_removed: usize,
    pub expired: Vec<String>,
}

/// Owns every trail and enforces the lifecycle rules.
#[derive(Debug, Clone)]
pub struct TrailManager {
    settings: TrailSettings,
    projection: SceneProjection,
    active: HashMap<String, Trail>,
    stale: HashMap<String, Trail>,
    gap_connectors: Vec<GapConnector>,
}

impl Default for TrailManager {
    fn default() -> Self {
        Self::new(TrailSettings::default(), SceneProjection::default())
    }
}

impl TrailManager {
    pub fn new(settings: TrailSettings, projection: SceneProjection) -> Self {
        Self {
            settings,
            projection,
            active: HashMap::new(),
            stale: HashMap::new(),
            gap_connectors: Vec::new(),
        }
    }

    pub fn settings(&self) -> &TrailSettings {
        &self.settings
    }

    pub fn set_fade(&mut self, fade: FadeSettings) {
        self.settings.fade = fade;
    }

    pub fn projection(&self) -> &SceneProjection {
        &self.projection
    }

    /// Allocate an empty active trail. A stale trail for the same hex is discarded.
    pub fn create(&mut self, hex: &str, now: DateTime<Utc>) -> &mut Trail {
        let key = normalize_hex(hex);
        if self.stale.remove(&key).is_some() {
            tracing::debug!("Replacing stale trail for {}", key);
        }
        let capacity = self.settings.initial_capacity;
        self.active
            .entry(key.clone())
            .or_insert_with(|| Trail::new(key, capacity, now))
    }

    /// Append a scene-space point. Returns true if the hex came back from stale.
    pub fn append(&mut self, hex: &str, point: TrailPoint, mode: ColorMode) -> bool {
        if !point.is_finite() {
            tracing::debug!("Skipping non-finite point for {}", hex);
            return false;
        }
        let key = normalize_hex(hex);

        let reappeared = match self.stale.remove(&key) {
            Some(mut trail) => {
                trail.state = TrailState::Active;
                if let Some(last) = trail.positions().last().copied() {
                    self.queue_gap_connector(GapConnector {
                        hex: key.clone(),
                        from: last,
                        to: point,
                        dashed: true,
                        created_at: point.timestamp,
                    });
                }
                tracing::debug!("Trail {} reactivated", key);
                self.active.insert(key.clone(), trail);
                true
            }
            None => false,
        };

        if !self.active.contains_key(&key) {
            self.create(&key, point.timestamp);
        }
        if let Some(trail) = self.active.get_mut(&key) {
            trail.append(point, mode);
        }
        reappeared
    }

    /// Project a live sample and append it.
    ///
    /// Samples no newer than the trail's last point are ignored, so polling
    /// an unchanged position does not duplicate it. A suspect altitude holds
    /// the trail's last altitude, the incremental form of trailing-dropout
    /// repair.
    pub fn ingest(&mut self, hex: &str, sample: &PositionSample, mode: ColorMode) -> IngestOutcome {
        let key = normalize_hex(hex);
        let last = self
            .active
            .get(&key)
            .or_else(|| self.stale.get(&key))
            .and_then(|trail| trail.positions().last().copied());

        let mut sample = *sample;
        if let Some(last) = last {
            if sample.timestamp <= last.timestamp {
                return IngestOutcome::Skipped;
            }
            if sample.altitude_suspect() {
                sample.altitude_ft = last.altitude_ft;
            }
        }

        let Some(point) = self.projection.project_sample(&sample) else {
            tracing::debug!("Skipping unprojectable sample for {}", key);
            return IngestOutcome::Skipped;
        };
        if self.append(&key, point, mode) {
            IngestOutcome::Reactivated
        } else {
            IngestOutcome::Appended
        }
    }

    /// Telemetry stopped for `hex`.
    pub fn retire(&mut self, hex: &str) -> RetireOutcome {
        let key = normalize_hex(hex);
        let Some(mut trail) = self.active.remove(&key) else {
            return RetireOutcome::NotActive;
        };

        if self.settings.fade.immediate {
            tracing::debug!("Trail {} deleted (immediate fade)", key);
            self.drop_gap_connectors(&[key]);
            return RetireOutcome::Deleted;
        }

        trail.state = TrailState::Stale;
        self.stale.insert(key, trail);
        RetireOutcome::MovedToStale
    }

    /// Retire every active hex missing from the latest live snapshot.
    pub fn sync_live(&mut self, seen: &HashSet<String>) -> Vec<(String, RetireOutcome)> {
        let missing: Vec<String> = self
            .active
            .keys()
            .filter(|hex| !seen.contains(*hex))
            .cloned()
            .collect();

        missing
            .into_iter()
            .map(|hex| {
                let outcome = self.retire(&hex);
                (hex, outcome)
            })
            .collect()
    }

    /// Rebuild a trail from a historical batch: smooth, project, filter, commit.
    pub fn rebuild_from_historical(
        &mut self,
        hex: &str,
        samples: &[PositionSample],
        mode: ColorMode,
    ) -> RebuildOutcome {
        let track = Track::new(hex, samples.to_vec());
        let key = track.hex.clone();
        let smoothed = smooth_samples(&track.samples);

        let points: Vec<TrailPoint> = smoothed
            .samples
            .iter()
            .filter_map(|sample| self.projection.project_sample(sample))
            .filter(TrailPoint::is_finite)
            .collect();

        if points.len() < 2 {
            tracing::debug!(
                "Discarding historical trail for {} ({} usable points)",
                key,
                points.len()
            );
            return RebuildOutcome::Discarded {
                valid_points: points.len(),
            };
        }

        // Live points that arrived after the history window stay on the trail.
        let mut points = points;
        let history_end = points[points.len() - 1].timestamp;
        let live_tail: Vec<TrailPoint> = self
            .active
            .get(&key)
            .map(|trail| {
                trail
                    .positions()
                    .iter()
                    .filter(|point| point.timestamp > history_end)
                    .copied()
                    .collect()
            })
            .unwrap_or_default();
        points.extend(live_tail);

        let mut capacity = self.settings.initial_capacity.max(1);
        while capacity < points.len() {
            capacity *= 2;
        }

        let count = points.len();
        let mut trail = Trail::new(key.clone(), capacity, points[0].timestamp);
        trail.extend(points, mode);

        let state = if self.active.contains_key(&key) {
            TrailState::Active
        } else {
            TrailState::Stale
        };
        trail.state = state;
        match state {
            TrailState::Active => {
                self.active.insert(key, trail);
            }
            _ => {
                self.stale.insert(key, trail);
            }
        }

        RebuildOutcome::Committed {
            points: count,
            state,
            report: smoothed.report,
        }
    }

    /// Expire stale trails older than the effective fade threshold.
    ///
    /// Undrained gap connectors of expired trails, and any connector older
    /// than the same threshold, are dropped as well.
    pub fn cleanup_sweep(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let threshold = self.settings.effective_stale_timeout();
        let mut expired = Vec::new();
        self.stale.retain(|hex, trail| {
            let keep = now - trail.last_update <= threshold;
            if !keep {
                expired.push(hex.clone());
            }
            keep
        });
        if !expired.is_empty() {
            tracing::info!("Expired {} stale trail(s)", expired.len());
        }

        self.drop_gap_connectors(&expired);
        let before = self.gap_connectors.len();
        self.gap_connectors.retain(|connector| now - connector.created_at <= threshold);
        if self.gap_connectors.len() < before {
            tracing::debug!("Aged out {} gap connector(s)", before - self.gap_connectors.len());
        }
        expired
    }

    /// Trim points older than `now - fade - window`; emptied trails expire.
    pub fn auto_fade_sweep(&mut self, now: DateTime<Utc>) -> FadeSweep {
        let mut sweep = FadeSweep::default();
        let Some(cutoff_age) = self.settings.fade_cutoff_age() else {
            return sweep;
        };
        let cutoff = now - cutoff_age;

        for trails in [&mut self.active, &mut self.stale] {
            trails.retain(|hex, trail| {
                sweep.points_removed += trail.trim_before(cutoff);
                if trail.is_empty() {
                    sweep.expired.push(hex.clone());
                    return false;
                }
                true
            });
        }

        if sweep.points_removed > 0 {
            tracing::debug!(
                "Auto fade removed {} point(s), expired {} trail(s)",
                sweep.points_removed,
                sweep.expired.len()
            );
        }
        self.drop_gap_connectors(&sweep.expired);
        sweep
    }

    /// Recolor every trail after a color mode change.
    pub fn recolor_all(&mut self, mode: ColorMode) {
        for trail in self.active.values_mut().chain(self.stale.values_mut()) {
            trail.recolor(mode);
        }
    }

    /// Drain connectors queued since the last call.
    pub fn take_gap_connectors(&mut self) -> Vec<GapConnector> {
        std::mem::take(&mut self.gap_connectors)
    }

    pub fn pending_gap_connectors(&self) -> &[GapConnector] {
        &self.gap_connectors
    }

    fn queue_gap_connector(&mut self, connector: GapConnector) {
        if self.gap_connectors.len() >= MAX_PENDING_GAP_CONNECTORS {
            let overflow = self.gap_connectors.len() + 1 - MAX_PENDING_GAP_CONNECTORS;
            self.gap_connectors.drain(..overflow);
            tracing::debug!("Gap connector queue full, dropped {} oldest", overflow);
        }
        self.gap_connectors.push(connector);
    }

    fn drop_gap_connectors(&mut self, hexes: &[String]) {
        if hexes.is_empty() {
            return;
        }
        self.gap_connectors.retain(|connector| !hexes.contains(&connector.hex));
    }

    pub fn get(&self, hex: &str) -> Option<&Trail> {
        let key = normalize_hex(hex);
        self.active.get(&key).or_else(|| self.stale.get(&key))
    }

    /// Untracked hexes report `Expired`.
    pub fn state_of(&self, hex: &str) -> TrailState {
        self.get(hex)
            .map(|trail| trail.state)
            .unwrap_or(TrailState::Expired)
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn stale_len(&self) -> usize {
        self.stale.len()
    }

    pub fn summaries(&self) -> Vec<TrailSummary> {
        let mut summaries: Vec<TrailSummary> = self
            .active
            .values()
            .chain(self.stale.values())
            .map(Trail::summary)
            .collect();
        summaries.sort_by(|a, b| a.hex.cmp(&b.hex));
        summaries
    }

    pub fn snapshot(&self, hex: &str) -> Option<TrailSnapshot> {
        self.get(hex)
            .map(|trail| trail.snapshot(&self.projection, &self.settings.gap))
    }
}
