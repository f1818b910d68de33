//! In-memory state: the trail manager plus DashMap side tables.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use trail_core::{
    normalize_hex, ColorMode, FadeDuration, FadeSettings, FadeSweep, GapConnector, GapPolicy,
    IngestOutcome, LoadGeneration, LoadTicket, PositionSample, RebuildOutcome, TrailManager,
    TrailSnapshot, TrailState, TrailSummary,
};

use crate::config::Config;
use crate::feed::LiveAircraft;
use crate::history::TrackServiceClient;

/// Manager and color mode share one lock so a mode switch and its recolor
/// cannot interleave with an append.
struct TrailStore {
    manager: TrailManager,
    color_mode: ColorMode,
}

/// Application state shared by the loops and the API.
pub struct AppState {
    trails: Mutex<TrailStore>,
    live: DashMap<String, LiveAircraft>,
    heartbeats: DashMap<String, DateTime<Utc>>,
    recent_loads: LoadGeneration,
    history_loads: DashMap<String, Arc<LoadGeneration>>,
    track_service: TrackServiceClient,
    feed_failures: AtomicU32,
    last_feed_at: Mutex<Option<DateTime<Utc>>>,
    recent_window: ChronoDuration,
    max_recent_tracks: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LiveUpdate {
    pub aircraft: usize,
    pub appended: usize,
    pub reactivated: usize,
    pub skipped: usize,
    pub retired: usize,
}

/// Result of committing a historical batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadCommit {
    pub committed: usize,
    pub discarded: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsView {
    pub color_mode: ColorMode,
    pub fade: FadeSettings,
    pub stale_timeout_secs: u64,
    pub gap: GapPolicy,
}

/// Partial settings change; absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsUpdate {
    pub color_mode: Option<ColorMode>,
    pub auto_fade: Option<bool>,
    pub fade_duration: Option<FadeDuration>,
    pub immediate_fade: Option<bool>,
}

impl SettingsUpdate {
    pub fn is_valid(&self) -> bool {
        self.fade_duration.map_or(true, |duration| duration.is_valid())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub active_trails: usize,
    pub stale_trails: usize,
    pub live_aircraft: usize,
    pub pending_gaps: usize,
    pub color_mode: ColorMode,
    pub recent_load_in_flight: bool,
    pub recent_load_generation: u64,
    pub feed_consecutive_failures: u32,
    pub last_feed_update: Option<DateTime<Utc>>,
    pub loop_heartbeats: HashMap<String, DateTime<Utc>>,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        Self {
            trails: Mutex::new(TrailStore {
                manager: TrailManager::new(config.trail_settings(), config.projection()),
                color_mode: config.color_mode,
            }),
            live: DashMap::new(),
            heartbeats: DashMap::new(),
            recent_loads: LoadGeneration::new(),
            history_loads: DashMap::new(),
            track_service: TrackServiceClient::new(&config.track_service_url, timeout),
            feed_failures: AtomicU32::new(0),
            last_feed_at: Mutex::new(None),
            recent_window: ChronoDuration::minutes(config.recent_trail_minutes),
            max_recent_tracks: config.max_recent_tracks,
        }
    }

    fn lock_trails(&self) -> MutexGuard<'_, TrailStore> {
        // Poisoned: keep serving the last written state.
        self.trails
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn track_service(&self) -> &TrackServiceClient {
        &self.track_service
    }

    pub fn recent_window(&self) -> ChronoDuration {
        self.recent_window
    }

    pub fn max_recent_tracks(&self) -> u32 {
        self.max_recent_tracks
    }

    pub fn recent_loads(&self) -> &LoadGeneration {
        &self.recent_loads
    }

    /// Per-aircraft guard for single-track history loads.
    pub fn history_guard(&self, hex: &str) -> Arc<LoadGeneration> {
        self.history_loads
            .entry(normalize_hex(hex))
            .or_insert_with(|| Arc::new(LoadGeneration::new()))
            .clone()
    }

    // === Settings ===

    pub fn color_mode(&self) -> ColorMode {
        self.lock_trails().color_mode
    }

    pub fn settings_view(&self) -> SettingsView {
        let store = self.lock_trails();
        let settings = store.manager.settings();
        SettingsView {
            color_mode: store.color_mode,
            fade: settings.fade,
            stale_timeout_secs: settings.stale_timeout_secs,
            gap: settings.gap,
        }
    }

    /// Apply a settings change. A new color mode recolors every trail.
    pub fn apply_settings(&self, update: SettingsUpdate) -> SettingsView {
        {
            let mut store = self.lock_trails();
            let mut fade = store.manager.settings().fade;
            if let Some(auto_fade) = update.auto_fade {
                fade.auto_fade = auto_fade;
            }
            if let Some(duration) = update.fade_duration {
                fade.duration = duration;
            }
            if let Some(immediate) = update.immediate_fade {
                fade.immediate = immediate;
            }
            store.manager.set_fade(fade);

            if let Some(mode) = update.color_mode {
                if mode != store.color_mode {
                    store.color_mode = mode;
                    store.manager.recolor_all(mode);
                    tracing::info!("Color mode set to {:?}", mode);
                }
            }
        }
        self.settings_view()
    }

    // === Live feed ===

    /// Ingest one feed snapshot and retire aircraft that dropped out of it.
    pub fn apply_live_snapshot(&self, aircraft: Vec<LiveAircraft>) -> LiveUpdate {
        let mut update = LiveUpdate {
            aircraft: aircraft.len(),
            ..LiveUpdate::default()
        };
        let mut seen: HashSet<String> = HashSet::with_capacity(aircraft.len());

        {
            let mut store = self.lock_trails();
            let mode = store.color_mode;
            for entry in &aircraft {
                seen.insert(normalize_hex(&entry.hex));
                match store.manager.ingest(&entry.hex, &entry.sample, mode) {
                    IngestOutcome::Appended => update.appended += 1,
                    IngestOutcome::Reactivated => update.reactivated += 1,
                    IngestOutcome::Skipped => update.skipped += 1,
                }
            }
            update.retired = store.manager.sync_live(&seen).len();
        }

        self.live.retain(|hex, _| seen.contains(hex));
        for entry in aircraft {
            self.live.insert(normalize_hex(&entry.hex), entry);
        }
        update
    }

    pub fn record_feed_success(&self, at: DateTime<Utc>) {
        self.feed_failures.store(0, Ordering::SeqCst);
        if let Ok(mut last) = self.last_feed_at.lock() {
            *last = Some(at);
        }
    }

    pub fn record_feed_failure(&self) {
        self.feed_failures.fetch_add(1, Ordering::SeqCst);
    }

    /// Aircraft in the latest feed snapshot, sorted by hex.
    pub fn live_aircraft(&self) -> Vec<LiveAircraft> {
        let mut aircraft: Vec<LiveAircraft> =
            self.live.iter().map(|r| r.value().clone()).collect();
        aircraft.sort_by(|a, b| a.hex.cmp(&b.hex));
        aircraft
    }

    // === Lifecycle sweeps ===

    pub fn run_cleanup(&self, now: DateTime<Utc>) -> Vec<String> {
        self.lock_trails().manager.cleanup_sweep(now)
    }

    pub fn run_auto_fade(&self, now: DateTime<Utc>) -> FadeSweep {
        self.lock_trails().manager.auto_fade_sweep(now)
    }

    // === Historical loads ===

    /// Commit a fetched batch if `ticket` is still the newest for `guard`.
    ///
    /// The currency check happens under the trail lock, so a newer load can
    /// only commit after this one.
    pub fn commit_tracks(
        &self,
        guard: &LoadGeneration,
        ticket: LoadTicket,
        tracks: Vec<(String, Vec<PositionSample>)>,
    ) -> Option<LoadCommit> {
        let mut store = self.lock_trails();
        if !guard.finish(ticket) {
            return None;
        }

        let mode = store.color_mode;
        let mut commit = LoadCommit::default();
        for (hex, samples) in tracks {
            match store.manager.rebuild_from_historical(&hex, &samples, mode) {
                RebuildOutcome::Committed { .. } => commit.committed += 1,
                RebuildOutcome::Discarded { .. } => commit.discarded += 1,
            }
        }
        Some(commit)
    }

    // === Queries ===

    pub fn trail_summaries(&self, state: Option<TrailState>) -> Vec<TrailSummary> {
        let mut summaries = self.lock_trails().manager.summaries();
        if let Some(state) = state {
            summaries.retain(|summary| summary.state == state);
        }
        summaries
    }

    pub fn trail_snapshot(&self, hex: &str) -> Option<TrailSnapshot> {
        self.lock_trails().manager.snapshot(hex)
    }

    pub fn trail_state(&self, hex: &str) -> TrailState {
        self.lock_trails().manager.state_of(hex)
    }

    /// Pending gap connectors; `drain` hands them off to the caller.
    pub fn gap_connectors(&self, drain: bool) -> Vec<GapConnector> {
        let mut store = self.lock_trails();
        if drain {
            store.manager.take_gap_connectors()
        } else {
            store.manager.pending_gap_connectors().to_vec()
        }
    }

    // === Loop health ===

    pub fn mark_loop_heartbeat(&self, name: &str) {
        self.heartbeats.insert(name.to_string(), Utc::now());
    }

    pub fn loop_heartbeats(&self) -> HashMap<String, DateTime<Utc>> {
        self.heartbeats
            .iter()
            .map(|r| (r.key().clone(), *r.value()))
            .collect()
    }

    pub fn status(&self) -> StatusReport {
        let (active_trails, stale_trails, pending_gaps, color_mode) = {
            let store = self.lock_trails();
            (
                store.manager.active_len(),
                store.manager.stale_len(),
                store.manager.pending_gap_connectors().len(),
                store.color_mode,
            )
        };
        let last_feed_update = self.last_feed_at.lock().ok().and_then(|last| *last);

        StatusReport {
            active_trails,
            stale_trails,
            live_aircraft: self.live.len(),
            pending_gaps,
            color_mode,
            recent_load_in_flight: self.recent_loads.in_flight(),
            recent_load_generation: self.recent_loads.generation(),
            feed_consecutive_failures: self.feed_failures.load(Ordering::SeqCst),
            last_feed_update,
            loop_heartbeats: self.loop_heartbeats(),
        }
    }
}
