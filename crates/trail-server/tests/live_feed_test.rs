//! Feed snapshot -> state -> lifecycle, through the public library surface.

use chrono::{Duration, TimeZone, Utc};
use serde_json::json;

use trail_core::{ColorMode, FadeDuration, FadeSettings, TrailState};
use trail_server::config::Config;
use trail_server::feed::FeedSnapshot;
use trail_server::state::store::SettingsUpdate;
use trail_server::state::AppState;

fn state() -> AppState {
    let mut config = Config::from_env();
    config.home_lat = 39.86;
    config.home_lon = -104.67;
    config.color_mode = ColorMode::Altitude;
    config.fade = FadeSettings::default();
    AppState::new(&config)
}

fn snapshot(now_secs: f64, aircraft: serde_json::Value) -> FeedSnapshot {
    serde_json::from_value(json!({ "now": now_secs, "aircraft": aircraft })).unwrap()
}

#[test]
fn polling_builds_trails_and_retires_departures() {
    let state = state();
    let base = Utc::now().timestamp() as f64 - 120.0;

    for tick in 0..5 {
        let now = base + tick as f64;
        let feed = snapshot(
            now,
            json!([
                {"hex": "A1B2C3", "lat": 39.86 + tick as f64 * 0.002, "lon": -104.67, "alt_baro": 11000, "gs": 280, "seen_pos": 0.1},
                {"hex": "ABC999", "lat": 39.9, "lon": -104.6, "alt_baro": 6000, "gs": 150, "seen_pos": 30.0}
            ]),
        );
        let fallback = Utc.timestamp_opt(now as i64, 0).unwrap();
        state.apply_live_snapshot(feed.positions(fallback));
    }

    let summaries = state.trail_summaries(None);
    assert_eq!(summaries.len(), 2);
    assert_eq!(state.trail_snapshot("a1b2c3").unwrap().positions.len(), 5);
    assert_eq!(state.trail_snapshot("abc999").unwrap().positions.len(), 5);

    let update = state.apply_live_snapshot(snapshot(base + 6.0, json!([])).positions(Utc::now()));
    assert_eq!(update.retired, 2);
    assert_eq!(state.trail_summaries(Some(TrailState::Stale)).len(), 2);

    let expired = state.run_cleanup(Utc::now() + Duration::minutes(45));
    assert_eq!(expired.len(), 2);
    assert_eq!(state.trail_state("a1b2c3"), TrailState::Expired);
}

#[test]
fn immediate_fade_drops_departures() {
    let state = state();
    state.apply_settings(SettingsUpdate {
        immediate_fade: Some(true),
        ..SettingsUpdate::default()
    });

    let now = Utc::now().timestamp() as f64;
    let feed = snapshot(now, json!([{"hex": "abc", "lat": 39.9, "lon": -104.6, "alt_baro": 6000}]));
    state.apply_live_snapshot(feed.positions(Utc::now()));
    state.apply_live_snapshot(Vec::new());

    assert_eq!(state.trail_state("abc"), TrailState::Expired);
    assert!(state.trail_summaries(None).is_empty());
}

#[test]
fn auto_fade_trims_through_state() {
    let state = state();
    state.apply_settings(SettingsUpdate {
        auto_fade: Some(true),
        fade_duration: Some(FadeDuration::Minutes(1)),
        ..SettingsUpdate::default()
    });

    let now = Utc::now();
    for age in [600, 5] {
        let t = (now - Duration::seconds(age)).timestamp() as f64;
        let feed = snapshot(t, json!([{"hex": "abc", "lat": 39.9 + age as f64 * 1e-5, "lon": -104.6, "alt_baro": 6000}]));
        state.apply_live_snapshot(feed.positions(now));
    }

    let sweep = state.run_auto_fade(now);
    assert_eq!(sweep.points_removed, 1);
    assert_eq!(state.trail_snapshot("abc").unwrap().positions.len(), 1);
}
