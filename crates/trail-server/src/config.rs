//! Server configuration from environment.

use std::env;
use std::str::FromStr;

use trail_core::{ColorMode, FadeDuration, FadeSettings, SceneProjection, TrailSettings};

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub feeder_url: String,
    pub track_service_url: String,
    pub request_timeout_secs: u64,
    pub live_update_interval_secs: u64,
    pub cleanup_interval_secs: u64,
    pub auto_fade_interval_secs: u64,
    pub home_lat: f64,
    pub home_lon: f64,
    pub recent_trail_minutes: i64,
    pub max_recent_tracks: u32,
    pub stale_timeout_secs: u64,
    pub color_mode: ColorMode,
    pub fade: FadeSettings,
}

impl Config {
    pub fn from_env() -> Self {
        let feeder_url = env::var("FEEDER_URL")
            .or_else(|_| env::var("ULTRAFEEDER_URL"))
            .unwrap_or_else(|_| "http://ultrafeeder".to_string());

        let auto_fade = env::var("AUTO_FADE_MINUTES")
            .ok()
            .and_then(|s| FadeDuration::parse(&s));
        let fade = FadeSettings {
            auto_fade: auto_fade.is_some(),
            duration: auto_fade.unwrap_or(FadeDuration::Minutes(30)),
            immediate: env_flag("IMMEDIATE_FADE"),
        };

        Self {
            server_port: env_parse("TRAIL_PORT", 3000),
            feeder_url: trim_url(feeder_url),
            track_service_url: trim_url(
                env::var("TRACK_SERVICE_URL")
                    .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            ),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", 10),
            live_update_interval_secs: env_parse("LIVE_UPDATE_INTERVAL_SECS", 1).max(1),
            cleanup_interval_secs: env_parse("CLEANUP_INTERVAL_SECS", 60).max(1),
            auto_fade_interval_secs: env_parse("AUTO_FADE_INTERVAL_SECS", 10).max(1),
            home_lat: env_parse("HOME_LAT", 0.0),
            home_lon: env_parse("HOME_LON", 0.0),
            recent_trail_minutes: env_parse("RECENT_TRAIL_MINUTES", 5).max(1),
            max_recent_tracks: env_parse("MAX_RECENT_TRACKS", 500),
            stale_timeout_secs: env_parse("STALE_TIMEOUT_SECS", 30 * 60),
            color_mode: env::var("COLOR_MODE")
                .ok()
                .and_then(|s| ColorMode::parse(&s))
                .unwrap_or_default(),
            fade,
        }
    }

    pub fn trail_settings(&self) -> TrailSettings {
        TrailSettings {
            stale_timeout_secs: self.stale_timeout_secs,
            cleanup_interval_secs: self.cleanup_interval_secs,
            fade_interval_secs: self.auto_fade_interval_secs,
            fade: self.fade,
            ..TrailSettings::default()
        }
    }

    pub fn projection(&self) -> SceneProjection {
        SceneProjection::new(self.home_lat, self.home_lon)
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str) -> bool {
    env::var(key)
        .map(|s| matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

fn trim_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
