//! Trail retention and fade settings.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::spatial::GapPolicy;

/// User-selected fade duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FadeDuration {
    Never,
    Minutes(u32),
}

impl FadeDuration {
    /// Accepts `never` or a number of minutes.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_lowercase();
        if value == "never" || value == "off" {
            return Some(Self::Never);
        }
        value.parse::<u32>().ok().filter(|m| *m > 0).map(Self::Minutes)
    }

    /// False for a zero-minute duration, which would fade every trail at once.
    pub fn is_valid(&self) -> bool {
        !matches!(self, FadeDuration::Minutes(0))
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            FadeDuration::Never => None,
            FadeDuration::Minutes(m) => Some(Duration::minutes(i64::from(*m))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FadeSettings {
    /// Trim old points from trails periodically
    pub auto_fade: bool,
    pub duration: FadeDuration,
    /// Delete trails as soon as their aircraft leaves the feed
    pub immediate: bool,
}

impl Default for FadeSettings {
    fn default() -> Self {
        Self {
            auto_fade: false,
            duration: FadeDuration::Minutes(30),
            immediate: false,
        }
    }
}

/// Configuration for trail accumulation and lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrailSettings {
    /// Points allocated when a trail is created
    pub initial_capacity: usize,
    /// Age after which a stale trail is expired (seconds)
    pub stale_timeout_secs: u64,
    /// Period of the stale-trail cleanup sweep (seconds)
    pub cleanup_interval_secs: u64,
    /// Period of the auto-fade sweep (seconds)
    pub fade_interval_secs: u64,
    /// Taper applied past the fade duration, as a fraction of it
    pub fade_window_ratio: f64,
    pub fade: FadeSettings,
    pub gap: GapPolicy,
}

impl Default for TrailSettings {
    fn default() -> Self {
        Self {
            initial_capacity: 1000,
            stale_timeout_secs: 30 * 60,
            cleanup_interval_secs: 60,
            fade_interval_secs: 10,
            fade_window_ratio: 0.2,
            fade: FadeSettings::default(),
            gap: GapPolicy::default(),
        }
    }
}

impl TrailSettings {
    /// Fade duration when auto fade is on and not set to never.
    pub fn active_fade(&self) -> Option<Duration> {
        if !self.fade.auto_fade {
            return None;
        }
        self.fade
            .duration
            .as_duration()
            .filter(|fade| *fade > Duration::zero())
    }

    /// Age threshold used by the cleanup sweep.
    pub fn effective_stale_timeout(&self) -> Duration {
        self.active_fade()
            .unwrap_or_else(|| Duration::seconds(self.stale_timeout_secs as i64))
    }

    /// Points older than `now - cutoff_age` are trimmed by auto fade.
    pub fn fade_cutoff_age(&self) -> Option<Duration> {
        let fade = self.active_fade()?;
        let window_ms = (fade.num_milliseconds() as f64 * self.fade_window_ratio) as i64;
        Some(fade + Duration::milliseconds(window_ms))
    }
}
