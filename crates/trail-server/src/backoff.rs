//! Exponential backoff with jitter for the feed poller.
//!
//! Keeps an unreachable feeder from turning the 1 Hz tick into a log storm.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
    next_attempt_at: Instant,
    jitter_ratio: f64,
    failures: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        let base = base.max(Duration::from_millis(1));
        Self {
            base,
            max: max.max(base),
            current: base,
            next_attempt_at: Instant::now(),
            jitter_ratio: 0.2,
            failures: 0,
        }
    }

    pub fn ready(&self) -> bool {
        Instant::now() >= self.next_attempt_at
    }

    /// Consecutive failures since the last success.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn reset(&mut self) {
        self.current = self.base;
        self.failures = 0;
        self.next_attempt_at = Instant::now();
    }

    /// Record a failure and push the next attempt out. Returns the delay.
    pub fn fail(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        self.current = self.current.saturating_mul(2).min(self.max);
        let delay = with_jitter(self.current, self.jitter_ratio);
        self.next_attempt_at = Instant::now() + delay;
        delay
    }
}

fn with_jitter(delay: Duration, ratio: f64) -> Duration {
    let jitter_max_ms = (delay.as_millis() as f64 * ratio.clamp(0.0, 1.0)) as u64;
    if jitter_max_ms == 0 {
        return delay;
    }

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::from(d.subsec_nanos()))
        .unwrap_or(0);
    delay + Duration::from_millis(nanos % (jitter_max_ms + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_ready() {
        let backoff = Backoff::new(Duration::from_millis(10), Duration::from_secs(1));
        assert!(backoff.ready());
        assert_eq!(backoff.failures(), 0);
    }

    #[test]
    fn failure_delays_until_reset() {
        let mut backoff = Backoff::new(Duration::from_millis(500), Duration::from_secs(60));
        let delay = backoff.fail();
        assert!(delay >= Duration::from_secs(1));
        assert!(!backoff.ready());
        assert_eq!(backoff.failures(), 1);

        backoff.reset();
        assert!(backoff.ready());
        assert_eq!(backoff.failures(), 0);
    }

    #[test]
    fn delay_caps_at_max() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(4));
        for _ in 0..10 {
            backoff.fail();
        }
        let delay = backoff.fail();
        assert!(delay >= Duration::from_secs(4));
        assert!(delay <= Duration::from_millis(4800));
        assert_eq!(backoff.failures(), 11);
    }
}
