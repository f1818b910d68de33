//! Live feed loop.
//!
//! Polls the feeder every tick, appends new positions and retires aircraft
//! that left the feed. Consecutive failures back off exponentially.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::time::interval;

use crate::backoff::Backoff;
use crate::feed::FeedClient;
use crate::state::AppState;

const FEED_BACKOFF_MAX_SECS: u64 = 60;
/// Failures before the log level escalates from warn to error
const FEED_ERROR_ESCALATION: u32 = 10;

pub async fn run_live_update_loop(
    state: Arc<AppState>,
    feed: FeedClient,
    interval_secs: u64,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = interval(Duration::from_secs(interval_secs));
    let mut backoff = Backoff::new(
        Duration::from_secs(interval_secs),
        Duration::from_secs(FEED_BACKOFF_MAX_SECS),
    );
    state.mark_loop_heartbeat("live-update");
    tracing::info!("Polling {} every {}s", feed.url(), interval_secs);

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Live update loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                state.mark_loop_heartbeat("live-update");
                if !backoff.ready() {
                    continue;
                }

                match feed.fetch().await {
                    Ok(snapshot) => {
                        backoff.reset();
                        let now = Utc::now();
                        state.record_feed_success(now);
                        let update = state.apply_live_snapshot(snapshot.positions(now));
                        if update.reactivated > 0 || update.retired > 0 {
                            tracing::debug!(
                                "Feed: {} aircraft, {} appended, {} reactivated, {} retired",
                                update.aircraft,
                                update.appended,
                                update.reactivated,
                                update.retired
                            );
                        }
                    }
                    Err(err) => {
                        state.record_feed_failure();
                        let delay = backoff.fail();
                        let failures = backoff.failures();
                        if failures >= FEED_ERROR_ESCALATION {
                            tracing::error!(
                                "Feed unavailable ({} consecutive failures): {} (backing off {:?})",
                                failures,
                                err,
                                delay
                            );
                        } else {
                            tracing::warn!("Feed fetch failed: {} (backing off {:?})", err, delay);
                        }
                    }
                }
            }
        }
    }
}
