//! Auto-fade point trimming.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::time::interval;

use crate::state::AppState;

pub async fn run_fade_loop(
    state: Arc<AppState>,
    interval_secs: u64,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = interval(Duration::from_secs(interval_secs));
    state.mark_loop_heartbeat("auto-fade");

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Auto fade loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                state.mark_loop_heartbeat("auto-fade");
                // No-op unless auto fade is on with a finite duration
                let sweep = state.run_auto_fade(Utc::now());
                if !sweep.expired.is_empty() {
                    tracing::info!(
                        "Auto fade expired {} trail(s): {}",
                        sweep.expired.len(),
                        sweep.expired.join(", ")
                    );
                }
            }
        }
    }
}
