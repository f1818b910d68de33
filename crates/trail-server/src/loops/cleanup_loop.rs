//! Stale trail expiry.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::time::interval;

use crate::state::AppState;

pub async fn run_cleanup_loop(
    state: Arc<AppState>,
    interval_secs: u64,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = interval(Duration::from_secs(interval_secs));
    state.mark_loop_heartbeat("cleanup");

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Cleanup loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                state.mark_loop_heartbeat("cleanup");
                let expired = state.run_cleanup(Utc::now());
                for hex in &expired {
                    tracing::debug!("Trail {} expired", hex);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test(start_paused = true)]
    async fn stops_on_shutdown() {
        let state = Arc::new(AppState::new(&Config::from_env()));
        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(run_cleanup_loop(state.clone(), 60, rx));

        tokio::time::sleep(Duration::from_secs(1)).await;
        tx.send(()).unwrap();
        handle.await.unwrap();
        assert!(state.loop_heartbeats().contains_key("cleanup"));
    }
}
