//! NOTAM expiry loop.
//!
//! Periodically drops NOTAMs whose window has fully passed from the
//! reference snapshot so stale restrictions don't accumulate between
//! reloads. Active and future windows are never touched.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::interval;

use crate::state::AppState;

pub async fn run_notam_sweep_loop(
    state: Arc<AppState>,
    interval_secs: u64,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = interval(Duration::from_secs(interval_secs.max(1)));

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("NOTAM sweep loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                let removed = state.sweep_expired_notams(Utc::now());
                if removed > 0 {
                    tracing::info!(removed, "expired NOTAMs dropped from snapshot");
                }
            }
        }
    }
}
