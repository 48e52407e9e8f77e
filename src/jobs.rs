use crate::store::DeviceStore;
use chrono::{Duration, Utc};
use log::{error, info};
use std::time::Duration as StdDuration;
use tokio_util::sync::CancellationToken;

pub const SWEEP_INTERVAL: StdDuration = StdDuration::from_secs(60 * 60);
pub const INACTIVITY_THRESHOLD_HOURS: i64 = 24;

/// Hourly pass over the registry: devices that have not heartbeated within
/// the threshold window go inactive in one bulk update. Runs independently
/// of request traffic and stops cleanly at shutdown.
pub fn spawn_sweeper(
    db: mongodb::Database,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let store = DeviceStore::new(&db);
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Inactivity sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    sweep_once(&store).await;
                }
            }
        }
    })
}

// Failures are logged and swallowed; the sweep is idempotent and the next
// tick retries naturally.
async fn sweep_once(store: &DeviceStore) {
    let cutoff = Utc::now() - Duration::hours(INACTIVITY_THRESHOLD_HOURS);
    match store.deactivate_stale_devices(cutoff).await {
        Ok(0) => {}
        Ok(count) => info!("Deactivated {} inactive devices", count),
        Err(e) => error!("Error in inactivity sweep: {}", e.message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweeper_runs_hourly_against_a_24h_cutoff() {
        assert_eq!(SWEEP_INTERVAL, StdDuration::from_secs(3600));
        assert_eq!(INACTIVITY_THRESHOLD_HOURS, 24);
    }
}
