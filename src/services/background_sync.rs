use crate::clock::Clock;
use crate::remote::RemoteApi;
use crate::services::sync_manager::SyncManager;
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

impl<R: RemoteApi, C: Clock> SyncManager<R, C> {
    /// Background driver: runs a cycle on every explicit request, whenever
    /// connectivity comes back, and on a fixed interval, until `shutdown`
    /// resolves.
    pub async fn run<F: Future<Output = ()>>(&self, shutdown: F) {
        let interval = Duration::from_secs(self.config().interval_secs.max(1));
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut connectivity = self.network().subscribe();
        let mut was_online = connectivity.borrow_and_update().is_online();
        tokio::pin!(shutdown);

        log::info!(
            "Starting background sync with {} second interval",
            interval.as_secs()
        );

        loop {
            let trigger = tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => "interval",
                _ = self.sync_requested() => "request",
                changed = connectivity.changed() => {
                    if changed.is_err() {
                        log::warn!("Connectivity source closed");
                        break;
                    }
                    let online = connectivity.borrow_and_update().is_online();
                    let regained = online && !was_online;
                    was_online = online;
                    if !regained {
                        continue;
                    }
                    "connectivity regained"
                }
            };

            log::debug!("Sync triggered by {}", trigger);
            let result = self.sync_now().await;
            if result.requires_reauth {
                log::error!("Background sync needs the user to sign in again");
            } else if !result.success && !result.deferred {
                log::warn!("Background sync finished with errors: {:?}", result.errors);
            }
        }

        log::info!("Background sync stopped");
    }
}
