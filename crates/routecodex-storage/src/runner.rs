use std::sync::Arc;
use std::time::Duration;

use routecodex_common::now_ms;
use routecodex_quota::ProviderQuotaCenter;

use crate::snapshot::SnapshotStore;

/// Drives C9's periodic persistence: every `interval`, and once more on
/// graceful shutdown, copy C3's current map out to the snapshot file
/// (§4.9: "Every N seconds (default 5) AND on graceful shutdown").
pub struct SnapshotRunner {
    store: Arc<SnapshotStore>,
    quota: ProviderQuotaCenter,
}

impl SnapshotRunner {
    pub fn new(store: Arc<SnapshotStore>, quota: ProviderQuotaCenter) -> Self {
        Self { store, quota }
    }

    /// Spawns the periodic writer as a background task. Errors are logged,
    /// never propagated; a failed snapshot write must not take down the
    /// request-serving side of the process.
    pub fn spawn(self, interval: Duration) {
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                timer.tick().await;
                self.save_once().await;
            }
        });
    }

    /// One immediate save, used both by the periodic loop and by the
    /// graceful-shutdown path.
    pub async fn save_once(&self) {
        let snapshot = self.quota.snapshot().await;
        if let Err(err) = self.store.save(&snapshot, now_ms()).await {
            tracing::warn!(error = %err, "failed to persist provider quota snapshot");
        }
    }
}
