use crate::services::registry::TransferRegistry;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;

/// Background task that purges expired transfers on a fixed interval.
///
/// Runs for the lifetime of the process; request handlers never wait on it
/// beyond the registry's own per-shard locking.
pub struct RetentionReaper {
    registry: Arc<TransferRegistry>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl RetentionReaper {
    pub fn new(
        registry: Arc<TransferRegistry>,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            registry,
            interval,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(
            "🧹 Retention reaper started (interval: {}s)",
            self.interval.as_secs()
        );

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!("🛑 Retention reaper shutting down");
                    break;
                }
                _ = sleep(self.interval) => {
                    self.sweep().await;
                }
            }
        }
    }

    async fn sweep(&self) {
        let removed = self.registry.sweep_expired(Utc::now()).await;
        if removed > 0 {
            tracing::info!(
                "Purged {} expired transfer(s), {} still live",
                removed,
                self.registry.live_count()
            );
        } else {
            tracing::debug!("Sweep found no expired transfers");
        }
    }
}
