use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::stats::{RunningStatistics, Snapshot};

/// Read side of the aggregator's statistics.
///
/// The aggregator is the only writer; it publishes a fresh snapshot after
/// every sample, so readers never observe a half-applied update.
#[derive(Debug, Clone)]
pub struct StatsHandle {
    rx: watch::Receiver<Snapshot>,
}

impl StatsHandle {
    pub fn snapshot(&self) -> Snapshot {
        *self.rx.borrow()
    }

    /// Wait for the aggregator to stop, then return its last snapshot.
    pub async fn settled(&mut self) -> Snapshot {
        while self.rx.changed().await.is_ok() {}
        *self.rx.borrow()
    }

    /// Wait until the published snapshot satisfies `pred`. Returns `None`
    /// if the aggregator stopped first.
    pub async fn wait_for(&mut self, pred: impl FnMut(&Snapshot) -> bool) -> Option<Snapshot> {
        self.rx.wait_for(pred).await.ok().map(|s| *s)
    }
}

/// Spawn the single consumer that owns the running statistics.
///
/// Samples are applied in arrival order. On cancellation anything still
/// queued is dropped. The task yields the final statistics.
pub fn spawn_aggregator(
    mut rx: mpsc::Receiver<f64>,
    window: usize,
    cancel: CancellationToken,
) -> (StatsHandle, tokio::task::JoinHandle<RunningStatistics>) {
    let mut stats = RunningStatistics::new(window);
    let (publisher, snapshots) = watch::channel(stats.snapshot());

    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("Aggregator cancelled");
                    break;
                }
                sample = rx.recv() => {
                    let Some(sample) = sample else {
                        tracing::debug!("Sample channel closed");
                        break;
                    };
                    stats.apply(sample);
                    let snapshot = stats.snapshot();
                    publisher.send_replace(snapshot);
                    tracing::debug!(
                        "get: {:.8} number: {} result: {:.8}",
                        sample,
                        snapshot.count,
                        snapshot.cumulative_mean().unwrap_or_default()
                    );
                }
            }
        }

        tracing::info!("Aggregator stopped after {} samples", stats.count());
        // Dropping the publisher releases `StatsHandle::settled` waiters.
        drop(publisher);
        stats
    });

    (StatsHandle { rx: snapshots }, handle)
}
