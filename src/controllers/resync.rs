//! Periodic re-enqueue of every known key

use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use crate::queue::WorkQueue;

/// Every `period`, add every key returned by `list_keys` to the queue.
///
/// The first resync happens one period after start; the initial watch list
/// already enqueues everything once. Returns when the queue shuts down.
pub async fn run<F>(kind: &str, queue: &WorkQueue, period: Duration, list_keys: F)
where
    F: Fn() -> Vec<String>,
{
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if queue.is_shutting_down().await {
            return;
        }

        let keys = list_keys();
        debug!(kind = %kind, keys = keys.len(), "Resyncing");
        for key in keys {
            queue.add(key).await;
        }
    }
}
