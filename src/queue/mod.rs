//! Deduplicating, rate-limited work queue
//!
//! Keys move through three sets:
//! - `queue`: ordered keys waiting for a worker
//! - `dirty`: keys that need processing (queued or re-added while in flight)
//! - `processing`: keys a worker currently holds
//!
//! A key is never in `queue` twice and never handed to two workers at once.
//! A key added while it is being processed stays in `dirty` and is queued
//! again when the worker calls [`WorkQueue::done`].

mod backoff;

pub use backoff::ExponentialBackoff;

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use prometheus::Gauge;
use tokio::sync::{Mutex, Notify};
use tracing::trace;

#[derive(Debug, Default)]
struct QueueState {
    queue: VecDeque<String>,
    dirty: HashSet<String>,
    processing: HashSet<String>,
    shutting_down: bool,
}

struct Shared {
    state: Mutex<QueueState>,
    backoff: Mutex<ExponentialBackoff>,
    notify: Notify,
    depth: Option<Gauge>,
}

/// Cloneable handle to a shared work queue
#[derive(Clone)]
pub struct WorkQueue {
    shared: Arc<Shared>,
}

impl WorkQueue {
    /// Create a queue that retries failed keys with the given backoff
    pub fn new(backoff: ExponentialBackoff) -> Self {
        Self::build(backoff, None)
    }

    /// Like [`new`](WorkQueue::new), keeping `depth` set to the number of
    /// waiting keys
    pub fn with_depth_gauge(backoff: ExponentialBackoff, depth: Gauge) -> Self {
        Self::build(backoff, Some(depth))
    }

    fn build(backoff: ExponentialBackoff, depth: Option<Gauge>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState::default()),
                backoff: Mutex::new(backoff),
                notify: Notify::new(),
                depth,
            }),
        }
    }

    fn record_depth(&self, state: &QueueState) {
        if let Some(depth) = &self.shared.depth {
            depth.set(state.queue.len() as f64);
        }
    }

    /// Mark a key as needing processing
    pub async fn add(&self, key: impl Into<String>) {
        let key = key.into();
        let mut state = self.shared.state.lock().await;
        if state.shutting_down || state.dirty.contains(&key) {
            return;
        }

        state.dirty.insert(key.clone());
        if state.processing.contains(&key) {
            trace!(key = %key, "Key in flight, deferring until done");
            return;
        }

        state.queue.push_back(key);
        self.record_depth(&state);
        drop(state);
        self.shared.notify.notify_one();
    }

    /// Add a key once `delay` has elapsed
    pub async fn add_after(&self, key: impl Into<String>, delay: Duration) {
        let key = key.into();
        if delay.is_zero() {
            self.add(key).await;
            return;
        }

        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(key).await;
        });
    }

    /// Requeue a failed key after its backoff delay
    pub async fn add_rate_limited(&self, key: &str) {
        let delay = self.shared.backoff.lock().await.when(key);
        trace!(key = %key, delay = ?delay, "Requeueing with backoff");
        self.add_after(key, delay).await;
    }

    /// Reset the backoff of a key after it was handled
    pub async fn forget(&self, key: &str) {
        self.shared.backoff.lock().await.forget(key);
    }

    /// How many times the key has been requeued since it was last forgotten
    pub async fn num_requeues(&self, key: &str) -> u32 {
        self.shared.backoff.lock().await.num_requeues(key)
    }

    /// Wait for the next key.
    ///
    /// Returns `None` once the queue is shut down, even if keys are still
    /// waiting. The caller owns the returned key until it calls [`done`].
    ///
    /// [`done`]: WorkQueue::done
    pub async fn get(&self) -> Option<String> {
        loop {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            // Register before checking state so a concurrent add or shutdown
            // cannot slip between the check and the wait.
            notified.as_mut().enable();

            {
                let mut state = self.shared.state.lock().await;
                if state.shutting_down {
                    return None;
                }
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    self.record_depth(&state);
                    return Some(key);
                }
            }

            notified.await;
        }
    }

    /// Release a key obtained from [`get`](WorkQueue::get)
    pub async fn done(&self, key: &str) {
        let mut state = self.shared.state.lock().await;
        state.processing.remove(key);
        if state.dirty.contains(key) && !state.shutting_down {
            state.queue.push_back(key.to_string());
            self.record_depth(&state);
            drop(state);
            self.shared.notify.notify_one();
        }
    }

    /// Stop handing out keys and wake every waiting worker
    pub async fn shut_down(&self) {
        self.shared.state.lock().await.shutting_down = true;
        self.shared.notify.notify_waiters();
    }

    pub async fn is_shutting_down(&self) -> bool {
        self.shared.state.lock().await.shutting_down
    }

    /// Number of keys waiting for a worker
    pub async fn len(&self) -> usize {
        self.shared.state.lock().await.queue.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new(ExponentialBackoff::default())
    }
}
