//! Worker pool draining a plan work queue
//!
//! Each worker takes one key at a time, reconciles it and decides whether the
//! key is done, retried with backoff, or dropped.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::metrics;
use crate::queue::WorkQueue;
use crate::reconcilers::{
    DependencyQuery, PlanDeleter, PlanReader, PlanReconciler, ReconcileOutcome,
};

/// What happened to a key after one reconcile attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyDisposition {
    /// Reconciled; backoff history cleared
    Forgotten,
    /// Failed; added back after its backoff delay
    Requeued,
    /// Failed permanently or too often; no longer retried
    Dropped,
}

/// Run `workers` workers until the queue shuts down
pub async fn run_pool<R, D, X>(
    kind: String,
    queue: WorkQueue,
    reconciler: Arc<PlanReconciler<R, D, X>>,
    workers: usize,
    max_retries: Option<u32>,
) where
    R: PlanReader + 'static,
    D: DependencyQuery + 'static,
    X: PlanDeleter + 'static,
{
    let handles: Vec<_> = (0..workers)
        .map(|id| {
            tokio::spawn(run(
                id,
                kind.clone(),
                queue.clone(),
                reconciler.clone(),
                max_retries,
            ))
        })
        .collect();

    for handle in futures::future::join_all(handles).await {
        if let Err(e) = handle {
            error!(kind = %kind, error = %e, "Worker panicked");
        }
    }
}

/// Process keys until the queue shuts down
pub async fn run<R, D, X>(
    id: usize,
    kind: String,
    queue: WorkQueue,
    reconciler: Arc<PlanReconciler<R, D, X>>,
    max_retries: Option<u32>,
) where
    R: PlanReader,
    D: DependencyQuery,
    X: PlanDeleter,
{
    debug!(kind = %kind, worker = id, "Worker started");

    while let Some(key) = queue.get().await {
        process_key(&kind, &queue, &reconciler, max_retries, &key).await;
        queue.done(&key).await;
    }

    debug!(kind = %kind, worker = id, "Queue shut down, worker exiting");
}

/// Reconcile one key and settle its place in the queue.
///
/// The caller still owns the key and must call [`WorkQueue::done`].
pub async fn process_key<R, D, X>(
    kind: &str,
    queue: &WorkQueue,
    reconciler: &PlanReconciler<R, D, X>,
    max_retries: Option<u32>,
    key: &str,
) -> KeyDisposition
where
    R: PlanReader,
    D: DependencyQuery,
    X: PlanDeleter,
{
    let _timer = metrics::RECONCILE_DURATION
        .with_label_values(&[kind])
        .start_timer();
    metrics::RECONCILIATIONS.with_label_values(&[kind]).inc();

    let error = match reconciler.reconcile_key(key).await {
        Ok(outcome) => {
            metrics::RECONCILE_OUTCOMES
                .with_label_values(&[kind, outcome.as_str()])
                .inc();
            if outcome == ReconcileOutcome::Deleted {
                metrics::PLANS_DELETED.with_label_values(&[kind]).inc();
            }
            debug!(kind = %kind, key = %key, outcome = outcome.as_str(), "Reconciled");

            queue.forget(key).await;
            return KeyDisposition::Forgotten;
        }
        Err(e) => e,
    };

    metrics::RECONCILIATION_ERRORS.with_label_values(&[kind]).inc();
    metrics::RECONCILE_OUTCOMES
        .with_label_values(&[kind, ReconcileOutcome::ERROR_LABEL])
        .inc();

    if !error.is_retryable() {
        error!(kind = %kind, key = %key, error = %error, "Dropping key that cannot be reconciled");
        queue.forget(key).await;
        metrics::KEYS_DROPPED.with_label_values(&[kind]).inc();
        return KeyDisposition::Dropped;
    }

    let retries = queue.num_requeues(key).await;
    if max_retries.is_some_and(|max| retries >= max) {
        warn!(
            kind = %kind,
            key = %key,
            error = %error,
            retries,
            "Dropping key out of the queue after too many retries"
        );
        queue.forget(key).await;
        metrics::KEYS_DROPPED.with_label_values(&[kind]).inc();
        return KeyDisposition::Dropped;
    }

    warn!(
        kind = %kind,
        key = %key,
        error = %error,
        retries,
        "Reconciliation failed, scheduling retry"
    );
    queue.add_rate_limited(key).await;
    KeyDisposition::Requeued
}
