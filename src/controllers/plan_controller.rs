//! Plan controller
//!
//! Watches one plan kind, keeps a reflector cache of it, feeds change events
//! and periodic resyncs into a work queue and drains the queue with a pool of
//! workers running the plan reconciler.

use std::sync::Arc;

use futures::{pin_mut, Stream, StreamExt};
use kube::{
    api::ListParams,
    runtime::{
        reflector,
        watcher::{self, watcher, Config as WatcherConfig, Event},
        WatchStreamExt,
    },
    Api, Resource,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::adapters::{cached_keys, CachedPlanReader, KubeDependencyQuery, KubePlanDeleter};
use crate::controllers::{resync, worker, Context};
use crate::crd::CatalogPlan;
use crate::key::ObjectKey;
use crate::queue::WorkQueue;
use crate::reconcilers::PlanReconciler;

/// Run the controller for plan kind `K` until `shutdown` is cancelled
pub async fn run<K: CatalogPlan>(ctx: Arc<Context>, queue: WorkQueue, shutdown: CancellationToken) {
    let kind = K::kind(&()).to_string();
    let api: Api<K> = Api::all(ctx.client.clone());

    // Verify CRD is installed
    if let Err(e) = api.list(&ListParams::default().limit(1)).await {
        error!("{} CRD not installed: {}", kind, e);
        return;
    }

    info!("Starting {} controller", kind);

    let (store, writer) = reflector::store::<K>();
    let events = watcher(api, WatcherConfig::default())
        .default_backoff()
        .reflect(writer);

    let reconciler = Arc::new(PlanReconciler::new(
        CachedPlanReader::new(store.clone()),
        KubeDependencyQuery::new(ctx.client.clone(), K::SCOPE),
        KubePlanDeleter::<K>::new(ctx.client.clone()),
    ));

    let pool = {
        let kind = kind.clone();
        let store = store.clone();
        let queue = queue.clone();
        let workers = ctx.config.workers;
        let max_retries = ctx.config.max_retries;
        tokio::spawn(async move {
            if store.wait_until_ready().await.is_err() {
                warn!(kind = %kind, "Cache never synced, not starting workers");
                return;
            }
            info!(kind = %kind, workers, "Cache synced, starting workers");
            worker::run_pool(kind, queue, reconciler, workers, max_retries).await;
        })
    };

    tokio::select! {
        _ = watch_plans(&kind, events, &queue) => {
            warn!(kind = %kind, "Watch stream ended");
        }
        _ = resync::run(&kind, &queue, ctx.config.resync_period(), || cached_keys(&store)) => {}
        _ = shutdown.cancelled() => {
            info!(kind = %kind, "Stopping controller, waiting for in-flight reconciliations");
        }
    }

    queue.shut_down().await;
    if let Err(e) = pool.await {
        error!(kind = %kind, error = %e, "Worker pool panicked");
    }
    info!(kind = %kind, "Controller stopped");
}

/// Turn plan watch events into queue keys.
///
/// Adds and updates, including the initial list, enqueue the plan. Deletes
/// need no work: the plan is already gone.
pub async fn watch_plans<K, S>(kind: &str, events: S, queue: &WorkQueue)
where
    K: Resource,
    S: Stream<Item = Result<Event<K>, watcher::Error>>,
{
    pin_mut!(events);
    while let Some(event) = events.next().await {
        match event {
            Ok(Event::Apply(plan)) | Ok(Event::InitApply(plan)) => on_change(kind, queue, &plan).await,
            Ok(Event::Delete(plan)) => {
                debug!(
                    kind = %kind,
                    name = plan.meta().name.as_deref().unwrap_or_default(),
                    namespace = plan.meta().namespace.as_deref().unwrap_or_default(),
                    "Received delete event, no further processing will occur"
                );
            }
            Ok(Event::Init) | Ok(Event::InitDone) => {}
            Err(e) => warn!(kind = %kind, error = %e, "Watch error"),
        }
    }
}

/// Enqueue the key of a changed object
pub async fn on_change<K: Resource>(kind: &str, queue: &WorkQueue, obj: &K) {
    match ObjectKey::from_resource(obj) {
        Some(key) => queue.add(key.encode()).await,
        None => error!(kind = %kind, "Couldn't get key for object without a name"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{ServicePlan, ServicePlanSpec};

    fn plan(namespace: &str, name: &str) -> ServicePlan {
        let mut plan = ServicePlan::new(name, ServicePlanSpec::default());
        plan.metadata.namespace = Some(namespace.to_string());
        plan
    }

    #[tokio::test]
    async fn applies_enqueue_and_deletes_do_not() {
        let queue = WorkQueue::default();
        let events: Vec<Result<Event<ServicePlan>, watcher::Error>> = vec![
            Ok(Event::Init),
            Ok(Event::InitApply(plan("ns", "p1"))),
            Ok(Event::InitDone),
            Ok(Event::Apply(plan("ns", "p2"))),
            Ok(Event::Apply(plan("ns", "p1"))),
            Ok(Event::Delete(plan("ns", "p3"))),
        ];

        watch_plans("ServicePlan", futures::stream::iter(events), &queue).await;

        assert_eq!(queue.len().await, 2);
        assert_eq!(queue.get().await.as_deref(), Some("ns/p1"));
        assert_eq!(queue.get().await.as_deref(), Some("ns/p2"));
    }

    #[tokio::test]
    async fn unnamed_object_is_skipped() {
        let queue = WorkQueue::default();
        let mut unnamed = plan("ns", "p1");
        unnamed.metadata.name = None;

        on_change("ServicePlan", &queue, &unnamed).await;
        assert!(queue.is_empty().await);
    }
}
