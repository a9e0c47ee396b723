//! ServiceInstance watcher
//!
//! A withdrawn plan waits for its last instance to go away. Deleting an
//! instance requeues the plan it referenced so the plan is collected without
//! waiting for the next resync.

use std::sync::Arc;

use futures::{pin_mut, Stream, StreamExt};
use kube::{
    api::ListParams,
    runtime::{
        watcher::{self, watcher, Config as WatcherConfig, Event},
        WatchStreamExt,
    },
    Api,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::controllers::Context;
use crate::crd::{PlanScope, ServiceInstance};
use crate::queue::WorkQueue;

/// Run the watcher until `shutdown` is cancelled
pub async fn run(
    ctx: Arc<Context>,
    plans: WorkQueue,
    cluster_plans: WorkQueue,
    shutdown: CancellationToken,
) {
    let api: Api<ServiceInstance> = Api::all(ctx.client.clone());

    // Verify CRD is installed
    if let Err(e) = api.list(&ListParams::default().limit(1)).await {
        error!("ServiceInstance CRD not installed: {}", e);
        return;
    }

    info!("Starting ServiceInstance watcher");

    let events = watcher(api, WatcherConfig::default()).default_backoff();
    tokio::select! {
        _ = requeue_referenced_plans(events, &plans, &cluster_plans) => {
            warn!("ServiceInstance watch stream ended");
        }
        _ = shutdown.cancelled() => {
            info!("Stopping ServiceInstance watcher");
        }
    }
}

/// Enqueue the plan of every deleted instance into the queue of its scope
pub async fn requeue_referenced_plans<S>(events: S, plans: &WorkQueue, cluster_plans: &WorkQueue)
where
    S: Stream<Item = Result<Event<ServiceInstance>, watcher::Error>>,
{
    pin_mut!(events);
    while let Some(event) = events.next().await {
        match event {
            Ok(Event::Delete(instance)) => {
                for (scope, queue) in [(PlanScope::Namespaced, plans), (PlanScope::Cluster, cluster_plans)] {
                    if let Some(key) = scope.plan_key(&instance) {
                        debug!(plan = %key, "Instance deleted, requeueing its plan");
                        queue.add(key.encode()).await;
                    }
                }
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "ServiceInstance watch error"),
        }
    }
}
