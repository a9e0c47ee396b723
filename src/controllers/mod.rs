//! Kubernetes controllers for service catalog plans
//!
//! This module wires watches, work queues and workers together. One
//! controller runs per plan kind; a ServiceInstance watcher nudges both when
//! instances disappear.

mod instance_watcher;
mod plan_controller;
pub mod resync;
pub mod worker;

pub use instance_watcher::{requeue_referenced_plans, run as run_instance_watcher};
pub use plan_controller::{on_change, run as run_plan_controller, watch_plans};

use std::sync::Arc;

use kube::{Client, Resource};
use tokio_util::sync::CancellationToken;

use crate::config::OperatorConfig;
use crate::crd::{CatalogPlan, ClusterServicePlan, ServicePlan};
use crate::metrics;
use crate::queue::WorkQueue;

/// Shared context for all controllers
pub struct Context {
    /// Kubernetes client
    pub client: Client,
    /// Operator settings
    pub config: OperatorConfig,
}

impl Context {
    /// Create a new context
    pub fn new(client: Client, config: OperatorConfig) -> Self {
        Self { client, config }
    }
}

/// Run every controller until `shutdown` is cancelled and all of them have
/// drained their in-flight work
pub async fn run(ctx: Arc<Context>, shutdown: CancellationToken) {
    let plans = queue_for::<ServicePlan>(&ctx);
    let cluster_plans = queue_for::<ClusterServicePlan>(&ctx);

    tokio::join!(
        run_plan_controller::<ServicePlan>(ctx.clone(), plans.clone(), shutdown.clone()),
        run_plan_controller::<ClusterServicePlan>(
            ctx.clone(),
            cluster_plans.clone(),
            shutdown.clone()
        ),
        run_instance_watcher(ctx.clone(), plans, cluster_plans, shutdown),
    );
}

/// Work queue for plan kind `K`, reporting its depth under the kind's label
fn queue_for<K: CatalogPlan>(ctx: &Context) -> WorkQueue {
    let depth = metrics::QUEUE_DEPTH.with_label_values(&[&*K::kind(&())]);
    WorkQueue::with_depth_gauge(ctx.config.backoff(), depth)
}
