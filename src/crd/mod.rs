//! Custom Resource Definitions for the Service Plan Operator

mod service_instance;
mod service_plan;

pub use service_instance::*;
pub use service_plan::*;

use std::fmt::Debug;

use kube::api::Api;
use kube::{Client, CustomResourceExt, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::error::Result;
use crate::key::ObjectKey;

/// A plan kind that can be withdrawn from its broker catalog
pub trait CatalogPlan:
    Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static
{
    /// Which instance reference points at this kind
    const SCOPE: PlanScope;

    /// Whether the broker catalog sync has marked the plan as withdrawn
    fn removed_from_broker_catalog(&self) -> bool;

    /// API handle for plans in `namespace` (ignored for cluster-scoped kinds)
    fn api(client: Client, namespace: &str) -> Api<Self>;
}

/// Scope of a plan kind, and with it the instance field that references it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlanScope {
    /// `ServicePlan`, referenced through `spec.planRef`
    Namespaced,
    /// `ClusterServicePlan`, referenced through `spec.clusterPlanRef`
    Cluster,
}

impl PlanScope {
    pub const ALL: [PlanScope; 2] = [PlanScope::Namespaced, PlanScope::Cluster];

    /// Field path on ServiceInstance naming the referenced plan
    pub fn reference_field(self) -> &'static str {
        match self {
            PlanScope::Namespaced => "spec.planRef.name",
            PlanScope::Cluster => "spec.clusterPlanRef.name",
        }
    }

    /// Field selector matching instances that reference `plan_name`
    pub fn field_selector(self, plan_name: &str) -> String {
        format!("{}={}", self.reference_field(), plan_name)
    }

    /// Name of the plan of this scope the instance references, if any
    pub fn referenced_plan(self, instance: &ServiceInstance) -> Option<&str> {
        let reference = match self {
            PlanScope::Namespaced => instance.spec.plan_ref.as_ref(),
            PlanScope::Cluster => instance.spec.cluster_plan_ref.as_ref(),
        };
        reference.map(|r| r.name.as_str()).filter(|n| !n.is_empty())
    }

    /// Queue key of the plan the instance references.
    ///
    /// Namespaced plans live next to their instances.
    pub fn plan_key(self, instance: &ServiceInstance) -> Option<ObjectKey> {
        let name = self.referenced_plan(instance)?;
        match self {
            PlanScope::Namespaced => Some(ObjectKey::namespaced(instance.namespace()?, name)),
            PlanScope::Cluster => Some(ObjectKey::cluster(name)),
        }
    }
}

/// Generate all CRD YAML manifests
pub fn generate_crds() -> Result<Vec<String>> {
    Ok(vec![
        serde_yaml::to_string(&ServicePlan::crd())?,
        serde_yaml::to_string(&ClusterServicePlan::crd())?,
        serde_yaml::to_string(&service_instance_crd()?)?,
    ])
}

/// ServiceInstance CRD with the plan references declared as selectable
/// fields, so the API server accepts field selectors on them.
fn service_instance_crd() -> Result<Value> {
    let mut crd = serde_json::to_value(ServiceInstance::crd())?;
    let selectable: Vec<Value> = PlanScope::ALL
        .iter()
        .map(|scope| json!({ "jsonPath": format!(".{}", scope.reference_field()) }))
        .collect();

    if let Some(versions) = crd.pointer_mut("/spec/versions").and_then(Value::as_array_mut) {
        for version in versions {
            version["selectableFields"] = Value::Array(selectable.clone());
        }
    }
    Ok(crd)
}
